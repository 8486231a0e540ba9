//! Which tenant a destination lookup queries.

// self
use crate::_prelude::*;

/// Error returned when a strategy identifier is unknown.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown {kind} strategy `{value}`.")]
pub struct UnknownStrategy {
	/// Strategy family.
	pub kind: &'static str,
	/// Rejected identifier.
	pub value: String,
}

/// Tenant selection for destination retrieval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalStrategy {
	/// Query the current tenant, or the provider when none is bound.
	#[default]
	CurrentTenant,
	/// Always query the provider tenant.
	AlwaysProvider,
	/// Query the current tenant and fail when none is bound.
	OnlySubscriber,
}
impl RetrievalStrategy {
	/// Returns the identifier used in destination options.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::CurrentTenant => "CurrentTenant",
			Self::AlwaysProvider => "AlwaysProvider",
			Self::OnlySubscriber => "OnlySubscriber",
		}
	}
}
impl Display for RetrievalStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for RetrievalStrategy {
	type Err = UnknownStrategy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		[Self::CurrentTenant, Self::AlwaysProvider, Self::OnlySubscriber]
			.into_iter()
			.find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownStrategy { kind: "retrieval", value: s.to_owned() })
	}
}

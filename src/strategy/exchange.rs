//! Destination-service token exchange strategies.

// self
use crate::{
	_prelude::*,
	destination::AuthenticationType,
	strategy::{Isolation, RetrievalStrategy, UnknownStrategy},
};

/// How the configuration service treats the current user's token when resolving a destination.
///
/// The strategy decides which identity a resolved destination is segregated by:
///
/// | Strategy | Isolation | Value stored under |
/// |---|---|---|
/// | `LookupOnly` | tenant | tenant |
/// | `LookupThenExchange` | tenant | tenant, or tenant + principal when the destination needs the user |
/// | `ExchangeOnly` | tenant + principal (both required) | tenant + principal |
/// | `ForwardUserToken` | tenant | tenant, or tenant + principal when the destination needs the user |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationTokenExchangeStrategy {
	/// Forward the user token alongside the lookup and let the service decide.
	ForwardUserToken,
	/// Look up without any user token.
	LookupOnly,
	/// Look up first and exchange the user token only when the destination requires it.
	LookupThenExchange,
	/// Always exchange the user token.
	ExchangeOnly,
}
impl DestinationTokenExchangeStrategy {
	/// Strategy applied when neither options nor the authentication type decide otherwise.
	pub const DEFAULT: Self = Self::LookupThenExchange;

	/// Returns the identifier used in destination options.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ForwardUserToken => "ForwardUserToken",
			Self::LookupOnly => "LookupOnly",
			Self::LookupThenExchange => "LookupThenExchange",
			Self::ExchangeOnly => "ExchangeOnly",
		}
	}

	/// Selects the strategy for a declared authentication type and an optional explicit override.
	///
	/// The override always wins. Without one, authentication types that need the user resolve to
	/// [`Self::LookupThenExchange`], other known types to [`Self::LookupOnly`], and an unknown type
	/// to [`Self::DEFAULT`].
	pub fn resolve(authentication: Option<AuthenticationType>, explicit: Option<Self>) -> Self {
		if let Some(strategy) = explicit {
			return strategy;
		}

		match authentication {
			Some(kind) if kind.requires_user_token_exchange(false) => Self::LookupThenExchange,
			Some(_) => Self::LookupOnly,
			None => Self::DEFAULT,
		}
	}

	/// Whether resolving a destination of `authentication` under the selected strategy involves
	/// exchanging the current user's token.
	///
	/// An unknown authentication type counts as needing the user unless the strategy rules it out.
	pub fn requires_user_token_exchange(
		authentication: Option<AuthenticationType>,
		explicit: Option<Self>,
	) -> bool {
		match Self::resolve(authentication, explicit) {
			Self::ExchangeOnly => true,
			Self::LookupOnly => false,
			Self::LookupThenExchange | Self::ForwardUserToken =>
				authentication.is_none_or(|kind| kind.requires_user_token_exchange(false)),
		}
	}

	/// Identity the isolation lock and the primary value key are scoped to.
	pub const fn isolation(self, retrieval: RetrievalStrategy) -> Isolation {
		match self {
			Self::ExchangeOnly => Isolation::TENANT_AND_PRINCIPAL_REQUIRED.for_retrieval(retrieval),
			Self::LookupOnly => Isolation::TENANT_OPTIONAL.for_retrieval(retrieval),
			Self::LookupThenExchange | Self::ForwardUserToken => match retrieval {
				// The exchange runs in the caller's tenant even when the lookup targets the
				// provider.
				RetrievalStrategy::AlwaysProvider => Isolation::TENANT_OPTIONAL,
				_ => Isolation::TENANT_OPTIONAL.for_retrieval(retrieval),
			},
		}
	}

	/// Identity of the additional, principal-scoped value key, for strategies that decide after
	/// the lookup whether the result belongs to the user.
	pub const fn principal_isolation(self, retrieval: RetrievalStrategy) -> Option<Isolation> {
		match self {
			Self::LookupThenExchange | Self::ForwardUserToken => {
				let tenant = self.isolation(retrieval).tenant;

				Some(Isolation::new(tenant, crate::strategy::Requirement::Optional))
			},
			Self::LookupOnly | Self::ExchangeOnly => None,
		}
	}
}
impl Display for DestinationTokenExchangeStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for DestinationTokenExchangeStrategy {
	type Err = UnknownStrategy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		[Self::ForwardUserToken, Self::LookupOnly, Self::LookupThenExchange, Self::ExchangeOnly]
			.into_iter()
			.find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownStrategy { kind: "token exchange", value: s.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::strategy::Requirement;

	type Strategy = DestinationTokenExchangeStrategy;

	#[test]
	fn override_wins_over_authentication_type() {
		assert_eq!(
			Strategy::resolve(Some(AuthenticationType::OAuth2JwtBearer), Some(Strategy::LookupOnly)),
			Strategy::LookupOnly
		);
		assert_eq!(
			Strategy::resolve(Some(AuthenticationType::OAuth2JwtBearer), None),
			Strategy::LookupThenExchange
		);
		assert_eq!(
			Strategy::resolve(Some(AuthenticationType::BasicAuthentication), None),
			Strategy::LookupOnly
		);
		assert_eq!(Strategy::resolve(None, None), Strategy::LookupThenExchange);
	}

	#[test]
	fn exchange_predicate_table() {
		let basic = Some(AuthenticationType::BasicAuthentication);
		let jwt = Some(AuthenticationType::OAuth2JwtBearer);

		assert!(Strategy::requires_user_token_exchange(basic, Some(Strategy::ExchangeOnly)));
		assert!(!Strategy::requires_user_token_exchange(jwt, Some(Strategy::LookupOnly)));
		assert!(Strategy::requires_user_token_exchange(jwt, None));
		assert!(!Strategy::requires_user_token_exchange(basic, None));
		assert!(Strategy::requires_user_token_exchange(None, Some(Strategy::ForwardUserToken)));
		assert!(!Strategy::requires_user_token_exchange(basic, Some(Strategy::ForwardUserToken)));
	}

	#[test]
	fn isolation_table() {
		let current = RetrievalStrategy::CurrentTenant;

		assert_eq!(Strategy::LookupOnly.isolation(current), Isolation::TENANT_OPTIONAL);
		assert_eq!(Strategy::LookupThenExchange.isolation(current), Isolation::TENANT_OPTIONAL);
		assert_eq!(Strategy::ForwardUserToken.isolation(current), Isolation::TENANT_OPTIONAL);
		assert_eq!(
			Strategy::ExchangeOnly.isolation(current),
			Isolation::TENANT_AND_PRINCIPAL_REQUIRED
		);
		assert_eq!(
			Strategy::LookupOnly.isolation(RetrievalStrategy::AlwaysProvider),
			Isolation::NONE
		);
		assert_eq!(
			Strategy::LookupThenExchange.isolation(RetrievalStrategy::AlwaysProvider),
			Isolation::TENANT_OPTIONAL
		);
		assert_eq!(
			Strategy::LookupThenExchange.principal_isolation(RetrievalStrategy::OnlySubscriber),
			Some(Isolation::new(Requirement::Required, Requirement::Optional))
		);
		assert_eq!(Strategy::ExchangeOnly.principal_isolation(current), None);
		assert_eq!(Strategy::LookupOnly.principal_isolation(current), None);
	}

	#[test]
	fn identifiers_parse_case_insensitively() {
		assert_eq!("exchangeonly".parse(), Ok(Strategy::ExchangeOnly));
		assert_eq!(Strategy::ForwardUserToken.to_string(), "ForwardUserToken");
		assert!("ExchangeSometimes".parse::<Strategy>().is_err());
	}
}

//! Token exchange, retrieval, and principal propagation policies.
//!
//! Every policy here is a pure lookup table. Commands consult them to decide which identity a
//! result must be segregated by, and the token service consults them to decide how a proxy token
//! is obtained.

pub mod exchange;
pub mod propagation;
pub mod retrieval;

pub use exchange::*;
pub use propagation::*;
pub use retrieval::*;

/// How strongly an identity component participates in isolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
	/// The component never participates.
	Ignored,
	/// The component participates when bound and is omitted otherwise.
	Optional,
	/// The component must be bound; preparation fails otherwise.
	Required,
}

/// Identity components a cache key must be segregated by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Isolation {
	/// Tenant requirement.
	pub tenant: Requirement,
	/// Principal requirement.
	pub principal: Requirement,
}
impl Isolation {
	/// No identity segregation at all.
	pub const NONE: Self = Self::new(Requirement::Ignored, Requirement::Ignored);
	/// Tenant when bound, never principal.
	pub const TENANT_OPTIONAL: Self = Self::new(Requirement::Optional, Requirement::Ignored);
	/// Tenant always, never principal.
	pub const TENANT_REQUIRED: Self = Self::new(Requirement::Required, Requirement::Ignored);
	/// Tenant and principal whenever bound.
	pub const TENANT_AND_PRINCIPAL_OPTIONAL: Self =
		Self::new(Requirement::Optional, Requirement::Optional);
	/// Tenant and principal, both mandatory.
	pub const TENANT_AND_PRINCIPAL_REQUIRED: Self =
		Self::new(Requirement::Required, Requirement::Required);

	/// Creates an isolation from its two requirements.
	pub const fn new(tenant: Requirement, principal: Requirement) -> Self {
		Self { tenant, principal }
	}

	/// Whether any identity component can participate.
	pub const fn requires_identity(self) -> bool {
		!matches!(self.tenant, Requirement::Ignored)
			|| !matches!(self.principal, Requirement::Ignored)
	}

	/// Applies the retrieval strategy's view on the tenant component.
	///
	/// `AlwaysProvider` queries the provider tenant regardless of the caller, so an optional tenant
	/// stops mattering. `OnlySubscriber` refuses to run without a tenant.
	pub const fn for_retrieval(self, retrieval: RetrievalStrategy) -> Self {
		let tenant = match (retrieval, self.tenant) {
			(RetrievalStrategy::AlwaysProvider, Requirement::Optional) => Requirement::Ignored,
			(RetrievalStrategy::OnlySubscriber, Requirement::Ignored | Requirement::Optional) =>
				Requirement::Required,
			(_, tenant) => tenant,
		};

		Self { tenant, principal: self.principal }
	}
}

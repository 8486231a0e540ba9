//! Composite cache identities.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TenantId},
	context::ExecutionContext,
	destination::DestinationOptions,
	error::ContextError,
	strategy::{Isolation, Requirement},
};

/// One typed component of a [`CacheKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyComponent {
	/// Tenant identity.
	Tenant(TenantId),
	/// Principal identity.
	Principal(PrincipalId),
	/// Destination name.
	Name(String),
	/// Destination options.
	Options(DestinationOptions),
	/// Any other discriminator.
	Text(String),
}
impl From<TenantId> for KeyComponent {
	fn from(value: TenantId) -> Self {
		Self::Tenant(value)
	}
}
impl From<PrincipalId> for KeyComponent {
	fn from(value: PrincipalId) -> Self {
		Self::Principal(value)
	}
}
impl From<DestinationOptions> for KeyComponent {
	fn from(value: DestinationOptions) -> Self {
		Self::Options(value)
	}
}
impl From<&DestinationOptions> for KeyComponent {
	fn from(value: &DestinationOptions) -> Self {
		Self::Options(value.clone())
	}
}

/// Immutable, ordered sequence of identity components.
///
/// Two keys are equal exactly when their component sequences are equal, so a key never equals
/// one of its own extensions.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<[KeyComponent]>);
impl CacheKey {
	/// Base key from an optional tenant and principal; absent parts are omitted.
	pub fn of(tenant: Option<&TenantId>, principal: Option<&PrincipalId>) -> Self {
		let components = tenant
			.cloned()
			.map(KeyComponent::Tenant)
			.into_iter()
			.chain(principal.cloned().map(KeyComponent::Principal))
			.collect::<Vec<_>>();

		Self(components.into())
	}

	/// The empty key, used when no identity segregation applies.
	pub fn of_no_isolation() -> Self {
		Self::default()
	}

	/// Builds the isolation key `isolation` asks for from the context.
	///
	/// Returns `Ok(None)` when the isolation needs no identity at all, and an error when a
	/// required component is unbound.
	pub fn for_isolation(
		ctx: &ExecutionContext,
		isolation: Isolation,
	) -> Result<Option<Self>, ContextError> {
		if !isolation.requires_identity() {
			return Ok(None);
		}

		let tenant = select(isolation.tenant, ctx.tenant_id(), ContextError::MissingTenant)?;
		let principal =
			select(isolation.principal, ctx.principal_id(), ContextError::MissingPrincipal)?;

		Ok(Some(Self::of(tenant, principal)))
	}

	/// Returns a new key extended by `component`; `self` is left untouched.
	pub fn append(&self, component: impl Into<KeyComponent>) -> Self {
		let components =
			self.0.iter().cloned().chain([component.into()]).collect::<Vec<_>>();

		Self(components.into())
	}

	/// Returns a new key extended by a destination name and options.
	pub fn append_name_and_options(&self, name: &str, options: &DestinationOptions) -> Self {
		self.append(KeyComponent::Name(name.to_owned())).append(options)
	}

	/// Tenant component, if any.
	pub fn tenant(&self) -> Option<&TenantId> {
		self.0.iter().find_map(|component| match component {
			KeyComponent::Tenant(id) => Some(id),
			_ => None,
		})
	}

	/// Principal component, if any.
	pub fn principal(&self) -> Option<&PrincipalId> {
		self.0.iter().find_map(|component| match component {
			KeyComponent::Principal(id) => Some(id),
			_ => None,
		})
	}

	/// Components in order.
	pub fn components(&self) -> &[KeyComponent] {
		&self.0
	}

	/// Number of components.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` for the no-isolation key.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CacheKey").field(&&*self.0).finish()
	}
}

fn select<'a, T>(
	requirement: Requirement,
	bound: Option<&'a T>,
	missing: ContextError,
) -> Result<Option<&'a T>, ContextError> {
	match requirement {
		Requirement::Ignored => Ok(None),
		Requirement::Optional => Ok(bound),
		Requirement::Required => bound.map(Some).ok_or(missing),
	}
}

//! Execution context describing who a resolution runs for.
//!
//! The context is passed explicitly to every command and token operation. The cache core only
//! reads it; it never binds or mutates identity on the caller's behalf.

// self
use crate::{
	_prelude::*,
	auth::{AuthToken, Principal, PrincipalId, Tenant, TenantId},
	error::ContextError,
};

/// Read-only identity snapshot for one logical request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionContext {
	tenant: Option<Tenant>,
	principal: Option<Principal>,
	auth_token: Option<AuthToken>,
}
impl ExecutionContext {
	/// Context with no tenant, principal, or user token (provider/technical context).
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Returns a builder.
	pub fn builder() -> ExecutionContextBuilder {
		ExecutionContextBuilder::default()
	}

	/// Bound tenant, if any.
	pub fn tenant(&self) -> Option<&Tenant> {
		self.tenant.as_ref()
	}

	/// Bound principal, if any.
	pub fn principal(&self) -> Option<&Principal> {
		self.principal.as_ref()
	}

	/// Bound user token, if any.
	pub fn auth_token(&self) -> Option<&AuthToken> {
		self.auth_token.as_ref()
	}

	/// Bound tenant identifier, if any.
	pub fn tenant_id(&self) -> Option<&TenantId> {
		self.tenant.as_ref().map(|tenant| &tenant.id)
	}

	/// Bound principal identifier, if any.
	pub fn principal_id(&self) -> Option<&PrincipalId> {
		self.principal.as_ref().map(|principal| &principal.id)
	}

	/// Bound tenant identifier or [`ContextError::MissingTenant`].
	pub fn require_tenant(&self) -> Result<&TenantId, ContextError> {
		self.tenant_id().ok_or(ContextError::MissingTenant)
	}

	/// Bound principal identifier or [`ContextError::MissingPrincipal`].
	pub fn require_principal(&self) -> Result<&PrincipalId, ContextError> {
		self.principal_id().ok_or(ContextError::MissingPrincipal)
	}

	/// Bound user token or [`ContextError::MissingAuthToken`].
	pub fn require_auth_token(&self) -> Result<&AuthToken, ContextError> {
		self.auth_token().ok_or(ContextError::MissingAuthToken)
	}
}

/// Builder for [`ExecutionContext`].
#[derive(Clone, Debug, Default)]
pub struct ExecutionContextBuilder {
	tenant: Option<Tenant>,
	principal: Option<Principal>,
	auth_token: Option<AuthToken>,
}
impl ExecutionContextBuilder {
	/// Binds a tenant.
	pub fn tenant(mut self, tenant: impl Into<Tenant>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Binds a principal.
	pub fn principal(mut self, principal: impl Into<Principal>) -> Self {
		self.principal = Some(principal.into());

		self
	}

	/// Binds a user token.
	pub fn auth_token(mut self, token: AuthToken) -> Self {
		self.auth_token = Some(token);

		self
	}

	/// Finalizes the context.
	pub fn build(self) -> ExecutionContext {
		ExecutionContext {
			tenant: self.tenant,
			principal: self.principal,
			auth_token: self.auth_token,
		}
	}
}

//! Tenant and principal descriptors bound to an execution context.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, PrincipalId, TenantId},
};

/// An isolated customer or subaccount context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
	/// Tenant identifier; the only part that participates in cache keys.
	pub id: TenantId,
	/// Optional subdomain used by some identity providers to route requests.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subdomain: Option<String>,
}
impl Tenant {
	/// Creates a tenant without a subdomain.
	pub fn new(id: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Ok(Self { id: TenantId::new(id)?, subdomain: None })
	}

	/// Attaches a subdomain.
	pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
		self.subdomain = Some(subdomain.into());

		self
	}
}
impl From<TenantId> for Tenant {
	fn from(id: TenantId) -> Self {
		Self { id, subdomain: None }
	}
}

/// An authenticated end-user or technical identity within a tenant.
///
/// Attributes describe the principal but never take part in cache identity: two principals with
/// the same identifier share cached destinations regardless of their attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Principal identifier.
	pub id: PrincipalId,
	/// Free-form attributes (roles, names, claims).
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
}
impl Principal {
	/// Creates a principal without attributes.
	pub fn new(id: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Ok(Self { id: PrincipalId::new(id)?, attributes: BTreeMap::new() })
	}

	/// Adds or replaces an attribute.
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(name.into(), value.into());

		self
	}

	/// Returns an attribute value by name.
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}
}
impl From<PrincipalId> for Principal {
	fn from(id: PrincipalId) -> Self {
		Self { id, attributes: BTreeMap::new() }
	}
}

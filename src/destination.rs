//! Destination model, options, and the loader seam the caches compute through.
//!
//! A [`Destination`] is treated as an opaque property bag. The cache core only inspects the
//! pieces that affect identity and freshness: the name, the authentication type, the system user,
//! embedded credential expiries, and the property names flagged for change detection.

pub mod authentication;
pub mod loader;
pub mod options;

pub use authentication::*;
pub use loader::*;
pub use options::*;

// self
use crate::_prelude::*;

/// Property holding the destination name.
pub const PROPERTY_NAME: &str = "Name";
/// Property holding the authentication type identifier.
pub const PROPERTY_AUTHENTICATION: &str = "Authentication";
/// Property holding the technical user for SAML bearer destinations.
pub const PROPERTY_SYSTEM_USER: &str = "SystemUser";

/// Embedded credentials are considered expired this long before their actual expiry.
pub const CREDENTIAL_EXPIRY_BUFFER: Duration = Duration::seconds(10);

/// A resolved destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
	name: String,
	authentication: AuthenticationType,
	properties: BTreeMap<String, serde_json::Value>,
	#[serde(default)]
	auth_token_expiries: Vec<OffsetDateTime>,
	#[serde(default)]
	certificate_expiries: Vec<OffsetDateTime>,
	#[serde(default)]
	change_detection_keys: Vec<String>,
}
impl Destination {
	/// Returns a builder for a destination with the given name.
	pub fn builder(name: impl Into<String>) -> DestinationBuilder {
		DestinationBuilder::new(name.into())
	}

	/// Destination name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Declared authentication type.
	pub fn authentication(&self) -> AuthenticationType {
		self.authentication
	}

	/// Raw property lookup.
	pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
		self.properties.get(name)
	}

	/// All properties, including name and authentication.
	pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
		&self.properties
	}

	/// Technical user, when configured.
	pub fn system_user(&self) -> Option<&str> {
		self.property(PROPERTY_SYSTEM_USER).and_then(serde_json::Value::as_str)
	}

	/// Whether using this destination requires exchanging the current user's token.
	pub fn requires_user_token_exchange(&self) -> bool {
		self.authentication.requires_user_token_exchange(self.system_user().is_some())
	}

	/// Whether any embedded auth token or certificate expires within
	/// [`CREDENTIAL_EXPIRY_BUFFER`] of `now`.
	pub fn has_expiring_credentials(&self, now: OffsetDateTime) -> bool {
		let horizon = now + CREDENTIAL_EXPIRY_BUFFER;
		let expiring = |expiries: &[OffsetDateTime]| {
			expiries.iter().min().is_some_and(|earliest| *earliest < horizon)
		};

		expiring(&self.auth_token_expiries) || expiring(&self.certificate_expiries)
	}

	/// Compares this individually fetched destination with its entry from a listing.
	///
	/// Every property of `listed` must be present and equal here. Properties named in this
	/// destination's change-detection keys must additionally be present and equal in `listed`.
	/// Extra properties on this destination are otherwise ignored.
	pub fn matches_listing(&self, listed: &Destination) -> bool {
		for (name, expected) in &listed.properties {
			if self.properties.get(name) != Some(expected) {
				tracing::debug!(destination = %self.name, property = %name, "Detected change in destination property.");

				return false;
			}
		}
		for name in &self.change_detection_keys {
			if self.properties.get(name) != listed.properties.get(name) {
				tracing::debug!(destination = %self.name, property = %name, "Detected change in destination property.");

				return false;
			}
		}

		true
	}
}

/// Builder for [`Destination`].
#[derive(Clone, Debug)]
pub struct DestinationBuilder {
	name: String,
	authentication: AuthenticationType,
	properties: BTreeMap<String, serde_json::Value>,
	auth_token_expiries: Vec<OffsetDateTime>,
	certificate_expiries: Vec<OffsetDateTime>,
	change_detection_keys: Vec<String>,
}
impl DestinationBuilder {
	fn new(name: String) -> Self {
		Self {
			name,
			authentication: AuthenticationType::NoAuthentication,
			properties: BTreeMap::new(),
			auth_token_expiries: Vec::new(),
			certificate_expiries: Vec::new(),
			change_detection_keys: Vec::new(),
		}
	}

	/// Sets the authentication type.
	pub fn authentication(mut self, authentication: AuthenticationType) -> Self {
		self.authentication = authentication;

		self
	}

	/// Sets the technical user.
	pub fn system_user(self, user: impl Into<String>) -> Self {
		self.property(PROPERTY_SYSTEM_USER, user.into())
	}

	/// Adds or replaces a property.
	pub fn property(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.properties.insert(name.into(), value.into());

		self
	}

	/// Records the expiry of an embedded auth token.
	pub fn auth_token_expiry(mut self, expires_at: OffsetDateTime) -> Self {
		self.auth_token_expiries.push(expires_at);

		self
	}

	/// Records the expiry of an embedded certificate.
	pub fn certificate_expiry(mut self, expires_at: OffsetDateTime) -> Self {
		self.certificate_expiries.push(expires_at);

		self
	}

	/// Flags a property for reverse comparison during change detection.
	pub fn change_detection_key(mut self, name: impl Into<String>) -> Self {
		self.change_detection_keys.push(name.into());

		self
	}

	/// Finalizes the destination.
	pub fn build(mut self) -> Destination {
		self.properties.insert(PROPERTY_NAME.into(), self.name.clone().into());
		self.properties
			.insert(PROPERTY_AUTHENTICATION.into(), self.authentication.as_str().into());

		Destination {
			name: self.name,
			authentication: self.authentication,
			properties: self.properties,
			auth_token_expiries: self.auth_token_expiries,
			certificate_expiries: self.certificate_expiries,
			change_detection_keys: self.change_detection_keys,
		}
	}
}

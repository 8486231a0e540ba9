//! Service bindings in the `VCAP_SERVICES` shape.
//!
//! ```json
//! { "destination": [ { "name": "dest", "label": "destination", "tags": [], "credentials": { .. } } ] }
//! ```
//!
//! Lookups return a [`BindingLookup`] so callers can tell "none" from "too many" without
//! inspecting error messages.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::TenantId,
	error::{BindingError, ConfigError},
	token::{ClientCredentials, OAuth2ServiceSettings},
};

/// One bound service instance.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
	/// Instance name.
	pub name: String,
	/// Service label, e.g. `destination` or `xsuaa`.
	#[serde(default)]
	pub label: Option<String>,
	/// Free-form tags.
	#[serde(default)]
	pub tags: Vec<String>,
	/// Raw credentials block.
	#[serde(default)]
	pub credentials: Map<String, Value>,
}
impl ServiceBinding {
	/// Reads `clientid` + `clientsecret`, falling back to a nested `uaa` block.
	pub fn client_credentials(&self) -> Result<ClientCredentials, BindingError> {
		let client_id = self.required_credential("clientid")?;
		let client_secret = self.required_credential("clientsecret")?;

		Ok(ClientCredentials::new(client_id, client_secret))
	}

	/// Token endpoint settings.
	///
	/// `token_service_url` is used verbatim; otherwise `url` is treated as the identity service
	/// base URL. The provider tenant comes from `tenantid`, else `identityzoneid`.
	pub fn token_service_settings(&self) -> Result<OAuth2ServiceSettings> {
		let mut settings = match self.credential("token_service_url") {
			Some(url) => OAuth2ServiceSettings::parse(url)?,
			None => OAuth2ServiceSettings::of_base_uri(self.required_credential("url")?)?,
		};

		if let Some(tenant) = self.credential("tenantid").or_else(|| self.credential("identityzoneid"))
		{
			let tenant = TenantId::new(tenant).map_err(|_| BindingError::MissingCredential {
				binding: self.name.clone(),
				field: "tenantid",
			})?;

			settings = settings.with_provider_tenant(tenant);
		}

		Ok(settings)
	}

	/// String credential `field`, looked up at the top level and then under `uaa`.
	pub fn credential(&self, field: &str) -> Option<&str> {
		self.credentials.get(field).and_then(Value::as_str).or_else(|| {
			self.credentials
				.get("uaa")
				.and_then(|uaa| uaa.get(field))
				.and_then(Value::as_str)
		})
	}

	fn required_credential(&self, field: &'static str) -> Result<&str, BindingError> {
		self.credential(field)
			.ok_or_else(|| BindingError::MissingCredential { binding: self.name.clone(), field })
	}

	fn matches(&self, service: &str) -> bool {
		self.label.as_deref() == Some(service) || self.tags.iter().any(|tag| tag == service)
	}
}
impl Debug for ServiceBinding {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceBinding")
			.field("name", &self.name)
			.field("label", &self.label)
			.field("tags", &self.tags)
			.field("credentials", &"<redacted>")
			.finish()
	}
}

/// Outcome of a singleton binding lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingLookup<'a> {
	/// Exactly one binding matched.
	Found(&'a ServiceBinding),
	/// No binding matched.
	NotFound,
	/// More than one binding matched.
	Ambiguous(Vec<&'a ServiceBinding>),
}
impl<'a> BindingLookup<'a> {
	/// Converts the lookup into a result, mapping each cardinality violation to its own error.
	pub fn into_result(self, service: &str) -> Result<&'a ServiceBinding, BindingError> {
		match self {
			Self::Found(binding) => Ok(binding),
			Self::NotFound => Err(BindingError::NotFound { service: service.to_owned() }),
			Self::Ambiguous(bindings) =>
				Err(BindingError::Ambiguous { service: service.to_owned(), count: bindings.len() }),
		}
	}
}

/// All bindings visible to the application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceBindings(Vec<ServiceBinding>);
impl ServiceBindings {
	/// Parses a `VCAP_SERVICES` document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let services: BTreeMap<String, Vec<ServiceBinding>> =
			serde_path_to_error::deserialize(&mut de)
				.map_err(|source| ConfigError::MalformedBindings { source })?;

		Ok(Self(
			services
				.into_iter()
				.flat_map(|(service, bindings)| {
					bindings.into_iter().map(move |mut binding| {
						binding.label.get_or_insert_with(|| service.clone());

						binding
					})
				})
				.collect(),
		))
	}

	/// Wraps already parsed bindings.
	pub fn new(bindings: Vec<ServiceBinding>) -> Self {
		Self(bindings)
	}

	/// Looks up the single binding labelled or tagged `service`.
	pub fn lookup(&self, service: &str) -> BindingLookup<'_> {
		let mut matching = self.0.iter().filter(|binding| binding.matches(service)).collect::<Vec<_>>();

		match matching.len() {
			0 => BindingLookup::NotFound,
			1 => BindingLookup::Found(matching.remove(0)),
			_ => BindingLookup::Ambiguous(matching),
		}
	}

	/// Every binding.
	pub fn iter(&self) -> impl Iterator<Item = &ServiceBinding> {
		self.0.iter()
	}
}

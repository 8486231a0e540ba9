//! Identity-provider endpoint settings and client credentials.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret},
	error::ConfigError,
};

/// Header carrying the tenant a token is requested for.
pub const DEFAULT_TENANT_HEADER: &str = "X-zid";
/// Path appended to base URLs that carry no path of their own.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";

/// Where and how to request tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuth2ServiceSettings {
	token_url: Url,
	provider_tenant: Option<TenantId>,
	tenant_header: Option<String>,
}
impl OAuth2ServiceSettings {
	/// Settings for an explicit token endpoint.
	pub fn new(token_url: Url) -> Self {
		Self { token_url, provider_tenant: None, tenant_header: Some(DEFAULT_TENANT_HEADER.into()) }
	}

	/// Parses an explicit token endpoint.
	pub fn parse(token_url: &str) -> Result<Self, ConfigError> {
		Url::parse(token_url)
			.map(Self::new)
			.map_err(|source| ConfigError::InvalidTokenUrl { source })
	}

	/// Settings for an identity service base URL; [`DEFAULT_TOKEN_PATH`] is appended when the URL
	/// has no path.
	pub fn of_base_uri(base: &str) -> Result<Self, ConfigError> {
		let mut url = Url::parse(base).map_err(|source| ConfigError::InvalidTokenUrl { source })?;

		if url.path().is_empty() || url.path() == "/" {
			url.set_path(DEFAULT_TOKEN_PATH);
		}

		Ok(Self::new(url))
	}

	/// Records the tenant that owns the client credentials.
	pub fn with_provider_tenant(mut self, tenant: TenantId) -> Self {
		self.provider_tenant = Some(tenant);

		self
	}

	/// Overrides the tenant header; `None` disables it.
	pub fn with_tenant_header(mut self, header: Option<String>) -> Self {
		self.tenant_header = header;

		self
	}

	/// Token endpoint.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Tenant that owns the client credentials, if known.
	pub fn provider_tenant(&self) -> Option<&TenantId> {
		self.provider_tenant.as_ref()
	}

	/// Header carrying the requested tenant, if enabled.
	pub fn tenant_header(&self) -> Option<&str> {
		self.tenant_header.as_deref()
	}
}

/// OAuth2 client identifier and secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	client_id: String,
	client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates a credential pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}
}

//! Token acquisition with caching + singleflight.
//!
//! [`TokenAcquisitionService`] performs the `client_credentials` and JWT-bearer grants against an
//! identity provider. Issued tokens land in an [`OAuth2TokenCache`]; concurrent callers asking for
//! the same [`TokenCacheKey`] share one in-flight exchange, so only the first of them reaches the
//! endpoint. Failures are returned as-is and never retried here.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthToken, TenantId},
	binding::ServiceBindings,
	context::ExecutionContext,
	error::ConfigError,
	http::TokenHttpClient,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	token::{
		ClientCredentials, GrantType, OAuth2ServiceSettings, OAuth2TokenCache, TokenCacheKey,
		TransportErrorMapper, response,
	},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, token::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Token service specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenAcquisitionService =
	TokenAcquisitionService<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Obtains technical access tokens from an OAuth2 identity provider.
pub struct TokenAcquisitionService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	cache: OAuth2TokenCache,
}
impl<C, M> TokenAcquisitionService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a service that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			cache: OAuth2TokenCache::default(),
		}
	}

	/// Replaces the token cache, e.g. to share one cache between services or tune its leeway.
	pub fn with_cache(mut self, cache: OAuth2TokenCache) -> Self {
		self.cache = cache;

		self
	}

	/// Token cache backing this service.
	pub fn cache(&self) -> &OAuth2TokenCache {
		&self.cache
	}

	/// Drops every cached token; the next call for any key performs a fresh exchange.
	pub fn invalidate_cache(&self) {
		self.cache.invalidate_all();
	}

	/// Performs the `client_credentials` grant.
	///
	/// With `scoped_to_current_tenant`, the token is requested for and cached under the context's
	/// tenant; otherwise the provider tenant of `settings` applies and the context is ignored.
	pub async fn retrieve_access_token_via_client_credentials_grant(
		&self,
		ctx: &ExecutionContext,
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
		scoped_to_current_tenant: bool,
	) -> Result<AccessToken> {
		const KIND: OperationKind = OperationKind::ClientCredentials;

		let tenant = if scoped_to_current_tenant { ctx.tenant_id() } else { None };
		let key = TokenCacheKey::client_credentials(settings, credentials, tenant);
		let request = GrantRequest {
			grant: GrantType::ClientCredentials,
			settings,
			credentials,
			tenant: tenant.or(settings.provider_tenant()),
			assertion: None,
		};

		self.acquire(KIND, key, request).await
	}

	/// Performs the `client_credentials` grant against the single binding labelled or tagged
	/// `service`, using its token endpoint, provider tenant, and client credentials.
	///
	/// Fails with [`Error::Binding`] before any request when no binding or more than one matches.
	pub async fn retrieve_access_token_for_binding(
		&self,
		ctx: &ExecutionContext,
		bindings: &ServiceBindings,
		service: &str,
		scoped_to_current_tenant: bool,
	) -> Result<AccessToken> {
		let binding = bindings.lookup(service).into_result(service)?;
		let settings = binding.token_service_settings()?;
		let credentials = binding.client_credentials()?;

		self.retrieve_access_token_via_client_credentials_grant(
			ctx,
			&settings,
			&credentials,
			scoped_to_current_tenant,
		)
		.await
	}

	/// Performs the JWT-bearer grant, exchanging the user token bound to `ctx`.
	///
	/// Fails with [`Error::TenantMismatch`] when the context's tenant differs from the tenant the
	/// user token was issued for, or the token names no tenant at all.
	pub async fn retrieve_access_token_via_jwt_bearer_grant(
		&self,
		ctx: &ExecutionContext,
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
	) -> Result<AccessToken> {
		const KIND: OperationKind = OperationKind::JwtBearer;

		let assertion = ctx.require_auth_token()?;

		if let Some(expected) = ctx.tenant_id() {
			ensure_tenant_matches(expected, assertion)?;
		}

		let tenant = ctx.tenant_id().cloned().or_else(|| TenantId::of_token(assertion));
		let key = TokenCacheKey::jwt_bearer(settings, credentials, tenant.as_ref(), assertion);
		let request = GrantRequest {
			grant: GrantType::JwtBearer,
			settings,
			credentials,
			tenant: tenant.as_ref(),
			assertion: Some(assertion),
		};

		self.acquire(KIND, key, request).await
	}

	async fn acquire(
		&self,
		kind: OperationKind,
		key: TokenCacheKey,
		request: GrantRequest<'_>,
	) -> Result<AccessToken> {
		let span = OperationSpan::new(kind, "acquire");

		obs::record_operation_outcome(kind, OperationOutcome::Attempt);

		if let Some(token) = self.cache.fetch(&key, OffsetDateTime::now_utc()).await {
			obs::record_operation_outcome(kind, OperationOutcome::CacheHit);

			return Ok(token);
		}

		let result = span.instrument(self.cache.get_or_issue(key, self.exchange(request))).await;

		obs::record_result(kind, &result);

		result
	}

	async fn exchange(&self, request: GrantRequest<'_>) -> Result<AccessToken> {
		let grant = request.grant;
		let http_request = request.build()?;
		let handle = self.http_client.handle();
		let issued_at = OffsetDateTime::now_utc();
		let response = handle
			.call(http_request)
			.await
			.map_err(|err| self.transport_mapper.map_transport_error(grant, err))?;

		response::parse_token_response(grant, &response, issued_at)
	}
}
#[cfg(feature = "reqwest")]
impl ReqwestTokenAcquisitionService {
	/// Creates a service backed by a default reqwest client.
	pub fn new() -> Self {
		Self::with_http_client(ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestTokenAcquisitionService {
	fn default() -> Self {
		Self::new()
	}
}
impl<C, M> Clone for TokenAcquisitionService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			cache: self.cache.clone(),
		}
	}
}
impl<C, M> Debug for TokenAcquisitionService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAcquisitionService")
			.field("cached_tokens", &self.cache.len())
			.finish_non_exhaustive()
	}
}

struct GrantRequest<'a> {
	grant: GrantType,
	settings: &'a OAuth2ServiceSettings,
	credentials: &'a ClientCredentials,
	tenant: Option<&'a TenantId>,
	assertion: Option<&'a AuthToken>,
}
impl GrantRequest<'_> {
	fn build(&self) -> Result<HttpRequest> {
		let mut form = Serializer::new(String::new());

		form.append_pair("grant_type", self.grant.as_str())
			.append_pair("client_id", self.credentials.client_id())
			.append_pair("client_secret", self.credentials.client_secret().expose());

		if let Some(assertion) = self.assertion {
			form.append_pair("assertion", assertion.expose());
		}

		let mut builder = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(self.settings.token_url().as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json");

		if let (Some(header), Some(tenant)) = (self.settings.tenant_header(), self.tenant) {
			builder = builder.header(header, tenant.as_ref());
		}

		builder.body(form.finish().into_bytes()).map_err(|err| ConfigError::from(err).into())
	}
}

/// Fails with [`Error::TenantMismatch`] unless `token` was issued for `expected`.
///
/// A token without a tenant claim cannot prove its tenant and is rejected with `actual` set to
/// [`UNKNOWN_TENANT`].
pub(crate) fn ensure_tenant_matches(expected: &TenantId, token: &AuthToken) -> Result<()> {
	match TenantId::of_token(token) {
		Some(actual) if &actual == expected => Ok(()),
		actual => Err(Error::TenantMismatch {
			expected: expected.to_string(),
			actual: actual.map_or_else(|| UNKNOWN_TENANT.to_owned(), String::from),
		}),
	}
}

/// Reported as the token's tenant when it carries no usable tenant claim.
pub const UNKNOWN_TENANT: &str = "<none>";

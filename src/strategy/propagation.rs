//! Principal propagation towards on-premise proxies.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthToken},
	context::ExecutionContext,
	destination::AuthenticationType,
	http::TokenHttpClient,
	strategy::{Isolation, Requirement, UnknownStrategy},
	token::{
		self, ClientCredentials, OAuth2ServiceSettings, TokenAcquisitionService,
		TransportErrorMapper,
	},
};

/// How the current user's identity reaches an on-premise proxy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalPropagationStrategy {
	/// Technical proxy token only; the user is not propagated.
	Disabled,
	/// Technical proxy token plus the user token forwarded in a second header.
	Compatibility,
	/// Proxy token obtained by exchanging the user token (JWT bearer).
	#[default]
	Recommendation,
}
impl PrincipalPropagationStrategy {
	/// Returns a stable identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Disabled => "Disabled",
			Self::Compatibility => "Compatibility",
			Self::Recommendation => "Recommendation",
		}
	}

	/// Strategy for a destination of `authentication`; only `PrincipalPropagation` destinations
	/// use `configured`, every other type is [`Self::Disabled`].
	pub fn of(authentication: Option<AuthenticationType>, configured: Self) -> Self {
		match authentication {
			Some(AuthenticationType::PrincipalPropagation) => configured,
			_ => Self::Disabled,
		}
	}

	/// Whether the strategy needs a user token bound to the context.
	pub const fn requires_user_token(self) -> bool {
		!matches!(self, Self::Disabled)
	}

	/// Whether the proxy token is obtained by exchanging the user token.
	pub const fn requires_user_token_exchange(self) -> bool {
		matches!(self, Self::Recommendation)
	}

	/// Identity proxy credentials must be segregated by.
	pub const fn isolation(self) -> Isolation {
		match self {
			Self::Disabled => Isolation::TENANT_OPTIONAL,
			Self::Compatibility | Self::Recommendation =>
				Isolation::new(Requirement::Optional, Requirement::Required),
		}
	}

	/// Obtains the credentials an on-premise proxy call needs under this strategy.
	///
	/// Strategies that propagate the user fail with [`Error::TenantMismatch`] when the user token
	/// belongs to another tenant than the one the technical client acts for: the context's tenant
	/// when bound, the provider tenant of `settings` otherwise.
	/// A user token without a tenant claim fails the same way whenever either tenant is known.
	pub async fn acquire_proxy_credentials<C, M>(
		self,
		service: &TokenAcquisitionService<C, M>,
		ctx: &ExecutionContext,
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
	) -> Result<ProxyCredentials>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		match self {
			Self::Disabled => {
				let proxy_token = service
					.retrieve_access_token_via_client_credentials_grant(
						ctx,
						settings,
						credentials,
						true,
					)
					.await?;

				Ok(ProxyCredentials { proxy_token, user_token: None })
			},
			Self::Compatibility => {
				let user_token = consistent_user_token(ctx, settings)?;
				let proxy_token = service
					.retrieve_access_token_via_client_credentials_grant(
						ctx,
						settings,
						credentials,
						true,
					)
					.await?;

				Ok(ProxyCredentials { proxy_token, user_token: Some(user_token.clone()) })
			},
			Self::Recommendation => {
				consistent_user_token(ctx, settings)?;

				let proxy_token = service
					.retrieve_access_token_via_jwt_bearer_grant(ctx, settings, credentials)
					.await?;

				Ok(ProxyCredentials { proxy_token, user_token: None })
			},
		}
	}
}
impl Display for PrincipalPropagationStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for PrincipalPropagationStrategy {
	type Err = UnknownStrategy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		[Self::Disabled, Self::Compatibility, Self::Recommendation]
			.into_iter()
			.find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownStrategy { kind: "principal propagation", value: s.to_owned() })
	}
}

/// Tokens handed to an on-premise proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyCredentials {
	/// Token authenticating against the proxy.
	pub proxy_token: AccessToken,
	/// User token forwarded next to the proxy token, if the strategy forwards one.
	pub user_token: Option<AuthToken>,
}

fn consistent_user_token<'a>(
	ctx: &'a ExecutionContext,
	settings: &OAuth2ServiceSettings,
) -> Result<&'a AuthToken> {
	let user_token = ctx.require_auth_token()?;

	if let Some(expected) = ctx.tenant_id().or(settings.provider_tenant()) {
		token::service::ensure_tenant_matches(expected, user_token)?;
	}

	Ok(user_token)
}

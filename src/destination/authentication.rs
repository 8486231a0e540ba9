//! Declared destination authentication types.

// self
use crate::_prelude::*;

/// Error returned when an authentication type identifier is unknown.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown authentication type `{0}`.")]
pub struct UnknownAuthenticationType(pub String);

/// Authentication type declared on a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationType {
	/// No authentication.
	NoAuthentication,
	/// HTTP basic authentication with stored credentials.
	BasicAuthentication,
	/// Mutual TLS with a stored client certificate.
	#[serde(rename = "ClientCertificateAuthentication")]
	ClientCertificate,
	/// User identity forwarded to an on-premise system through the connectivity proxy.
	PrincipalPropagation,
	/// Technical token obtained with the client-credentials grant.
	OAuth2ClientCredentials,
	/// User token exchanged for a token of the target system.
	OAuth2UserTokenExchange,
	/// User token exchanged with the JWT-bearer grant.
	#[serde(rename = "OAuth2JWTBearer")]
	OAuth2JwtBearer,
	/// SAML assertion exchanged with the SAML-bearer grant.
	#[serde(rename = "OAuth2SAMLBearerAssertion")]
	OAuth2SamlBearerAssertion,
	/// Resource owner password grant.
	OAuth2Password,
	/// SAML assertion issued for the current user.
	#[serde(rename = "SAMLAssertion")]
	SamlAssertion,
	/// Refresh token supplied by the caller.
	OAuth2RefreshToken,
}
impl AuthenticationType {
	/// Every known authentication type.
	pub const ALL: [Self; 11] = [
		Self::NoAuthentication,
		Self::BasicAuthentication,
		Self::ClientCertificate,
		Self::PrincipalPropagation,
		Self::OAuth2ClientCredentials,
		Self::OAuth2UserTokenExchange,
		Self::OAuth2JwtBearer,
		Self::OAuth2SamlBearerAssertion,
		Self::OAuth2Password,
		Self::SamlAssertion,
		Self::OAuth2RefreshToken,
	];

	/// Returns the identifier used by the configuration service.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoAuthentication => "NoAuthentication",
			Self::BasicAuthentication => "BasicAuthentication",
			Self::ClientCertificate => "ClientCertificateAuthentication",
			Self::PrincipalPropagation => "PrincipalPropagation",
			Self::OAuth2ClientCredentials => "OAuth2ClientCredentials",
			Self::OAuth2UserTokenExchange => "OAuth2UserTokenExchange",
			Self::OAuth2JwtBearer => "OAuth2JWTBearer",
			Self::OAuth2SamlBearerAssertion => "OAuth2SAMLBearerAssertion",
			Self::OAuth2Password => "OAuth2Password",
			Self::SamlAssertion => "SAMLAssertion",
			Self::OAuth2RefreshToken => "OAuth2RefreshToken",
		}
	}

	/// Whether the configuration service must exchange the current user's token to resolve a
	/// destination of this type.
	///
	/// SAML bearer destinations only need the user when no technical `SystemUser` is set.
	pub const fn requires_user_token_exchange(self, has_system_user: bool) -> bool {
		match self {
			Self::OAuth2UserTokenExchange | Self::OAuth2JwtBearer | Self::SamlAssertion => true,
			Self::OAuth2SamlBearerAssertion => !has_system_user,
			_ => false,
		}
	}
}
impl Display for AuthenticationType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthenticationType {
	type Err = UnknownAuthenticationType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownAuthenticationType(s.to_owned()))
	}
}

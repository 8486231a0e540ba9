//! User tokens (JWTs) forwarded by callers and exchanged for technical tokens.

// crates.io
use base64::{
	Engine,
	engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
struct AuthTokenClaims {
	#[serde(default)]
	zid: Option<String>,
	#[serde(default)]
	app_tid: Option<String>,
	#[serde(default)]
	sub: Option<String>,
	#[serde(default)]
	user_name: Option<String>,
	#[serde(default)]
	exp: Option<i64>,
}

/// A user JWT bound to the current execution.
///
/// The payload is decoded to read routing claims only; the signature is not verified here
/// because the identity provider verifies it during any exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
	raw: TokenSecret,
	claims: AuthTokenClaims,
}
impl AuthToken {
	/// Parses a compact JWT (`header.payload.signature`).
	pub fn parse(raw: impl Into<String>) -> Result<Self, ConfigError> {
		let raw = raw.into();
		let mut parts = raw.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(malformed("expected three dot-separated segments"));
		};
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.or_else(|_| URL_SAFE.decode(payload))
			.map_err(|e| malformed(e.to_string()))?;
		let claims = serde_json::from_slice::<AuthTokenClaims>(&bytes)
			.map_err(|e| malformed(e.to_string()))?;

		Ok(Self { raw: TokenSecret::new(raw), claims })
	}

	/// Returns the encoded token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.raw.expose()
	}

	/// Tenant the token was issued for (`zid`, falling back to `app_tid`).
	pub fn tenant(&self) -> Option<&str> {
		self.claims.zid.as_deref().or(self.claims.app_tid.as_deref())
	}

	/// Subject of the token (`user_name`, falling back to `sub`).
	pub fn subject(&self) -> Option<&str> {
		self.claims.user_name.as_deref().or(self.claims.sub.as_deref())
	}

	/// Expiry claim, when present and representable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.claims.exp.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
	}

	/// SHA-256 fingerprint of the encoded token.
	pub fn fingerprint(&self) -> String {
		self.raw.fingerprint()
	}
}
impl Debug for AuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthToken")
			.field("raw", &"<redacted>")
			.field("tenant", &self.tenant())
			.field("subject", &self.subject())
			.finish()
	}
}
impl FromStr for AuthToken {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

fn malformed(reason: impl Into<String>) -> ConfigError {
	ConfigError::MalformedAuthToken { reason: reason.into() }
}

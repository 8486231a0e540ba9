//! Token endpoint response decoding.

// crates.io
use oauth2::HttpResponse;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, HttpStatusError, TransientError},
	token::GrantType,
};

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	token_type: Option<String>,
}

/// Maps a raw endpoint response into an [`AccessToken`] issued at `issued_at`.
pub(crate) fn parse_token_response(
	grant: GrantType,
	response: &HttpResponse,
	issued_at: OffsetDateTime,
) -> Result<AccessToken> {
	let status = response.status();

	if !status.is_success() {
		return Err(Error::TokenRequestFailed {
			grant: grant.label(),
			source: HttpStatusError {
				status: status.as_u16(),
				body: String::from_utf8_lossy(response.body()).into_owned(),
			},
		});
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());
	let body: TokenResponseBody = serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::TokenResponseParse { source, status: Some(status.as_u16()) }
	})?;
	let expires_in = body.expires_in.ok_or(ConfigError::MissingExpiresIn)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let mut builder = AccessToken::builder()
		.value(body.access_token)
		.issued_at(issued_at)
		.expires_in(Duration::seconds(expires_in));

	if let Some(refresh) = body.refresh_token {
		builder = builder.refresh_token(refresh);
	}
	if let Some(token_type) = body.token_type {
		builder = builder.token_type(token_type);
	}

	builder.build().map_err(|err| ConfigError::from(err).into())
}

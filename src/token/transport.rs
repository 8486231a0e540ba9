//! Classification of transport failures raised while calling token endpoints.

// crates.io
use oauth2::HttpClientError;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	token::GrantType,
};

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(&self, grant: GrantType, error: HttpClientError<E>) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, grant: GrantType, err: HttpClientError<ReqwestError>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, *inner),
			other => map_generic_transport_error(grant, other),
		}
	}
}

/// Classifies the transport-independent [`HttpClientError`] variants.
///
/// Custom mappers can delegate here for everything their transport does not special-case.
pub fn map_generic_transport_error<E>(grant: GrantType, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error during the {grant} grant: {message}"),
			status: None,
		}
		.into(),
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		_ => TransientError::TokenEndpoint {
			message: format!("HTTP client error during the {grant} grant"),
			status: None,
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(grant: GrantType, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: format!("Request timed out during the {grant} grant"),
			status: err.status().map(|code| code.as_u16()),
		}
		.into();
	}

	TransportError::from(err).into()
}

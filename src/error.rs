//! Error types shared across commands, the token service, and the cache facade.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used when a collaborator's failure type is opaque.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The execution context lacks identity information the operation needs.
	#[error(transparent)]
	Context(#[from] ContextError),
	/// Service binding lookup violated the expected cardinality or shape.
	#[error(transparent)]
	Binding(#[from] BindingError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the {grant} grant.")]
	TokenRequestFailed {
		/// Grant label.
		grant: &'static str,
		/// HTTP failure returned by the endpoint.
		#[source]
		source: HttpStatusError,
	},
	/// The user token was issued for a different tenant than the one expected.
	#[error("Tenant `{expected}` does not match the tenant `{actual}` of the current user token.")]
	TenantMismatch {
		/// Tenant the operation is bound to.
		expected: String,
		/// Tenant claimed by the user token.
		actual: String,
	},
	/// The destination loader failed or produced an unusable destination.
	#[error("{message}")]
	DestinationAccess {
		/// Human-readable summary.
		message: String,
		/// Underlying loader failure, if any.
		#[source]
		source: Option<BoxError>,
	},
	/// A failure observed by several waiters of one shared computation.
	#[error(transparent)]
	Shared(Arc<Error>),
}
impl Error {
	/// Builds a [`Error::DestinationAccess`] without an underlying cause.
	pub fn destination_access(message: impl Into<String>) -> Self {
		Self::DestinationAccess { message: message.into(), source: None }
	}

	/// Builds a [`Error::DestinationAccess`] wrapping the loader failure.
	pub fn destination_access_with(
		message: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::DestinationAccess { message: message.into(), source: Some(Box::new(src)) }
	}

	/// Recovers an owned error from a shared one when this was the last reference.
	pub fn from_shared(shared: Arc<Error>) -> Self {
		match Arc::try_unwrap(shared) {
			Ok(err) => err,
			Err(shared) => Self::Shared(shared),
		}
	}

	/// Returns the innermost non-shared error.
	pub fn unshared(&self) -> &Error {
		match self {
			Self::Shared(inner) => inner.unshared(),
			other => other,
		}
	}
}

/// Missing pieces of the execution context.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ContextError {
	/// No tenant is bound although the operation requires one.
	#[error("No tenant is bound to the current execution context.")]
	MissingTenant,
	/// No principal is bound although the operation requires one.
	#[error("No principal is bound to the current execution context.")]
	MissingPrincipal,
	/// No user token is bound although the operation requires one.
	#[error("No user token is bound to the current execution context.")]
	MissingAuthToken,
}

/// Service binding cardinality and shape violations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BindingError {
	/// No binding matched the lookup.
	#[error("No service binding found for `{service}`.")]
	NotFound {
		/// Service label used for the lookup.
		service: String,
	},
	/// More than one binding matched although exactly one was required.
	#[error("Found {count} service bindings for `{service}`, expected exactly one.")]
	Ambiguous {
		/// Service label used for the lookup.
		service: String,
		/// Number of matching bindings.
		count: usize,
	},
	/// The binding lacks a credential field.
	#[error("Service binding `{binding}` is missing the `{field}` credential.")]
	MissingCredential {
		/// Binding name.
		binding: String,
		/// Credential field name.
		field: &'static str,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token service URL cannot be parsed.
	#[error("Token service URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// User token is not a decodable JWT.
	#[error("User token is malformed: {reason}.")]
	MalformedAuthToken {
		/// Decoding failure summary.
		reason: String,
	},
	/// A destination option carries a value its reader cannot interpret.
	#[error("Destination option `{key}` has the invalid value `{value}`.")]
	InvalidOption {
		/// Option key.
		key: &'static str,
		/// Rejected value.
		value: String,
	},
	/// Access token builder validation failed.
	#[error("Unable to build access token.")]
	TokenBuild(#[from] crate::auth::AccessTokenBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Cache expiration must be positive when set.
	#[error("Cache expiration must be positive.")]
	NonPositiveExpiration,
	/// Cache expiration exceeds what the value caches support.
	#[error("Cache expiration must not exceed {max}.")]
	ExpirationTooLong {
		/// Largest accepted expiration.
		max: Duration,
	},
	/// Cache settings JSON could not be parsed.
	#[error("Cache settings are malformed.")]
	MalformedSettings {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Service bindings JSON could not be parsed.
	#[error("Service bindings are malformed.")]
	MalformedBindings {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint could not be reached in time or replied unexpectedly.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-success HTTP response captured with its status and body.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("HTTP {status}: {body}")]
pub struct HttpStatusError {
	/// Response status code.
	pub status: u16,
	/// Response body, lossily decoded as UTF-8.
	pub body: String,
}

//! OAuth2 token acquisition: service settings, the token cache, and grant exchanges.

pub mod cache;
pub mod service;
pub mod settings;
pub mod transport;

mod response;

pub use cache::*;
pub use service::*;
pub use settings::*;
pub use transport::*;

// self
use crate::_prelude::*;

/// Grants the token service performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
	/// `client_credentials`.
	ClientCredentials,
	/// `urn:ietf:params:oauth:grant-type:jwt-bearer`.
	JwtBearer,
}
impl GrantType {
	/// Value of the `grant_type` form parameter.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
		}
	}

	/// Short label for errors and telemetry.
	pub const fn label(self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::JwtBearer => "jwt_bearer",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.label())
	}
}

//! Observability helpers for cache and token operations.
//!
//! # Feature Flags
//!
//! - Spans named `destination_broker.operation` carry the `operation` and `stage` fields and are
//!   always emitted through `tracing`.
//! - Enable `metrics` to increment the `destination_broker_operation_total` counter for every
//!   attempt/cache hit/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Single destination resolution.
	SingleDestination,
	/// Destination listing resolution.
	AllDestinations,
	/// Client-credentials token acquisition.
	ClientCredentials,
	/// JWT-bearer token acquisition.
	JwtBearer,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::SingleDestination => "single_destination",
			OperationKind::AllDestinations => "all_destinations",
			OperationKind::ClientCredentials => "client_credentials",
			OperationKind::JwtBearer => "jwt_bearer",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Answered from a cache without computing.
	CacheHit,
	/// Successful completion after computing.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::CacheHit => "cache_hit",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

//! Isolation-aware destination resolution for multi-tenant services: tenant/principal scoped
//! caches, per-identity singleflight locks, and OAuth 2.0 token acquisition in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod binding;
pub mod cache;
pub mod command;
pub mod context;
pub mod destination;
pub mod error;
pub mod facade;
pub mod http;
pub mod obs;
pub mod strategy;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		auth::{AuthToken, Principal, PrincipalId, Tenant, TenantId},
		context::ExecutionContext,
		destination::{Destination, DestinationLoader, DestinationOptions, LoaderFuture},
	};
	#[cfg(feature = "reqwest")]
	use crate::{
		http::ReqwestHttpClient,
		token::{ReqwestTokenAcquisitionService, ReqwestTransportErrorMapper},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Token service backed by [`test_reqwest_http_client`].
	#[cfg(feature = "reqwest")]
	pub fn test_token_service() -> ReqwestTokenAcquisitionService {
		ReqwestTokenAcquisitionService::with_http_client(
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
	}

	/// Parses a tenant fixture.
	pub fn tenant_id(id: &str) -> TenantId {
		TenantId::new(id).expect("Tenant fixture should be valid.")
	}

	/// Parses a principal fixture.
	pub fn principal_id(id: &str) -> PrincipalId {
		PrincipalId::new(id).expect("Principal fixture should be valid.")
	}

	/// Context bound to a tenant only.
	pub fn tenant_context(tenant: &str) -> ExecutionContext {
		ExecutionContext::builder().tenant(Tenant::from(tenant_id(tenant))).build()
	}

	/// Context bound to a tenant and a principal.
	pub fn user_context(tenant: &str, principal: &str) -> ExecutionContext {
		ExecutionContext::builder()
			.tenant(Tenant::from(tenant_id(tenant)))
			.principal(Principal::from(principal_id(principal)))
			.build()
	}

	/// Context bound to a tenant, a principal, and a matching user token.
	pub fn token_context(tenant: &str, principal: &str) -> ExecutionContext {
		ExecutionContext::builder()
			.tenant(Tenant::from(tenant_id(tenant)))
			.principal(Principal::from(principal_id(principal)))
			.auth_token(user_token(tenant, principal))
			.build()
	}

	/// Unsigned user JWT issued for `tenant` and `subject`.
	pub fn user_token(tenant: &str, subject: &str) -> AuthToken {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let payload = URL_SAFE_NO_PAD.encode(
			serde_json::json!({ "zid": tenant, "sub": subject, "user_name": subject }).to_string(),
		);

		AuthToken::parse(format!("{header}.{payload}.sig")).expect("User token fixture should parse.")
	}

	/// Unsigned user JWT for `subject` that carries no tenant claim.
	pub fn tenantless_user_token(subject: &str) -> AuthToken {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": subject }).to_string());

		AuthToken::parse(format!("{header}.{payload}.sig"))
			.expect("Tenantless token fixture should parse.")
	}

	/// Destination without authentication.
	pub fn destination(name: &str) -> Destination {
		Destination::builder(name).property("URL", format!("https://{name}.example.com")).build()
	}

	/// Call-counting [`DestinationLoader`] backed by a fixed set of destinations.
	///
	/// Loads for a tenant can be held open through [`StubLoader::gate`]: while the gate's lock
	/// is held, every load for that tenant waits. Contexts without a tenant use the `""` gate.
	#[derive(Debug, Default)]
	pub struct StubLoader {
		destinations: Mutex<BTreeMap<String, Destination>>,
		gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
		load_calls: AtomicUsize,
		load_all_calls: AtomicUsize,
		failing: AtomicBool,
	}
	impl StubLoader {
		/// Loader serving `destinations`.
		pub fn with_destinations(destinations: impl IntoIterator<Item = Destination>) -> Self {
			let loader = Self::default();

			for destination in destinations {
				loader.insert(destination);
			}

			loader
		}

		/// Adds or replaces a destination.
		pub fn insert(&self, destination: Destination) {
			self.destinations.lock().insert(destination.name().to_owned(), destination);
		}

		/// Makes every following load fail (or succeed again).
		pub fn fail(&self, failing: bool) {
			self.failing.store(failing, Ordering::SeqCst);
		}

		/// Gate holding loads for `tenant` open while locked.
		pub fn gate(&self, tenant: &str) -> Arc<AsyncMutex<()>> {
			self.gates.lock().entry(tenant.to_owned()).or_default().clone()
		}

		/// Number of single destination loads started.
		pub fn load_calls(&self) -> usize {
			self.load_calls.load(Ordering::SeqCst)
		}

		/// Number of listing loads started.
		pub fn load_all_calls(&self) -> usize {
			self.load_all_calls.load(Ordering::SeqCst)
		}

		async fn pass_gate(&self, ctx: &ExecutionContext) -> Result<()> {
			let gate = self.gate(ctx.tenant_id().map_or("", |id| id.as_ref()));

			drop(gate.lock().await);

			if self.failing.load(Ordering::SeqCst) {
				return Err(Error::destination_access("Stubbed loader failure."));
			}

			Ok(())
		}
	}
	impl DestinationLoader for StubLoader {
		fn load<'a>(
			&'a self,
			ctx: &'a ExecutionContext,
			name: &'a str,
			_: &'a DestinationOptions,
		) -> LoaderFuture<'a, Destination> {
			self.load_calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				self.pass_gate(ctx).await?;
				self.destinations.lock().get(name).cloned().ok_or_else(|| {
					Error::destination_access(format!("Destination `{name}` does not exist."))
				})
			})
		}

		fn load_all<'a>(
			&'a self,
			ctx: &'a ExecutionContext,
			_: &'a DestinationOptions,
		) -> LoaderFuture<'a, Vec<Destination>> {
			self.load_all_calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				self.pass_gate(ctx).await?;

				Ok(self.destinations.lock().values().cloned().collect())
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

//! Bounded in-memory cache of issued access tokens.

// std
use std::time::{Duration as StdDuration, Instant};
// crates.io
use moka::{Expiry, future::Cache};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthToken, TenantId},
	token::{ClientCredentials, GrantType, OAuth2ServiceSettings},
};

/// Tokens this close to expiry are not handed out from the cache.
pub const DEFAULT_EXPIRY_LEEWAY: Duration = Duration::seconds(60);

/// Identity under which an issued token is cached.
///
/// Secrets and assertions only enter the key as fingerprints.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenCacheKey {
	token_url: String,
	client_id: String,
	secret_fingerprint: String,
	grant: GrantType,
	tenant: Option<TenantId>,
	assertion_fingerprint: Option<String>,
}
impl TokenCacheKey {
	/// Key for a client-credentials token, optionally scoped to a tenant.
	pub fn client_credentials(
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
		tenant: Option<&TenantId>,
	) -> Self {
		Self::new(settings, credentials, GrantType::ClientCredentials, tenant, None)
	}

	/// Key for a token obtained by exchanging `assertion`.
	pub fn jwt_bearer(
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
		tenant: Option<&TenantId>,
		assertion: &AuthToken,
	) -> Self {
		Self::new(settings, credentials, GrantType::JwtBearer, tenant, Some(assertion.fingerprint()))
	}

	fn new(
		settings: &OAuth2ServiceSettings,
		credentials: &ClientCredentials,
		grant: GrantType,
		tenant: Option<&TenantId>,
		assertion_fingerprint: Option<String>,
	) -> Self {
		Self {
			token_url: settings.token_url().to_string(),
			client_id: credentials.client_id().to_owned(),
			secret_fingerprint: credentials.client_secret().fingerprint(),
			grant,
			tenant: tenant.cloned(),
			assertion_fingerprint,
		}
	}

	/// Grant the key belongs to.
	pub fn grant(&self) -> GrantType {
		self.grant
	}

	/// Tenant the key is scoped to, if any.
	pub fn tenant(&self) -> Option<&TenantId> {
		self.tenant.as_ref()
	}
}

/// Default number of tokens kept before the least valuable ones are evicted.
pub const DEFAULT_TOKEN_CAPACITY: u64 = 1_000;

// Bounds the per-entry timer of tokens issued with very long lifetimes.
const MAX_ENTRY_LIFETIME: Duration = Duration::days(365);

/// Bounded token cache keyed by [`TokenCacheKey`].
///
/// Each entry expires on its own once its token is within the leeway of `expires_at`, so stale
/// tokens are dropped instead of accumulating. Clones share the same storage.
#[derive(Clone)]
pub struct OAuth2TokenCache {
	tokens: Cache<TokenCacheKey, AccessToken>,
	leeway: Duration,
	capacity: u64,
}
impl OAuth2TokenCache {
	/// Creates an empty cache with [`DEFAULT_EXPIRY_LEEWAY`] and [`DEFAULT_TOKEN_CAPACITY`].
	pub fn new() -> Self {
		Self::with_limits(DEFAULT_EXPIRY_LEEWAY, DEFAULT_TOKEN_CAPACITY)
	}

	/// Creates an empty cache with a custom expiry leeway; negative values count as zero.
	pub fn with_leeway(leeway: Duration) -> Self {
		Self::with_limits(leeway, DEFAULT_TOKEN_CAPACITY)
	}

	/// Creates an empty cache with a custom expiry leeway and capacity.
	pub fn with_limits(leeway: Duration, capacity: u64) -> Self {
		let leeway = if leeway.is_negative() { Duration::ZERO } else { leeway };
		let tokens = Cache::builder()
			.max_capacity(capacity)
			.expire_after(TokenExpiry { leeway })
			.build();

		Self { tokens, leeway, capacity }
	}

	/// Returns a token that stays valid beyond the leeway at `now`.
	pub async fn fetch(&self, key: &TokenCacheKey, now: OffsetDateTime) -> Option<AccessToken> {
		self.tokens.get(key).await.filter(|token| !token.expires_within(now, self.leeway))
	}

	/// Returns the cached token for `key`, or runs `issue` once for all concurrent callers of the
	/// same key and caches its result. Failures are handed to every waiter and never cached.
	pub async fn get_or_issue<F>(&self, key: TokenCacheKey, issue: F) -> Result<AccessToken>
	where
		F: Future<Output = Result<AccessToken>>,
	{
		self.tokens.try_get_with(key, issue).await.map_err(Error::from_shared)
	}

	/// Stores a token, replacing any previous one.
	pub async fn save(&self, key: TokenCacheKey, token: AccessToken) {
		self.tokens.insert(key, token).await;
	}

	/// Removes every cached token.
	pub fn invalidate_all(&self) {
		self.tokens.invalidate_all();
	}

	/// Applies pending evictions and expirations.
	pub async fn run_pending_tasks(&self) {
		self.tokens.run_pending_tasks().await;
	}

	/// Number of cached tokens still outside the leeway.
	pub fn len(&self) -> usize {
		self.tokens.iter().count()
	}

	/// Returns `true` when no usable token is cached.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Maximum number of cached tokens.
	pub fn capacity(&self) -> u64 {
		self.capacity
	}

	/// Approximate number of stored entries, expired ones included until housekeeping runs.
	pub fn entry_count(&self) -> u64 {
		self.tokens.entry_count()
	}
}
impl Default for OAuth2TokenCache {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for OAuth2TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2TokenCache")
			.field("entries", &self.tokens.entry_count())
			.field("leeway", &self.leeway)
			.field("capacity", &self.capacity)
			.finish()
	}
}

struct TokenExpiry {
	leeway: Duration,
}
impl TokenExpiry {
	fn remaining(&self, token: &AccessToken) -> StdDuration {
		let usable_until = token.expires_at - self.leeway;
		let remaining = usable_until - OffsetDateTime::now_utc();

		if remaining.is_positive() {
			remaining.min(MAX_ENTRY_LIFETIME).unsigned_abs()
		} else {
			StdDuration::ZERO
		}
	}
}
impl Expiry<TokenCacheKey, AccessToken> for TokenExpiry {
	fn expire_after_create(
		&self,
		_: &TokenCacheKey,
		token: &AccessToken,
		_: Instant,
	) -> Option<StdDuration> {
		Some(self.remaining(token))
	}

	fn expire_after_update(
		&self,
		_: &TokenCacheKey,
		token: &AccessToken,
		_: Instant,
		_: Option<StdDuration>,
	) -> Option<StdDuration> {
		Some(self.remaining(token))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn settings() -> OAuth2ServiceSettings {
		OAuth2ServiceSettings::parse("https://auth.example.com/oauth/token")
			.expect("Token URL fixture should parse.")
	}

	fn token(value: &str, expires_at: OffsetDateTime) -> AccessToken {
		AccessToken::builder()
			.value(value)
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(expires_at)
			.build()
			.expect("Token fixture should build.")
	}

	#[test]
	fn keys_separate_secrets_tenants_and_grants() {
		let tenant = TenantId::new("subaccount-a").expect("Tenant fixture should be valid.");
		let a = TokenCacheKey::client_credentials(
			&settings(),
			&ClientCredentials::new("client", "one"),
			None,
		);
		let b = TokenCacheKey::client_credentials(
			&settings(),
			&ClientCredentials::new("client", "two"),
			None,
		);
		let c = TokenCacheKey::client_credentials(
			&settings(),
			&ClientCredentials::new("client", "one"),
			Some(&tenant),
		);

		assert_ne!(a, b);
		assert_ne!(a, c);
		assert_eq!(c.tenant(), Some(&tenant));
		assert!(!format!("{a:?}").contains("one\""));
	}

	#[tokio::test]
	async fn fetch_honors_leeway_and_invalidation() {
		let cache = OAuth2TokenCache::with_leeway(Duration::seconds(60));
		let key = TokenCacheKey::client_credentials(
			&settings(),
			&ClientCredentials::new("client", "secret"),
			None,
		);
		let now = OffsetDateTime::now_utc();

		cache.save(key.clone(), token("short", now + Duration::seconds(30))).await;

		assert!(cache.fetch(&key, now).await.is_none(), "Tokens inside the leeway must be skipped.");

		cache.save(key.clone(), token("long", now + Duration::hours(1))).await;

		assert_eq!(
			cache.fetch(&key, now).await.map(|t| t.value.expose().to_owned()),
			Some("long".into())
		);
		assert_eq!(cache.len(), 1);

		cache.invalidate_all();

		assert!(cache.is_empty());
		assert!(cache.fetch(&key, now).await.is_none());
	}

	#[tokio::test]
	async fn expired_tokens_are_dropped() {
		let cache = OAuth2TokenCache::new();
		let credentials = ClientCredentials::new("client", "secret");
		let expired_at = OffsetDateTime::now_utc() - Duration::minutes(1);

		for i in 0..500 {
			let tenant = TenantId::new(format!("subaccount-{i}")).expect("Tenant should be valid.");
			let key = TokenCacheKey::client_credentials(&settings(), &credentials, Some(&tenant));

			cache.save(key, token("stale", expired_at)).await;
		}

		cache.run_pending_tasks().await;

		assert!(cache.is_empty(), "Expired tokens must not stay visible.");
		assert!(cache.entry_count() <= cache.capacity());
	}

	#[tokio::test]
	async fn capacity_bounds_the_cache() {
		let cache = OAuth2TokenCache::with_limits(Duration::ZERO, 16);
		let credentials = ClientCredentials::new("client", "secret");
		let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);

		for i in 0..200 {
			let tenant = TenantId::new(format!("subaccount-{i}")).expect("Tenant should be valid.");
			let key = TokenCacheKey::client_credentials(&settings(), &credentials, Some(&tenant));

			cache.save(key, token("fresh", expires_at)).await;
		}

		cache.run_pending_tasks().await;

		assert!(cache.entry_count() <= 16);
	}
}

//! The destination resolution cache: commands wired to configurable cache policies.
//!
//! The facade owns one [`CacheGeneration`] at a time. Administrative mutations build a new
//! generation and swap it in atomically; commands already running keep the generation they
//! started with, so their reads and writes never land in the replacement.

// crates.io
use moka::future::Cache;
// self
use crate::{
	_prelude::*,
	cache::{CacheKey, CacheSettings, ExpirationStrategy, IsolationLockTable},
	command::{
		DestinationCache, DestinationListCache, GetOrComputeAllDestinationsCommand,
		GetOrComputeSingleDestinationCommand,
	},
	context::ExecutionContext,
	destination::{Destination, DestinationLoader, DestinationOptions},
	error::ConfigError,
};

/// Value caches and lock tables built from one [`CacheSettings`] snapshot.
#[derive(Debug)]
pub struct CacheGeneration {
	settings: CacheSettings,
	single: DestinationCache,
	all: DestinationListCache,
	single_locks: IsolationLockTable,
	all_locks: IsolationLockTable,
}
impl CacheGeneration {
	fn new(settings: CacheSettings) -> Self {
		let single = build_cache(settings.size_limit, settings.single_expiration());
		let all = build_cache(settings.all_size_limit(), settings.all_expiration());

		Self {
			settings,
			single,
			all,
			single_locks: IsolationLockTable::new(),
			all_locks: IsolationLockTable::new(),
		}
	}

	/// Settings the generation was built from.
	pub fn settings(&self) -> &CacheSettings {
		&self.settings
	}

	/// Single destination value cache.
	pub fn single(&self) -> &DestinationCache {
		&self.single
	}

	/// Destination listing value cache.
	pub fn all(&self) -> &DestinationListCache {
		&self.all
	}

	/// Isolation locks of single destination commands.
	pub fn single_locks(&self) -> &IsolationLockTable {
		&self.single_locks
	}

	/// Isolation locks of listing commands.
	pub fn all_locks(&self) -> &IsolationLockTable {
		&self.all_locks
	}
}

/// Resolves destinations through isolation-aware caches.
pub struct DestinationResolutionCache {
	loader: Arc<dyn DestinationLoader>,
	generation: RwLock<Arc<CacheGeneration>>,
}
impl DestinationResolutionCache {
	/// Creates a cache with [`CacheSettings::default`].
	pub fn new(loader: Arc<dyn DestinationLoader>) -> Self {
		Self { loader, generation: RwLock::new(Arc::new(CacheGeneration::new(Default::default()))) }
	}

	/// Creates a cache with explicit settings, normalizing them first.
	pub fn with_settings(
		loader: Arc<dyn DestinationLoader>,
		settings: CacheSettings,
	) -> Result<Self, ConfigError> {
		let generation = CacheGeneration::new(settings.normalized()?);

		Ok(Self { loader, generation: RwLock::new(Arc::new(generation)) })
	}

	/// Resolves a destination by name.
	///
	/// With caching disabled the loader is called directly; otherwise the call goes through a
	/// [`GetOrComputeSingleDestinationCommand`] bound to the current generation.
	pub async fn get_or_compute_destination(
		&self,
		ctx: &ExecutionContext,
		name: &str,
		options: &DestinationOptions,
	) -> Result<Destination> {
		let generation = self.generation();

		if !generation.settings.enabled {
			return self.loader.load(ctx, name, options).await;
		}

		let change_detection = if generation.settings.change_detection {
			Some(self.all_command(&generation, ctx, options)?)
		} else {
			None
		};
		let command = GetOrComputeSingleDestinationCommand::prepare_command(
			ctx,
			name,
			options,
			generation.single.clone(),
			generation.single_locks.clone(),
			self.loader.clone(),
			change_detection,
		)?;

		command.execute().await
	}

	/// Lists every destination visible to the context.
	pub async fn get_or_compute_all_destinations(
		&self,
		ctx: &ExecutionContext,
		options: &DestinationOptions,
	) -> Result<Arc<Vec<Destination>>> {
		let generation = self.generation();

		if !generation.settings.enabled {
			return self.loader.load_all(ctx, options).await.map(Arc::new);
		}

		self.all_command(&generation, ctx, options)?.execute().await
	}

	/// Current generation; administrative calls replace it.
	pub fn generation(&self) -> Arc<CacheGeneration> {
		self.generation.read().clone()
	}

	/// Settings of the current generation.
	pub fn settings(&self) -> CacheSettings {
		self.generation.read().settings.clone()
	}

	/// Turns caching on.
	pub fn enable(&self) {
		self.update(|settings| settings.enabled = true);
	}

	/// Turns caching off; every call reaches the loader.
	pub fn disable(&self) {
		self.update(|settings| settings.enabled = false);
	}

	/// Drops every cached value and lock, keeping the settings.
	pub fn reset(&self) {
		self.update(|_| ());
	}

	/// Empties the value caches of the current generation in place; locks are kept.
	pub fn invalidate_all(&self) {
		let generation = self.generation();

		generation.single.invalidate_all();
		generation.all.invalidate_all();
	}

	/// Bounds the number of cached destinations.
	pub fn set_size_limit(&self, limit: u64) {
		self.update(|settings| settings.size_limit = Some(limit));
	}

	/// Removes the size bound.
	pub fn disable_size_limit(&self) {
		self.update(|settings| settings.size_limit = None);
	}

	/// Sets the entry lifetime; non-positive lifetimes and those above
	/// [`MAX_EXPIRATION`](crate::cache::MAX_EXPIRATION) are rejected.
	pub fn set_expiration(
		&self,
		expiration: Duration,
		strategy: ExpirationStrategy,
	) -> Result<(), ConfigError> {
		self.try_update(|settings| {
			settings.expiration = Some(expiration);
			settings.expiration_strategy = strategy;
		})
	}

	/// Lets entries live until evicted by size; also disables change detection.
	pub fn disable_expiration(&self) {
		self.update(|settings| {
			settings.expiration = None;
			settings.change_detection = false;
		});
	}

	/// Validates cached single destinations against the listing; restores the default expiration
	/// when none is set.
	pub fn enable_change_detection(&self) {
		self.update(|settings| {
			if settings.expiration.is_none() {
				settings.expiration = CacheSettings::default().expiration;
			}

			settings.expiration_strategy = ExpirationStrategy::WhenCreated;
			settings.change_detection = true;
		});
	}

	/// Stops validating cached single destinations.
	pub fn disable_change_detection(&self) {
		self.update(|settings| settings.change_detection = false);
	}

	fn all_command(
		&self,
		generation: &CacheGeneration,
		ctx: &ExecutionContext,
		options: &DestinationOptions,
	) -> Result<GetOrComputeAllDestinationsCommand> {
		GetOrComputeAllDestinationsCommand::prepare_command(
			ctx,
			options,
			generation.all.clone(),
			generation.all_locks.clone(),
			self.loader.clone(),
		)
	}

	fn update(&self, mutate: impl FnOnce(&mut CacheSettings)) {
		let mut current = self.generation.write();
		let mut settings = current.settings.clone();

		mutate(&mut settings);

		let settings = settings.normalized().unwrap_or_else(|e| {
			tracing::warn!(error = %e, "Rejected cache settings; keeping the previous ones.");

			current.settings.clone()
		});

		*current = Arc::new(CacheGeneration::new(settings));
	}

	fn try_update(&self, mutate: impl FnOnce(&mut CacheSettings)) -> Result<(), ConfigError> {
		let mut current = self.generation.write();
		let mut settings = current.settings.clone();

		mutate(&mut settings);

		*current = Arc::new(CacheGeneration::new(settings.normalized()?));

		Ok(())
	}
}
impl Debug for DestinationResolutionCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DestinationResolutionCache")
			.field("settings", &self.generation.read().settings)
			.finish_non_exhaustive()
	}
}

fn build_cache<V>(
	size_limit: Option<u64>,
	expiration: Option<(Duration, ExpirationStrategy)>,
) -> Cache<CacheKey, V>
where
	V: 'static + Clone + Send + Sync,
{
	let mut builder = Cache::builder();

	if let Some(limit) = size_limit {
		builder = builder.max_capacity(limit);
	}

	match expiration {
		Some((ttl, ExpirationStrategy::WhenCreated)) => builder.time_to_live(ttl.unsigned_abs()),
		Some((ttl, ExpirationStrategy::WhenLastTouched)) => builder.time_to_idle(ttl.unsigned_abs()),
		None => builder,
	}
	.build()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[tokio::test]
	async fn disabled_cache_always_reaches_the_loader() {
		let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
		let cache = DestinationResolutionCache::new(loader.clone());
		let ctx = tenant_context("tenant-a");
		let options = DestinationOptions::default();

		cache.disable();

		for _ in 0..2 {
			cache
				.get_or_compute_destination(&ctx, "backend", &options)
				.await
				.expect("Destination should load.");
		}

		assert_eq!(loader.load_calls(), 2);
		assert!(cache.generation().single_locks().is_empty());
	}

	#[test]
	fn mutations_swap_generations() {
		let cache = DestinationResolutionCache::new(Arc::new(StubLoader::default()));
		let before = cache.generation();

		cache.set_size_limit(10);

		let after = cache.generation();

		assert!(!Arc::ptr_eq(&before, &after));
		assert_eq!(after.settings().size_limit, Some(10));
		assert_eq!(before.settings().size_limit, Some(crate::cache::DEFAULT_SIZE_LIMIT));
	}

	#[test]
	fn expiration_rules_are_enforced() {
		let cache = DestinationResolutionCache::new(Arc::new(StubLoader::default()));

		assert!(matches!(
			cache.set_expiration(Duration::ZERO, ExpirationStrategy::WhenCreated),
			Err(ConfigError::NonPositiveExpiration)
		));

		cache.disable_expiration();

		assert!(!cache.settings().change_detection);

		cache.enable_change_detection();

		let settings = cache.settings();

		assert!(settings.change_detection);
		assert_eq!(settings.expiration, CacheSettings::default().expiration);

		cache
			.set_expiration(Duration::minutes(1), ExpirationStrategy::WhenLastTouched)
			.expect("Positive expiration should be accepted.");

		assert!(!cache.settings().change_detection);
	}

	#[test]
	fn oversized_expiration_is_rejected_and_keeps_the_generation() {
		let cache = DestinationResolutionCache::new(Arc::new(StubLoader::default()));
		let before = cache.generation();

		assert!(matches!(
			cache.set_expiration(Duration::days(365 * 2_000), ExpirationStrategy::WhenCreated),
			Err(ConfigError::ExpirationTooLong { .. })
		));
		assert!(Arc::ptr_eq(&before, &cache.generation()));
		assert!(matches!(
			DestinationResolutionCache::with_settings(
				Arc::new(StubLoader::default()),
				CacheSettings {
					expiration: Some(Duration::days(365 * 2_000)),
					..Default::default()
				},
			),
			Err(ConfigError::ExpirationTooLong { .. })
		));
	}
}

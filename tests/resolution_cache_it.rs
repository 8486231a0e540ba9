// std
use std::{
	sync::{OnceLock, Weak},
	time::Duration as StdDuration,
};
// self
use destination_broker::{
	_preludet::*,
	cache::{CacheKey, CacheSettings, IsolationLockTable},
	command::{DestinationCache, GetOrComputeSingleDestinationCommand},
	context::ExecutionContext,
	destination::{
		AuthenticationType, Destination, DestinationLoader, DestinationOptions,
		DestinationServiceOptions, LoaderFuture,
	},
	error::ContextError,
	facade::DestinationResolutionCache,
	strategy::{DestinationTokenExchangeStrategy, RetrievalStrategy},
};

fn options(strategy: DestinationTokenExchangeStrategy) -> DestinationOptions {
	DestinationOptions::builder()
		.augment(&DestinationServiceOptions::new().token_exchange_strategy(strategy))
		.build()
}

fn settings_without_change_detection() -> CacheSettings {
	CacheSettings { change_detection: false, ..Default::default() }
}

/// Resolves single destinations from the facade's own listing.
#[derive(Default)]
struct ListingBackedLoader {
	cache: OnceLock<Weak<DestinationResolutionCache>>,
	inner: StubLoader,
}
impl DestinationLoader for ListingBackedLoader {
	fn load<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		name: &'a str,
		options: &'a DestinationOptions,
	) -> LoaderFuture<'a, Destination> {
		Box::pin(async move {
			let cache = self
				.cache
				.get()
				.and_then(Weak::upgrade)
				.ok_or_else(|| Error::destination_access("Facade is gone."))?;
			let listing = cache.get_or_compute_all_destinations(ctx, options).await?;

			listing.iter().find(|destination| destination.name() == name).cloned().ok_or_else(
				|| Error::destination_access(format!("Destination `{name}` is not listed.")),
			)
		})
	}

	fn load_all<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		options: &'a DestinationOptions,
	) -> LoaderFuture<'a, Vec<Destination>> {
		self.inner.load_all(ctx, options)
	}
}

async fn wait_for_loads(loader: &StubLoader, expected: usize) {
	while loader.load_calls() < expected {
		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}
}

#[tokio::test]
async fn identical_requests_load_once() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = DestinationResolutionCache::new(loader.clone());
	let ctx = user_context("tenant-a", "alice");
	let options = DestinationOptions::default();
	let first = cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("First resolution should succeed.");
	let second = cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("Second resolution should succeed.");

	assert_eq!(first, second);
	assert_eq!(loader.load_calls(), 1);
}

#[tokio::test]
async fn tenants_do_not_block_each_other() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = Arc::new(DestinationResolutionCache::with_settings(
		loader.clone(),
		settings_without_change_detection(),
	)
	.expect("Settings should be valid."));
	let options = options(DestinationTokenExchangeStrategy::LookupOnly);
	let gate = loader.gate("tenant-a");
	let held = gate.lock_arc().await;
	let blocked = tokio::spawn({
		let cache = cache.clone();
		let options = options.clone();

		async move {
			cache.get_or_compute_destination(&tenant_context("tenant-a"), "backend", &options).await
		}
	});

	wait_for_loads(&loader, 1).await;

	let b = tokio::time::timeout(
		StdDuration::from_secs(5),
		cache.get_or_compute_destination(&tenant_context("tenant-b"), "backend", &options),
	)
	.await
	.expect("Tenant B must not wait for tenant A.")
	.expect("Tenant B resolution should succeed.");

	assert!(!blocked.is_finished());

	drop(held);

	let a = blocked
		.await
		.expect("Tenant A task should join.")
		.expect("Tenant A resolution should succeed.");

	assert_eq!(a, b);

	let generation = cache.generation();
	let locks = generation.single_locks();

	assert_eq!(locks.len(), 2);
	assert!(locks.contains(&CacheKey::of(Some(&tenant_id("tenant-a")), None)));
	assert!(locks.contains(&CacheKey::of(Some(&tenant_id("tenant-b")), None)));
}

#[tokio::test]
async fn concurrent_callers_share_one_load() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = Arc::new(DestinationResolutionCache::with_settings(
		loader.clone(),
		settings_without_change_detection(),
	)
	.expect("Settings should be valid."));
	let gate = loader.gate("tenant-a");
	let held = gate.lock_arc().await;
	let tasks = (0..8)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move {
				cache
					.get_or_compute_destination(
						&tenant_context("tenant-a"),
						"backend",
						&DestinationOptions::default(),
					)
					.await
			})
		})
		.collect::<Vec<_>>();

	wait_for_loads(&loader, 1).await;
	tokio::time::sleep(StdDuration::from_millis(50)).await;
	drop(held);

	let mut results = Vec::new();

	for task in tasks {
		results.push(
			task.await.expect("Task should join.").expect("Concurrent resolution should succeed."),
		);
	}

	assert_eq!(loader.load_calls(), 1);
	assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn key_shape_follows_strategy() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let unisolated_cache = DestinationCache::new(16);
	let unisolated_locks = IsolationLockTable::new();
	let provider_options = DestinationOptions::builder()
		.augment(
			&DestinationServiceOptions::new()
				.token_exchange_strategy(DestinationTokenExchangeStrategy::LookupOnly)
				.retrieval_strategy(RetrievalStrategy::AlwaysProvider),
		)
		.build();
	let command = GetOrComputeSingleDestinationCommand::prepare_command(
		&user_context("tenant-a", "alice"),
		"backend",
		&provider_options,
		unisolated_cache.clone(),
		unisolated_locks.clone(),
		loader.clone(),
		None,
	)
	.expect("Preparation should succeed.");

	command.execute().await.expect("Resolution should succeed.");
	unisolated_cache.run_pending_tasks().await;

	assert!(command.isolation_key().is_none());
	assert!(unisolated_locks.is_empty());
	assert_eq!(unisolated_cache.entry_count(), 1);

	let isolated_cache = DestinationCache::new(16);
	let isolated_locks = IsolationLockTable::new();
	let exchange_options = options(DestinationTokenExchangeStrategy::ExchangeOnly);
	let ctx = user_context("tenant-a", "alice");
	let command = GetOrComputeSingleDestinationCommand::prepare_command(
		&ctx,
		"backend",
		&exchange_options,
		isolated_cache.clone(),
		isolated_locks.clone(),
		loader.clone(),
		None,
	)
	.expect("Preparation should succeed.");

	command.execute().await.expect("Resolution should succeed.");
	isolated_cache.run_pending_tasks().await;

	let isolation_key = CacheKey::of(Some(&tenant_id("tenant-a")), Some(&principal_id("alice")));

	assert_eq!(isolated_locks.keys(), vec![isolation_key.clone()]);
	assert_eq!(isolated_cache.entry_count(), 1);
	assert!(
		isolated_cache
			.contains_key(&isolation_key.append_name_and_options("backend", &exchange_options))
	);
}

#[tokio::test]
async fn preparation_failure_touches_nothing() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = DestinationResolutionCache::new(loader.clone());
	let err = cache
		.get_or_compute_destination(
			&tenant_context("tenant-a"),
			"backend",
			&options(DestinationTokenExchangeStrategy::ExchangeOnly),
		)
		.await
		.expect_err("ExchangeOnly without a principal should fail.");
	let generation = cache.generation();

	generation.single().run_pending_tasks().await;

	assert!(matches!(err, Error::Context(ContextError::MissingPrincipal)));
	assert_eq!(generation.single().entry_count(), 0);
	assert!(generation.single_locks().is_empty());
	assert!(generation.all_locks().is_empty());
	assert_eq!(loader.load_calls(), 0);
	assert_eq!(loader.load_all_calls(), 0);
}

#[tokio::test]
async fn failed_loads_do_not_poison_the_lock() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = DestinationResolutionCache::with_settings(
		loader.clone(),
		settings_without_change_detection(),
	)
	.expect("Settings should be valid.");
	let ctx = tenant_context("tenant-a");
	let options = DestinationOptions::default();

	loader.fail(true);

	assert!(cache.get_or_compute_destination(&ctx, "backend", &options).await.is_err());

	loader.fail(false);

	cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("Retry after failure should succeed.");

	assert_eq!(loader.load_calls(), 2);
}

#[tokio::test]
async fn change_detection_recomputes_changed_destinations() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = DestinationResolutionCache::new(loader.clone());
	let ctx = tenant_context("tenant-a");
	let options = DestinationOptions::default();

	cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("Initial resolution should succeed.");
	cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("Unchanged resolution should succeed.");

	assert_eq!(loader.load_calls(), 1);

	loader.insert(
		Destination::builder("backend").property("URL", "https://moved.example.com").build(),
	);
	// Drop the cached listing so the next check observes the change.
	cache.generation().all().invalidate_all();

	let changed = cache
		.get_or_compute_destination(&ctx, "backend", &options)
		.await
		.expect("Changed resolution should succeed.");

	assert_eq!(changed.property("URL"), Some(&serde_json::json!("https://moved.example.com")));
	assert_eq!(loader.load_calls(), 2);
}

#[tokio::test]
async fn reset_and_invalidate_drop_cached_values() {
	let loader = Arc::new(StubLoader::with_destinations([destination("backend")]));
	let cache = DestinationResolutionCache::new(loader.clone());
	let ctx = ExecutionContext::anonymous();
	let options = DestinationOptions::default();

	let resolve = || cache.get_or_compute_destination(&ctx, "backend", &options);

	resolve().await.expect("Initial resolution should succeed.");
	cache.invalidate_all();
	resolve().await.expect("Resolution after invalidation should succeed.");

	let before_reset = cache.generation();

	cache.reset();
	resolve().await.expect("Resolution after reset should succeed.");

	assert_eq!(loader.load_calls(), 3);
	assert_eq!(before_reset.single_locks().len(), 1);
	assert_eq!(cache.generation().single_locks().len(), 1);
	assert!(!Arc::ptr_eq(&before_reset, &cache.generation()));
}

#[tokio::test]
async fn user_specific_destinations_are_not_shared_between_principals() {
	let loader = Arc::new(StubLoader::with_destinations([Destination::builder("backend")
		.authentication(AuthenticationType::OAuth2UserTokenExchange)
		.build()]));
	let cache = DestinationResolutionCache::with_settings(
		loader.clone(),
		settings_without_change_detection(),
	)
	.expect("Settings should be valid.");
	let options = DestinationOptions::default();

	for principal in ["alice", "bob", "alice"] {
		cache
			.get_or_compute_destination(&user_context("tenant-a", principal), "backend", &options)
			.await
			.expect("Resolution should succeed.");
	}

	assert_eq!(loader.load_calls(), 2);
}

#[tokio::test]
async fn loaders_may_list_through_the_facade_while_holding_the_isolation_lock() {
	let loader = Arc::new(ListingBackedLoader {
		inner: StubLoader::with_destinations([destination("backend")]),
		..Default::default()
	});
	let cache = Arc::new(DestinationResolutionCache::new(loader.clone()));

	loader.cache.set(Arc::downgrade(&cache)).expect("Facade should be set once.");

	let ctx = tenant_context("tenant-a");
	let options = DestinationOptions::default();

	for _ in 0..2 {
		tokio::time::timeout(
			StdDuration::from_secs(5),
			cache.get_or_compute_destination(&ctx, "backend", &options),
		)
		.await
		.expect("A listing inside a load must not wait on the single-destination lock.")
		.expect("Resolution through the listing should succeed.");
	}

	let generation = cache.generation();
	let isolation_key = CacheKey::of(Some(&tenant_id("tenant-a")), None);

	assert_eq!(loader.inner.load_all_calls(), 1);
	assert!(generation.single_locks().contains(&isolation_key));
	assert!(generation.all_locks().contains(&isolation_key));
}

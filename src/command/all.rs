//! Listing of every destination visible to a tenant + principal.

// self
use crate::{
	_prelude::*,
	cache::{CacheKey, IsolationLockTable},
	command::DestinationListCache,
	context::ExecutionContext,
	destination::{Destination, DestinationLoader, DestinationOptions},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	strategy::RetrievalStrategy,
};

/// Looks up or computes the destination listing of the current tenant + principal.
///
/// Calls for the same identity serialize on one lock and load at most once; calls for
/// different identities never share a lock.
pub struct GetOrComputeAllDestinationsCommand {
	ctx: ExecutionContext,
	options: DestinationOptions,
	isolation_key: CacheKey,
	value_key: CacheKey,
	cache: DestinationListCache,
	locks: IsolationLockTable,
	loader: Arc<dyn DestinationLoader>,
}
impl GetOrComputeAllDestinationsCommand {
	/// Prepares the command.
	///
	/// Fails without touching `cache` or `locks` when the options are invalid or the retrieval
	/// strategy requires a tenant that is not bound.
	pub fn prepare_command(
		ctx: &ExecutionContext,
		options: &DestinationOptions,
		cache: DestinationListCache,
		locks: IsolationLockTable,
		loader: Arc<dyn DestinationLoader>,
	) -> Result<Self> {
		if options.retrieval_strategy()? == RetrievalStrategy::OnlySubscriber {
			ctx.require_tenant()?;
		}

		let isolation_key = CacheKey::of(ctx.tenant_id(), ctx.principal_id());
		let value_key = isolation_key.append(options);

		Ok(Self {
			ctx: ctx.clone(),
			options: options.clone(),
			isolation_key,
			value_key,
			cache,
			locks,
			loader,
		})
	}

	/// Key the isolation lock is stored under.
	pub fn isolation_key(&self) -> &CacheKey {
		&self.isolation_key
	}

	/// Key the listing is cached under.
	pub fn value_key(&self) -> &CacheKey {
		&self.value_key
	}

	/// Returns the cached listing or loads and caches it. Failures are never cached.
	pub async fn execute(&self) -> Result<Arc<Vec<Destination>>> {
		const KIND: OperationKind = OperationKind::AllDestinations;

		let span = OperationSpan::new(KIND, "execute");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		if let Some(listing) = self.cache.get(&self.value_key).await {
			obs::record_operation_outcome(KIND, OperationOutcome::CacheHit);

			return Ok(listing);
		}

		let result = span
			.instrument(async {
				let lock = self.locks.lock_for(&self.isolation_key);
				let _isolated = lock.lock().await;

				if let Some(listing) = self.cache.get(&self.value_key).await {
					return Ok(listing);
				}

				let listing = Arc::new(self.loader.load_all(&self.ctx, &self.options).await?);

				self.cache.insert(self.value_key.clone(), listing.clone()).await;

				Ok(listing)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
impl Debug for GetOrComputeAllDestinationsCommand {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GetOrComputeAllDestinationsCommand")
			.field("isolation_key", &self.isolation_key)
			.field("value_key", &self.value_key)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, destination::RETRIEVAL_STRATEGY_KEY, error::ContextError};

	fn prepare(
		ctx: &ExecutionContext,
		loader: &Arc<StubLoader>,
	) -> Result<GetOrComputeAllDestinationsCommand> {
		GetOrComputeAllDestinationsCommand::prepare_command(
			ctx,
			&DestinationOptions::default(),
			DestinationListCache::new(16),
			IsolationLockTable::new(),
			loader.clone(),
		)
	}

	#[test]
	fn keys_are_tenant_and_principal_scoped() {
		let loader = Arc::new(StubLoader::default());
		let command =
			prepare(&user_context("tenant-a", "alice"), &loader).expect("Preparation should succeed.");

		assert_eq!(
			command.isolation_key(),
			&CacheKey::of(Some(&tenant_id("tenant-a")), Some(&principal_id("alice")))
		);
		assert_eq!(command.value_key().len(), 3);
	}

	#[test]
	fn only_subscriber_requires_tenant() {
		let loader = Arc::new(StubLoader::default());
		let options =
			DestinationOptions::builder().parameter(RETRIEVAL_STRATEGY_KEY, "OnlySubscriber").build();
		let locks = IsolationLockTable::new();
		let err = GetOrComputeAllDestinationsCommand::prepare_command(
			&ExecutionContext::anonymous(),
			&options,
			DestinationListCache::new(16),
			locks.clone(),
			loader,
		)
		.expect_err("A missing tenant should fail preparation.");

		assert!(matches!(err, Error::Context(ContextError::MissingTenant)));
		assert!(locks.is_empty());
	}

	#[tokio::test]
	async fn listing_is_loaded_once() {
		let loader = Arc::new(StubLoader::with_destinations([destination("a"), destination("b")]));
		let command =
			prepare(&tenant_context("tenant-a"), &loader).expect("Preparation should succeed.");
		let first = command.execute().await.expect("Listing should load.");
		let second = command.execute().await.expect("Listing should be cached.");

		assert_eq!(first, second);
		assert_eq!(first.len(), 2);
		assert_eq!(loader.load_all_calls(), 1);
	}

	#[tokio::test]
	async fn failures_are_not_cached() {
		let loader = Arc::new(StubLoader::with_destinations([destination("a")]));
		let command =
			prepare(&tenant_context("tenant-a"), &loader).expect("Preparation should succeed.");

		loader.fail(true);

		assert!(matches!(command.execute().await, Err(Error::DestinationAccess { .. })));

		loader.fail(false);

		assert_eq!(command.execute().await.expect("Second attempt should load.").len(), 1);
		assert_eq!(loader.load_all_calls(), 2);
	}
}

//! Resolution of one destination by name.

// self
use crate::{
	_prelude::*,
	cache::{CacheKey, IsolationLockTable},
	command::{DestinationCache, GetOrComputeAllDestinationsCommand},
	context::ExecutionContext,
	destination::{Destination, DestinationLoader, DestinationOptions},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	strategy::DestinationTokenExchangeStrategy,
};

/// Looks up or computes a single destination under the isolation its token exchange strategy
/// requires.
///
/// Preparation derives three keys from the context:
///
/// - the isolation key, absent when the strategy needs no identity segregation
/// - the value key: isolation key (or the empty key) + name + options
/// - for strategies that decide after the lookup whether the result is user specific, an
///   additional principal-scoped value key
pub struct GetOrComputeSingleDestinationCommand {
	ctx: ExecutionContext,
	name: String,
	options: DestinationOptions,
	strategy: DestinationTokenExchangeStrategy,
	isolation_key: Option<CacheKey>,
	value_key: CacheKey,
	principal_value_key: Option<CacheKey>,
	cache: DestinationCache,
	locks: IsolationLockTable,
	loader: Arc<dyn DestinationLoader>,
	change_detection: Option<GetOrComputeAllDestinationsCommand>,
}
impl GetOrComputeSingleDestinationCommand {
	/// Prepares the command.
	///
	/// The strategy comes from the options, falling back to the one implied by the declared
	/// authentication type. Fails without touching `cache` or `locks` when the options are
	/// invalid or the context lacks an identity component the strategy requires.
	pub fn prepare_command(
		ctx: &ExecutionContext,
		name: &str,
		options: &DestinationOptions,
		cache: DestinationCache,
		locks: IsolationLockTable,
		loader: Arc<dyn DestinationLoader>,
		change_detection: Option<GetOrComputeAllDestinationsCommand>,
	) -> Result<Self> {
		let declared = options.authentication_type()?;
		let retrieval = options.retrieval_strategy()?;
		let strategy = DestinationTokenExchangeStrategy::resolve(
			declared,
			options.token_exchange_strategy()?,
		);
		let isolation_key = CacheKey::for_isolation(ctx, strategy.isolation(retrieval))?;
		let value_key = isolation_key
			.clone()
			.unwrap_or_else(CacheKey::of_no_isolation)
			.append_name_and_options(name, options);
		let principal_value_key = match strategy.principal_isolation(retrieval) {
			Some(isolation) => CacheKey::for_isolation(ctx, isolation)?
				.filter(|key| key.principal().is_some())
				.map(|key| key.append_name_and_options(name, options)),
			None => None,
		};

		Ok(Self {
			ctx: ctx.clone(),
			name: name.to_owned(),
			options: options.clone(),
			strategy,
			isolation_key,
			value_key,
			principal_value_key,
			cache,
			locks,
			loader,
			change_detection,
		})
	}

	/// Strategy the command runs under.
	pub fn strategy(&self) -> DestinationTokenExchangeStrategy {
		self.strategy
	}

	/// Key the isolation lock is stored under; `None` when no identity segregation applies.
	pub fn isolation_key(&self) -> Option<&CacheKey> {
		self.isolation_key.as_ref()
	}

	/// Primary key the destination is cached under.
	pub fn value_key(&self) -> &CacheKey {
		&self.value_key
	}

	/// Additional key for destinations that turn out to require the user.
	pub fn principal_value_key(&self) -> Option<&CacheKey> {
		self.principal_value_key.as_ref()
	}

	/// Returns the cached destination or loads and caches it. Failures are never cached.
	pub async fn execute(&self) -> Result<Destination> {
		const KIND: OperationKind = OperationKind::SingleDestination;

		let span = OperationSpan::new(KIND, "execute");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		if let Some(destination) =
			span.instrument(self.cached(self.change_detection.as_ref())).await
		{
			obs::record_operation_outcome(KIND, OperationOutcome::CacheHit);

			return Ok(destination);
		}

		let result = span.instrument(self.compute()).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn compute(&self) -> Result<Destination> {
		let Some(isolation_key) = &self.isolation_key else {
			return self
				.cache
				.try_get_with(self.value_key.clone(), async {
					let destination = self.load().await?;

					self.storage_key(&destination)?;

					Ok(destination)
				})
				.await
				.map_err(Error::from_shared);
		};
		let lock = self.locks.lock_for(isolation_key);
		let _isolated = lock.lock().await;

		// Change detection already ran before the lock; it must not nest under it.
		if let Some(destination) = self.cached(None).await {
			return Ok(destination);
		}

		let destination = self.load().await?;
		let key = self.storage_key(&destination)?;

		self.cache.insert(key, destination.clone()).await;

		Ok(destination)
	}

	async fn load(&self) -> Result<Destination> {
		self.loader.load(&self.ctx, &self.name, &self.options).await
	}

	async fn cached(
		&self,
		change_detection: Option<&GetOrComputeAllDestinationsCommand>,
	) -> Option<Destination> {
		// The loaded destination, not the declared type, decides where the value was stored.
		for key in [Some(&self.value_key), self.principal_value_key.as_ref()].into_iter().flatten() {
			let Some(destination) = self.cache.get(key).await else {
				continue;
			};

			if destination.has_expiring_credentials(OffsetDateTime::now_utc()) {
				tracing::debug!(
					destination = %self.name,
					"Cached destination has expiring credentials; recomputing."
				);
				self.cache.invalidate(key).await;

				continue;
			}
			if let Some(listing) = change_detection
				&& Self::has_changed(&destination, listing).await
			{
				tracing::debug!(
					destination = %self.name,
					"Cached destination changed in the destination listing; recomputing."
				);
				self.cache.invalidate(key).await;

				continue;
			}

			return Some(destination);
		}

		None
	}

	async fn has_changed(
		destination: &Destination,
		listing: &GetOrComputeAllDestinationsCommand,
	) -> bool {
		match listing.execute().await {
			Ok(listed) => !listed
				.iter()
				.find(|candidate| candidate.name() == destination.name())
				.is_some_and(|candidate| destination.matches_listing(candidate)),
			Err(e) => {
				tracing::warn!(
					destination = %destination.name(),
					error = %e,
					"Change detection failed; keeping the cached destination."
				);

				false
			},
		}
	}

	/// Decides where a freshly loaded destination is cached.
	fn storage_key(&self, destination: &Destination) -> Result<CacheKey> {
		let requires_exchange = destination.requires_user_token_exchange();

		match self.strategy {
			DestinationTokenExchangeStrategy::LookupOnly => {
				if requires_exchange {
					tracing::debug!(
						destination = %self.name,
						authentication = %destination.authentication(),
						"Destination requires a user token exchange that the LookupOnly strategy skips."
					);
				}

				Ok(self.value_key.clone())
			},
			DestinationTokenExchangeStrategy::ExchangeOnly => {
				if !requires_exchange {
					tracing::warn!(
						destination = %self.name,
						authentication = %destination.authentication(),
						"The ExchangeOnly strategy exchanged a user token for a destination that does not need one."
					);
				}

				Ok(self.value_key.clone())
			},
			DestinationTokenExchangeStrategy::LookupThenExchange
			| DestinationTokenExchangeStrategy::ForwardUserToken =>
				if requires_exchange {
					self.principal_value_key.clone().ok_or_else(|| {
						Error::destination_access(format!(
							"Destination `{}` requires a user token exchange, but no principal is bound to the current execution context.",
							self.name
						))
					})
				} else {
					Ok(self.value_key.clone())
				},
		}
	}
}
impl Debug for GetOrComputeSingleDestinationCommand {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GetOrComputeSingleDestinationCommand")
			.field("name", &self.name)
			.field("strategy", &self.strategy)
			.field("isolation_key", &self.isolation_key)
			.field("value_key", &self.value_key)
			.field("principal_value_key", &self.principal_value_key)
			.finish_non_exhaustive()
	}
}

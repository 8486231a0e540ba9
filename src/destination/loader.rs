//! Loader seam: how the caches compute a destination on a miss.

// self
use crate::{
	_prelude::*,
	context::ExecutionContext,
	destination::{Destination, DestinationOptions},
};

/// Boxed future returned by [`DestinationLoader`] implementations.
pub type LoaderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Fetches raw destinations from the remote configuration service.
///
/// Implementations own the HTTP calls, response parsing, and any token exchange the lookup needs.
/// The caches call them at most once per isolation key at a time and never cache a failure.
///
/// Loads run while the isolation lock of their key is held, and that lock is not reentrant. A
/// [`load`](Self::load) may list destinations through the facade, since listings lock a separate
/// table, but it must not resolve a single destination for the same isolation key: that call
/// would wait on the lock its own caller holds. The same applies to [`load_all`](Self::load_all)
/// and nested listings.
pub trait DestinationLoader
where
	Self: 'static + Send + Sync,
{
	/// Loads a single destination by name.
	fn load<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		name: &'a str,
		options: &'a DestinationOptions,
	) -> LoaderFuture<'a, Destination>;

	/// Lists every destination visible to the context.
	fn load_all<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		options: &'a DestinationOptions,
	) -> LoaderFuture<'a, Vec<Destination>>;
}

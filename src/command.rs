//! Prepared, single-use commands that return a cached or freshly computed result.
//!
//! Preparation derives the isolation and value keys from the execution context and fails before
//! any cache or lock is touched when the context is insufficient. Execution follows a
//! double-checked pattern: value cache, isolation lock, value cache again, loader.

pub mod all;
pub mod single;

pub use all::*;
pub use single::*;

// crates.io
use moka::future::Cache;
// self
use crate::{_prelude::*, cache::CacheKey, destination::Destination};

/// Value cache for single destinations.
pub type DestinationCache = Cache<CacheKey, Destination>;
/// Value cache for destination listings.
pub type DestinationListCache = Cache<CacheKey, Arc<Vec<Destination>>>;

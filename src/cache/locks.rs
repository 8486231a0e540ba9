//! Per-identity isolation locks.

// self
use crate::{_prelude::*, cache::CacheKey};

/// Lazily populated table of per-isolation-key async mutexes.
///
/// Entries are never evicted. A lock handed out by [`IsolationLockTable::lock_for`] stays the
/// only lock for its key until the whole table is dropped, so a held lock can never be replaced
/// under a waiting caller. Resetting the facade swaps in a fresh table instead of clearing this
/// one.
#[derive(Clone, Debug, Default)]
pub struct IsolationLockTable(Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>);
impl IsolationLockTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns (and creates on demand) the lock for `key`.
	pub fn lock_for(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut locks = self.0.lock();

		locks.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Returns the lock for `key` without creating one.
	pub fn get(&self, key: &CacheKey) -> Option<Arc<AsyncMutex<()>>> {
		self.0.lock().get(key).cloned()
	}

	/// Returns `true` if a lock exists for `key`.
	pub fn contains(&self, key: &CacheKey) -> bool {
		self.0.lock().contains_key(key)
	}

	/// Number of distinct keys that ever requested a lock.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when no lock was ever requested.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	/// Snapshot of all keys holding a lock entry.
	pub fn keys(&self) -> Vec<CacheKey> {
		self.0.lock().keys().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::TenantId;

	fn key(tenant: &str) -> CacheKey {
		let tenant = TenantId::new(tenant).expect("Tenant fixture should be valid.");

		CacheKey::of(Some(&tenant), None)
	}

	#[test]
	fn lock_for_reuses_entry_per_key() {
		let table = IsolationLockTable::new();
		let first = table.lock_for(&key("subaccount-a"));
		let again = table.lock_for(&key("subaccount-a"));
		let other = table.lock_for(&key("subaccount-b"));

		assert!(Arc::ptr_eq(&first, &again));
		assert!(!Arc::ptr_eq(&first, &other));
		assert_eq!(table.len(), 2);
		assert!(table.get(&key("subaccount-c")).is_none());
		assert_eq!(table.len(), 2, "Lookups without creation must not add entries.");
	}

	#[test]
	fn held_locks_stay_in_place() {
		let table = IsolationLockTable::new();
		let lock = table.lock_for(&key("subaccount-a"));
		let guard = lock.try_lock().expect("Fresh lock should be free.");
		let same = table.lock_for(&key("subaccount-a"));

		assert!(same.try_lock().is_none(), "A second handle must observe the held lock.");

		drop(guard);

		assert!(same.try_lock().is_some());
		assert!(table.contains(&key("subaccount-a")));
	}
}

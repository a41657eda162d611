//! TTL response cache keyed by `<vin>:<endpoint>`.

// self
use crate::_prelude::*;

/// Cached response plus the metadata needed to judge freshness.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// Cache key.
	pub key: String,
	/// Cached JSON body.
	pub value: Value,
	/// Instant the value was stored.
	pub stored_at: OffsetDateTime,
	/// How long the value stays fresh.
	pub ttl: Duration,
}
impl CacheEntry {
	/// Returns `true` while `instant < stored_at + ttl`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.stored_at + self.ttl
	}
}

/// In-memory response cache. Expired entries are evicted lazily on lookup; there is no sweeper.
#[derive(Debug, Default)]
pub struct ResponseCache {
	entries: Mutex<HashMap<String, CacheEntry>>,
}
impl ResponseCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a fresh value for `key`, if present.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.get_at(key, OffsetDateTime::now_utc())
	}

	/// Returns the value for `key` when it is still fresh at `instant`, evicting it otherwise.
	pub fn get_at(&self, key: &str, instant: OffsetDateTime) -> Option<Value> {
		let mut entries = self.entries.lock();
		let entry = entries.get(key)?;

		if entry.is_fresh_at(instant) {
			return Some(entry.value.clone());
		}

		entries.remove(key);

		None
	}

	/// Stores `value` under `key`, replacing any previous entry.
	pub fn put(&self, key: impl Into<String>, value: Value, ttl: Duration) {
		self.put_at(key, value, ttl, OffsetDateTime::now_utc());
	}

	/// Stores `value` under `key` as if it arrived at `instant`.
	pub fn put_at(&self, key: impl Into<String>, value: Value, ttl: Duration, instant: OffsetDateTime) {
		let key = key.into();
		let entry = CacheEntry { key: key.clone(), value, stored_at: instant, ttl };

		self.entries.lock().insert(key, entry);
	}

	/// Removes the entry for `key`.
	pub fn invalidate(&self, key: &str) -> Option<CacheEntry> {
		self.entries.lock().remove(key)
	}

	/// Removes every entry.
	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	/// Number of stored entries, fresh or not.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

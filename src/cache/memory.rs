//! Thread-safe in-process [`CacheEngine`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheEngine, CacheFuture, DEFAULT_KEY_PREFIX},
	clock::{Clock, SystemClock},
};

type EntryMap = Arc<RwLock<HashMap<String, MemoryEntry>>>;

#[derive(Clone, Debug)]
struct MemoryEntry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl MemoryEntry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|instant| instant > now)
	}
}

/// In-memory engine honoring absolute expiry against its [`Clock`].
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct MemoryCache {
	entries: EntryMap,
	clock: Arc<dyn Clock>,
	prefix: String,
}
impl MemoryCache {
	/// Creates an empty cache using the wall clock and [`DEFAULT_KEY_PREFIX`].
	pub fn new() -> Self {
		Self {
			entries: Default::default(),
			clock: Arc::new(SystemClock),
			prefix: DEFAULT_KEY_PREFIX.to_owned(),
		}
	}

	/// Replaces the time source used to evaluate expiry.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the key prefix.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();

		self
	}

	/// Number of live keys.
	pub fn len(&self) -> usize {
		let now = self.clock.now();

		self.entries.read().values().filter(|entry| entry.is_live(now)).count()
	}

	/// Returns `true` when no live key is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn key(&self, key: &str) -> String {
		format!("{}{key}", self.prefix)
	}

	fn live_value(&self, key: &str) -> Option<String> {
		let key = self.key(key);
		let now = self.clock.now();
		let mut guard = self.entries.write();

		match guard.get(&key) {
			Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
			Some(_) => {
				guard.remove(&key);

				None
			},
			None => None,
		}
	}

	fn set_now(&self, key: &str, value: String, expires_at: Option<OffsetDateTime>) {
		let key = self.key(key);
		let now = self.clock.now();
		let mut guard = self.entries.write();

		// Expired entries are otherwise only dropped when their own key is read again.
		guard.retain(|_, entry| entry.is_live(now));

		if expires_at.is_some_and(|instant| instant <= now) {
			guard.remove(&key);
		} else {
			guard.insert(key, MemoryEntry { value, expires_at });
		}
	}

	#[cfg(test)]
	fn stored(&self) -> usize {
		self.entries.read().len()
	}

	fn expire_now(&self, key: &str, instant: OffsetDateTime) -> bool {
		let key = self.key(key);
		let now = self.clock.now();
		let mut guard = self.entries.write();
		let live = guard.get(&key).is_some_and(|entry| entry.is_live(now));

		if !live {
			guard.remove(&key);

			return false;
		}
		if instant <= now {
			guard.remove(&key);
		} else if let Some(entry) = guard.get_mut(&key) {
			entry.expires_at = Some(instant);
		}

		true
	}
}
impl Default for MemoryCache {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for MemoryCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryCache")
			.field("prefix", &self.prefix)
			.field("keys", &self.entries.read().len())
			.finish()
	}
}
impl CacheEngine for MemoryCache {
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move { Ok(self.live_value(key).is_some()) })
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.live_value(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key, value, None);

			Ok(())
		})
	}

	fn set_until<'a>(
		&'a self,
		key: &'a str,
		value: String,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key, value, Some(instant));

			Ok(())
		})
	}

	fn expire_at<'a>(&'a self, key: &'a str, instant: OffsetDateTime) -> CacheFuture<'a, bool> {
		Box::pin(async move { Ok(self.expire_now(key, instant)) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn cache() -> (MemoryCache, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2026-01-01 00:00 UTC));

		(MemoryCache::new().with_clock(Arc::new(clock.clone())), clock)
	}

	#[tokio::test]
	async fn values_expire_at_the_absolute_instant() {
		let (cache, clock) = cache();

		cache.set("k", "v".into()).await.expect("Set should succeed.");

		assert!(
			cache
				.expire_at("k", macros::datetime!(2026-01-01 00:05 UTC))
				.await
				.expect("Expire should succeed.")
		);

		clock.set(macros::datetime!(2026-01-01 00:04:59 UTC));

		assert_eq!(cache.get("k").await.expect("Get should succeed."), Some("v".into()));

		clock.set(macros::datetime!(2026-01-01 00:05 UTC));

		assert!(!cache.exists("k").await.expect("Exists should succeed."));
		assert_eq!(cache.get("k").await.expect("Get should succeed."), None);
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn set_clears_a_previous_expiry_and_missing_keys_do_not_expire() {
		let (cache, clock) = cache();

		cache.set("k", "v1".into()).await.expect("Set should succeed.");
		cache
			.expire_at("k", macros::datetime!(2026-01-01 00:01 UTC))
			.await
			.expect("Expire should succeed.");
		cache.set("k", "v2".into()).await.expect("Set should succeed.");
		clock.advance(Duration::hours(1));

		assert_eq!(cache.get("k").await.expect("Get should succeed."), Some("v2".into()));
		assert!(
			!cache
				.expire_at("missing", macros::datetime!(2027-01-01 00:00 UTC))
				.await
				.expect("Expire should succeed.")
		);
	}

	#[tokio::test]
	async fn writes_drop_entries_that_already_expired() {
		let (cache, clock) = cache();

		for i in 0..1000 {
			cache
				.set_until(
					&format!("k{i}"),
					"v".into(),
					macros::datetime!(2026-01-01 00:05 UTC),
				)
				.await
				.expect("Set should succeed.");
		}

		assert_eq!(cache.stored(), 1000);

		clock.advance(Duration::hours(1));

		assert!(cache.is_empty());
		assert_eq!(cache.stored(), 1000);

		cache.set("fresh", "v".into()).await.expect("Set should succeed.");

		assert_eq!(cache.stored(), 1);
	}

	#[tokio::test]
	async fn set_until_applies_the_expiry_atomically() {
		let (cache, clock) = cache();

		cache
			.set_until("k", "v".into(), macros::datetime!(2026-01-01 00:01 UTC))
			.await
			.expect("Set should succeed.");

		assert_eq!(cache.get("k").await.expect("Get should succeed."), Some("v".into()));

		clock.advance(Duration::minutes(1));

		assert!(!cache.exists("k").await.expect("Exists should succeed."));

		cache
			.set_until("past", "v".into(), macros::datetime!(2025-12-31 00:00 UTC))
			.await
			.expect("Set should succeed.");

		assert!(!cache.exists("past").await.expect("Exists should succeed."));
	}

	#[tokio::test]
	async fn expiring_in_the_past_deletes_and_prefix_isolates() {
		let (cache, _clock) = cache();
		let other = MemoryCache { prefix: "other_".into(), ..cache.clone() };

		cache.set("k", "v".into()).await.expect("Set should succeed.");

		assert!(!other.exists("k").await.expect("Exists should succeed."));
		assert!(
			cache
				.expire_at("k", macros::datetime!(2025-12-31 23:59 UTC))
				.await
				.expect("Expire should succeed.")
		);
		assert!(!cache.exists("k").await.expect("Exists should succeed."));
	}
}

//! Key-value cache engines and the signature-keyed response cache built on them.
//!
//! [`CacheEngine`] is the only contract the client needs from a backing store: existence checks,
//! string reads and writes, and absolute expiry. Key prefixing is the engine's job. The budget
//! tracker and [`ResponseCache`] share one engine.

pub mod entry;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use entry::*;
pub use memory::MemoryCache;
#[cfg(feature = "redis")] pub use self::redis::RedisCache;

// self
use crate::_prelude::*;

/// Default key prefix applied by the bundled engines.
pub const DEFAULT_KEY_PREFIX: &str = "swg_";

/// Boxed future returned by [`CacheEngine`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage contract for cached responses and the error budget.
///
/// Expired keys must behave exactly like missing keys for [`exists`](CacheEngine::exists) and
/// [`get`](CacheEngine::get). [`set`](CacheEngine::set) clears any expiry previously attached to
/// the key, matching Redis `SET`. Writes that must expire go through
/// [`set_until`](CacheEngine::set_until) so a value never outlives a failed expiry call.
pub trait CacheEngine
where
	Self: Send + Sync,
{
	/// Returns `true` if `key` holds a live value.
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

	/// Reads the value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key` without expiry.
	fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()>;

	/// Stores `value` under `key` and expires it at `instant` in one step.
	///
	/// An `instant` that is not in the future leaves `key` absent.
	fn set_until<'a>(
		&'a self,
		key: &'a str,
		value: String,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, ()>;

	/// Expires `key` at `instant`; returns `false` when the key does not exist.
	fn expire_at<'a>(&'a self, key: &'a str, instant: OffsetDateTime) -> CacheFuture<'a, bool>;
}

/// Error type produced by [`CacheEngine`] implementations and cache entry codecs.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// A stored value could not be encoded or decoded.
	#[error("Cache serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure of the cache engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

//! Redis-backed [`CacheEngine`] (feature `redis`). `set_until` needs Redis 6.2 or newer.

// crates.io
use ::redis::{Client, RedisError, aio::ConnectionManager};
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	cache::{CacheEngine, CacheError, CacheFuture, DEFAULT_KEY_PREFIX},
};

/// Engine storing values in Redis through a lazily established [`ConnectionManager`].
///
/// Expiry is delegated to Redis (`SET .. EXAT`, `EXPIREAT`), so several processes can share one
/// cache and one error budget.
pub struct RedisCache {
	client: Client,
	connection: OnceCell<ConnectionManager>,
	prefix: String,
}
impl RedisCache {
	/// Opens a client for `url` (e.g. `redis://127.0.0.1/`) using `prefix` for every key.
	///
	/// The connection itself is established on first use.
	pub fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, CacheError> {
		let client = Client::open(url).map_err(backend_error)?;

		Ok(Self { client, connection: OnceCell::new(), prefix: prefix.into() })
	}

	/// Opens a client for `url` with [`DEFAULT_KEY_PREFIX`].
	pub fn connect_default(url: &str) -> Result<Self, CacheError> {
		Self::connect(url, DEFAULT_KEY_PREFIX)
	}

	async fn connection(&self) -> Result<ConnectionManager, CacheError> {
		let manager = self
			.connection
			.get_or_try_init(|| self.client.get_connection_manager())
			.await
			.map_err(backend_error)?;

		Ok(manager.clone())
	}

	fn key(&self, key: &str) -> String {
		format!("{}{key}", self.prefix)
	}
}
impl Debug for RedisCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCache").field("prefix", &self.prefix).finish()
	}
}
impl CacheEngine for RedisCache {
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let found: i64 = ::redis::cmd("EXISTS")
				.arg(self.key(key))
				.query_async(&mut con)
				.await
				.map_err(backend_error)?;

			Ok(found > 0)
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut con = self.connection().await?;

			::redis::cmd("GET")
				.arg(self.key(key))
				.query_async(&mut con)
				.await
				.map_err(backend_error)
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut con = self.connection().await?;

			::redis::cmd("SET")
				.arg(self.key(key))
				.arg(value)
				.query_async::<()>(&mut con)
				.await
				.map_err(backend_error)
		})
	}

	fn set_until<'a>(
		&'a self,
		key: &'a str,
		value: String,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut con = self.connection().await?;

			// `SET .. EXAT` rejects non-positive timestamps; a past instant means "absent".
			if instant.unix_timestamp() <= 0 {
				return ::redis::cmd("DEL")
					.arg(self.key(key))
					.query_async::<()>(&mut con)
					.await
					.map_err(backend_error);
			}

			::redis::cmd("SET")
				.arg(self.key(key))
				.arg(value)
				.arg("EXAT")
				.arg(instant.unix_timestamp())
				.query_async::<()>(&mut con)
				.await
				.map_err(backend_error)
		})
	}

	fn expire_at<'a>(&'a self, key: &'a str, instant: OffsetDateTime) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let applied: i64 = ::redis::cmd("EXPIREAT")
				.arg(self.key(key))
				.arg(instant.unix_timestamp())
				.query_async(&mut con)
				.await
				.map_err(backend_error)?;

			Ok(applied > 0)
		})
	}
}

fn backend_error(err: RedisError) -> CacheError {
	CacheError::Backend { message: err.to_string() }
}

//! Cached ESI responses and the signature-keyed store that holds them.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use time::{
	PrimitiveDateTime,
	format_description::{BorrowedFormatItem, well_known::Rfc2822},
	macros::format_description,
};
// self
use crate::{
	_prelude::*,
	cache::{CacheEngine, CacheError},
	clock::Clock,
	esi::RequestSignature,
};

const ENTRY_VERSION: u8 = 1;
const IMF_FIXDATE: &[BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Response snapshot stored in the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
	/// HTTP status code.
	pub status: u16,
	/// Reason phrase.
	pub reason: String,
	/// Response headers; names are lowercase.
	pub headers: BTreeMap<String, Vec<String>>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl CacheEntry {
	/// Encodes the entry as a versioned JSON document with a base64 body.
	pub fn encode(&self) -> Result<String, CacheError> {
		let stored = StoredEntry {
			v: ENTRY_VERSION,
			status: self.status,
			reason: self.reason.clone(),
			headers: self.headers.clone(),
			body: STANDARD.encode(&self.body),
		};

		serde_json::to_string(&stored)
			.map_err(|e| CacheError::Serialization { message: e.to_string() })
	}

	/// Decodes a document produced by [`encode`](Self::encode).
	pub fn decode(raw: &str) -> Result<Self, CacheError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let stored: StoredEntry = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| CacheError::Serialization {
				message: format!("cache entry is malformed at `{}`: {}", e.path(), e.inner()),
			})?;

		if stored.v != ENTRY_VERSION {
			return Err(CacheError::Serialization {
				message: format!("unsupported cache entry version {}", stored.v),
			});
		}

		let body = STANDARD
			.decode(stored.body.as_bytes())
			.map_err(|e| CacheError::Serialization { message: e.to_string() })?;

		Ok(Self { status: stored.status, reason: stored.reason, headers: stored.headers, body })
	}
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
	v: u8,
	status: u16,
	reason: String,
	headers: BTreeMap<String, Vec<String>>,
	body: String,
}

/// Signature-keyed response store with server-dictated absolute expiry.
#[derive(Clone)]
pub struct ResponseCache {
	engine: Arc<dyn CacheEngine>,
	clock: Arc<dyn Clock>,
}
impl ResponseCache {
	/// Wraps `engine`, judging `Expires` headers against `clock`.
	pub fn new(engine: Arc<dyn CacheEngine>, clock: Arc<dyn Clock>) -> Self {
		Self { engine, clock }
	}

	/// Returns the live entry stored under `signature`, if any.
	pub async fn lookup(&self, signature: &RequestSignature) -> Result<Option<CacheEntry>> {
		let key = signature.cache_key();

		if !self.engine.exists(&key).await? {
			return Ok(None);
		}

		match self.engine.get(&key).await? {
			Some(raw) => Ok(Some(CacheEntry::decode(&raw)?)),
			// Expired between the two calls.
			None => Ok(None),
		}
	}

	/// Stores `entry` under `signature` until the instant named by `expires`.
	///
	/// Returns `false` without writing when the header is absent, unparseable, or not in the
	/// future.
	pub async fn store(
		&self,
		entry: &CacheEntry,
		signature: &RequestSignature,
		expires: Option<&str>,
	) -> Result<bool> {
		let Some(expires_at) = expires.and_then(parse_http_date) else {
			return Ok(false);
		};

		if expires_at <= self.clock.now() {
			return Ok(false);
		}

		let key = signature.cache_key();

		self.engine.set_until(&key, entry.encode()?, expires_at).await?;

		Ok(true)
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ResponseCache(..)")
	}
}

/// Parses an HTTP date (`Thu, 01 Jan 2026 00:05:00 GMT`).
pub fn parse_http_date(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	OffsetDateTime::parse(raw, &Rfc2822).ok().or_else(|| {
		PrimitiveDateTime::parse(raw, IMF_FIXDATE).ok().map(PrimitiveDateTime::assume_utc)
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		cache::MemoryCache,
		clock::ManualClock,
		esi::{ApiMethod, RequestOptions},
	};

	fn entry() -> CacheEntry {
		CacheEntry {
			status: 200,
			reason: "OK".into(),
			headers: BTreeMap::from([(
				"cache-control".to_owned(),
				vec!["public".to_owned()],
			)]),
			body: b"{\"players\":31337}".to_vec(),
		}
	}

	fn signature(endpoint: &str) -> RequestSignature {
		RequestSignature::compute(
			ApiMethod::Get,
			endpoint,
			"latest",
			&RequestOptions::default(),
			None,
			"tranquility",
		)
	}

	#[test]
	fn encoding_is_versioned() {
		let raw = entry().encode().expect("Entry should encode.");

		assert!(raw.starts_with("{\"v\":1,"));
		assert_eq!(CacheEntry::decode(&raw).expect("Entry should decode."), entry());

		let future = raw.replacen("\"v\":1", "\"v\":2", 1);

		assert!(matches!(CacheEntry::decode(&future), Err(CacheError::Serialization { .. })));
		assert!(matches!(CacheEntry::decode("[]"), Err(CacheError::Serialization { .. })));
	}

	#[test]
	fn http_dates_parse() {
		assert_eq!(
			parse_http_date("Thu, 01 Jan 2026 00:05:00 GMT"),
			Some(macros::datetime!(2026-01-01 00:05 UTC))
		);
		assert_eq!(
			parse_http_date(" Thu, 01 Jan 2026 00:05:00 +0000 "),
			Some(macros::datetime!(2026-01-01 00:05 UTC))
		);
		assert_eq!(parse_http_date("next tuesday"), None);
		assert_eq!(parse_http_date("0"), None);
	}

	#[tokio::test]
	async fn store_expires_at_the_header_instant() {
		let clock = ManualClock::new(macros::datetime!(2026-01-01 00:00 UTC));
		let shared: Arc<dyn Clock> = Arc::new(clock.clone());
		let cache = ResponseCache::new(
			Arc::new(MemoryCache::new().with_clock(shared.clone())),
			shared,
		);
		let signature = signature("status");

		assert!(
			cache
				.store(&entry(), &signature, Some("Thu, 01 Jan 2026 00:05:00 GMT"))
				.await
				.expect("Store should succeed.")
		);

		clock.set(macros::datetime!(2026-01-01 00:04:59 UTC));

		assert_eq!(cache.lookup(&signature).await.expect("Lookup should succeed."), Some(entry()));

		clock.set(macros::datetime!(2026-01-01 00:05:01 UTC));

		assert_eq!(cache.lookup(&signature).await.expect("Lookup should succeed."), None);
	}

	#[tokio::test]
	async fn store_skips_missing_invalid_or_stale_expiry() {
		let clock: Arc<dyn Clock> =
			Arc::new(ManualClock::new(macros::datetime!(2026-01-01 00:00 UTC)));
		let engine = MemoryCache::new().with_clock(clock.clone());
		let cache = ResponseCache::new(Arc::new(engine.clone()), clock);
		let signature = signature("status");

		for expires in [None, Some("garbage"), Some("Wed, 31 Dec 2025 23:59:00 GMT")] {
			assert!(
				!cache.store(&entry(), &signature, expires).await.expect("Store should succeed.")
			);
		}

		assert!(engine.is_empty());
	}
}

// std
use std::borrow::Cow;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, budget, cache::CacheEntry};

/// Cache scope a response asked for through its first `Cache-Control` directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheScope {
	/// Cached under the signature of the requesting principal.
	Private,
	/// Cached under the depersonalized signature and shared across principals.
	Public,
	/// Not cached.
	Uncacheable,
}

/// ESI response, either fresh from the network or replayed from the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Reason phrase.
	pub reason: String,
	/// Response headers keyed by lowercase name.
	pub headers: BTreeMap<String, Vec<String>>,
	/// Raw body.
	pub body: Vec<u8>,
	/// `true` when the response was served from the cache.
	pub from_cache: bool,
}
impl ApiResponse {
	/// Rebuilds a response from a cache entry.
	pub fn from_entry(entry: CacheEntry) -> Self {
		Self {
			status: entry.status,
			reason: entry.reason,
			headers: entry.headers,
			body: entry.body,
			from_cache: true,
		}
	}

	/// Snapshot suitable for the cache.
	pub fn to_entry(&self) -> CacheEntry {
		CacheEntry {
			status: self.status,
			reason: self.reason.clone(),
			headers: self.headers.clone(),
			body: self.body.clone(),
		}
	}

	/// Converts the response into a cache entry.
	pub fn into_entry(self) -> CacheEntry {
		CacheEntry { status: self.status, reason: self.reason, headers: self.headers, body: self.body }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// First value of header `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.header_values(name).first().map(String::as_str)
	}

	/// All values of header `name` (case-insensitive).
	pub fn header_values(&self, name: &str) -> &[String] {
		self.headers.get(&name.to_ascii_lowercase()).map(Vec::as_slice).unwrap_or_default()
	}

	/// Raw `Expires` header.
	pub fn expires(&self) -> Option<&str> {
		self.header("expires")
	}

	/// Remaining error budget reported by ESI.
	pub fn error_limit_remain(&self) -> Option<i64> {
		self.header(budget::ERROR_LIMIT_REMAIN_HEADER).and_then(budget::parse_header_integer)
	}

	/// Seconds until the error budget resets, as reported by ESI.
	pub fn error_limit_reset(&self) -> Option<i64> {
		self.header(budget::ERROR_LIMIT_RESET_HEADER).and_then(budget::parse_header_integer)
	}

	/// Scope requested by the first `Cache-Control` directive.
	pub fn cache_scope(&self) -> CacheScope {
		let directive = self
			.header("cache-control")
			.and_then(|value| value.split(',').next())
			.map(|directive| directive.trim().to_ascii_lowercase());

		match directive.as_deref() {
			Some("private") => CacheScope::Private,
			Some("public") => CacheScope::Public,
			_ => CacheScope::Uncacheable,
		}
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Body deserialized as JSON; errors carry the path of the offending field.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(cache_control: Option<&str>) -> ApiResponse {
		let mut headers = BTreeMap::from([
			("x-esi-error-limit-remain".to_owned(), vec!["97".to_owned()]),
			("x-esi-error-limit-reset".to_owned(), vec!["42".to_owned()]),
		]);

		if let Some(value) = cache_control {
			headers.insert("cache-control".into(), vec![value.to_owned()]);
		}

		ApiResponse {
			status: 200,
			reason: "OK".into(),
			headers,
			body: br#"{"players":31337,"server_version":"2841107"}"#.to_vec(),
			from_cache: false,
		}
	}

	#[test]
	fn headers_resolve_case_insensitively() {
		let response = response(Some("public"));

		assert_eq!(response.header("X-Esi-Error-Limit-Remain"), Some("97"));
		assert_eq!(response.error_limit_remain(), Some(97));
		assert_eq!(response.error_limit_reset(), Some(42));
		assert_eq!(response.header("Expires"), None);
		assert!(response.header_values("missing").is_empty());
	}

	#[test]
	fn cache_scope_reads_the_first_directive() {
		assert_eq!(response(Some("private")).cache_scope(), CacheScope::Private);
		assert_eq!(response(Some("Public, max-age=300")).cache_scope(), CacheScope::Public);
		assert_eq!(response(Some("max-age=300, public")).cache_scope(), CacheScope::Uncacheable);
		assert_eq!(response(Some("no-store")).cache_scope(), CacheScope::Uncacheable);
		assert_eq!(response(None).cache_scope(), CacheScope::Uncacheable);
	}

	#[test]
	fn json_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Status {
			players: u32,
		}
		#[derive(Debug, Deserialize)]
		struct Wrong {
			#[allow(dead_code)]
			server_version: u32,
		}

		let response = response(None);

		assert_eq!(response.json::<Status>().expect("Status body should decode.").players, 31337);

		let err = response.json::<Wrong>().expect_err("String version must not decode as u32.");

		assert_eq!(err.path().to_string(), "server_version");
		assert!(response.text().contains("31337"));
	}

	#[test]
	fn entries_round_trip_with_the_cache_flag() {
		let fresh = response(Some("private"));
		let replayed = ApiResponse::from_entry(fresh.to_entry());

		assert!(replayed.from_cache);
		assert_eq!(replayed.into_entry(), fresh.into_entry());
	}
}

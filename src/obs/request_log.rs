// self
use crate::{_prelude::*, esi::ApiMethod};

/// One completed transport call, handed to a [`RequestLogger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLogEntry<'a> {
	/// HTTP method of the call.
	pub method: ApiMethod,
	/// Fully constructed request URL, including the query string.
	pub url: &'a Url,
	/// Response status.
	pub status: u16,
	/// Remaining error budget reported by the response, if any.
	pub error_limit_remain: Option<i64>,
	/// `"OK"` for successful calls or the rendered error otherwise.
	pub message: &'a str,
}

/// Sink receiving one entry per ESI transport call. Cache hits and short-circuited requests are
/// not logged.
pub trait RequestLogger
where
	Self: Send + Sync,
{
	/// Records `entry`; failures to log must not affect the request.
	fn log(&self, entry: &RequestLogEntry<'_>);
}

/// Default logger that emits a `tracing` event per call (a no-op without the `tracing` feature).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingRequestLogger;
impl RequestLogger for TracingRequestLogger {
	fn log(&self, entry: &RequestLogEntry<'_>) {
		#[cfg(feature = "tracing")]
		{
			if entry.status >= 400 {
				tracing::warn!(
					method = entry.method.as_str(),
					url = %entry.url,
					status = entry.status,
					error_limit_remain = entry.error_limit_remain,
					"{}",
					entry.message
				);
			} else {
				tracing::info!(
					method = entry.method.as_str(),
					url = %entry.url,
					status = entry.status,
					error_limit_remain = entry.error_limit_remain,
					"{}",
					entry.message
				);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = entry;
		}
	}
}

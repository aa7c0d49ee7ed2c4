//! Observability hooks for SSO and ESI flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap each public operation in an `esi_broker.flow` span carrying the
//!   `flow` and `stage` fields, and to route [`TracingRequestLogger`] output through `tracing`.
//! - Enable `metrics` to increment `esi_broker_flow_total` (labeled by `flow` + `outcome`) and
//!   `esi_broker_cache_total` (labeled by `result`).

mod metrics;
mod request_log;
mod tracing;

pub use metrics::*;
pub use request_log::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by the clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange.
	AuthorizationCode,
	/// Refresh-token grant.
	Refresh,
	/// SSO token verification.
	Verify,
	/// ESI API request.
	Api,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::Verify => "verify",
			FlowKind::Api => "api",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Response-cache events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// A stored entry answered the request.
	Hit,
	/// No entry was found.
	Miss,
	/// A response was written.
	Store,
}
impl CacheEvent {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Miss => "miss",
			CacheEvent::Store => "store",
		}
	}
}

/// Records the outcome of `result` for `kind` and passes it through.
pub(crate) fn observe<T>(kind: FlowKind, result: Result<T>) -> Result<T> {
	record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);

	result
}

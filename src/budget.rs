//! Server-signaled error budget.
//!
//! ESI reports how many error responses a client may still produce in the current window
//! (`X-Esi-Error-Limit-Remain`) and when the window resets (`X-Esi-Error-Limit-Reset`). The
//! tracker stores the remaining count in the shared cache engine, expiring it with the window, so
//! every client sharing the engine stops issuing requests once the budget is spent.

// self
use crate::{
	_prelude::*,
	cache::{CacheEngine, CacheError},
	clock::Clock,
};

/// Cache key holding the remaining error count.
pub const ERROR_LIMIT_KEY: &str = "esi_error_limit_remain";
/// Response header carrying the remaining error count.
pub const ERROR_LIMIT_REMAIN_HEADER: &str = "x-esi-error-limit-remain";
/// Response header carrying the seconds until the error window resets.
pub const ERROR_LIMIT_RESET_HEADER: &str = "x-esi-error-limit-reset";

/// Tracks the remaining ESI error budget in a [`CacheEngine`].
#[derive(Clone)]
pub struct BudgetTracker {
	engine: Arc<dyn CacheEngine>,
	clock: Arc<dyn Clock>,
}
impl BudgetTracker {
	/// Creates a tracker over `engine`, computing window ends with `clock`.
	pub fn new(engine: Arc<dyn CacheEngine>, clock: Arc<dyn Clock>) -> Self {
		Self { engine, clock }
	}

	/// Returns `true` when a recorded budget exists and is below one.
	pub async fn is_exhausted(&self) -> Result<bool> {
		Ok(self.snapshot().await?.is_some_and(|remaining| remaining < 1))
	}

	/// Records `remaining` until `reset_after_secs` from now.
	///
	/// A reset too far away to be represented fails with [`CacheError::Serialization`] and leaves
	/// the previous record untouched.
	pub async fn record(&self, remaining: i64, reset_after_secs: i64) -> Result<()> {
		let reset_at =
			self.clock.now().checked_add(Duration::seconds(reset_after_secs)).ok_or_else(|| {
				CacheError::Serialization {
					message: format!("error budget reset of {reset_after_secs}s is out of range"),
				}
			})?;

		self.engine.set_until(ERROR_LIMIT_KEY, remaining.to_string(), reset_at).await?;

		Ok(())
	}

	/// Currently recorded budget; `None` when nothing is recorded or the record is unreadable.
	pub async fn snapshot(&self) -> Result<Option<i64>> {
		if !self.engine.exists(ERROR_LIMIT_KEY).await? {
			return Ok(None);
		}

		let Some(raw) = self.engine.get(ERROR_LIMIT_KEY).await? else {
			return Ok(None);
		};
		let remaining = parse_header_integer(&raw);

		#[cfg(feature = "tracing")]
		{
			if remaining.is_none() {
				tracing::warn!(value = %raw, "ignoring unreadable error budget record");
			}
		}

		Ok(remaining)
	}
}
impl Debug for BudgetTracker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("BudgetTracker(..)")
	}
}

/// Parses an integer header or stored value, tolerating surrounding whitespace.
pub fn parse_header_integer(raw: &str) -> Option<i64> {
	raw.trim().parse().ok()
}

//! Client-level error types shared across the SSO, cache, and ESI layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The first seven variants are the typed API outcomes; every one of them is terminal for the
/// current call and nothing in this crate retries them.
#[derive(Debug, ThisError)]
pub enum Error {
	/// ESI is in its daily maintenance window or answered 502/503.
	#[error("ESI is unavailable: {reason}.")]
	ServiceUnavailable {
		/// Why the service was considered unavailable.
		reason: String,
	},
	/// The error budget is spent, either locally recorded or signaled by a 420.
	#[error("ESI error limit reached.")]
	ErrorLimitReached,
	/// The endpoint requires a token and the client is anonymous.
	#[error("Endpoint requires an access token.")]
	TokenRequired,
	/// The token is valid but lacks the scope the endpoint requires.
	#[error("Token lacks the scopes required by the endpoint.")]
	InsufficientScopes,
	/// The token was rejected by ESI or by SSO verification.
	#[error("Token is invalid: {reason}.")]
	InvalidToken {
		/// ESI- or SSO-supplied reason string.
		reason: String,
	},
	/// The authorization-code exchange failed or granted too few scopes.
	#[error("Authorization failed: {reason}.")]
	AuthorizationFailure {
		/// SSO- or client-supplied reason string.
		reason: String,
	},
	/// The refresh-token grant failed.
	#[error("Token refresh failed: {reason}.")]
	RefreshFailure {
		/// SSO- or client-supplied reason string.
		reason: String,
	},

	/// Cache engine failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A request URL could not be assembled from the configured base.
	#[error("Request URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Client configuration failed validation.
	#[error(transparent)]
	Build(#[from] crate::config::ConfigBuildError),
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO). These are never reclassified into API errors.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Which remote the call was aimed at.
		target: &'static str,
		/// HTTP status captured before the failure, when one was received.
		status: Option<u16>,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Transport reported a failure without a structured error.
	#[error("HTTP client error occurred: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: &'static str,
		status: Option<u16>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target, status, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::cache::CacheError;

	#[test]
	fn cache_error_converts_into_client_error_with_source() {
		let cache_error = CacheError::Backend { message: "redis unreachable".into() };
		let error: Error = cache_error.clone().into();

		assert!(matches!(error, Error::Cache(_)));
		assert!(error.to_string().contains("redis unreachable"));

		let source = StdError::source(&error)
			.expect("Client error should expose the original cache error as its source.");

		assert_eq!(source.to_string(), cache_error.to_string());
	}

	#[test]
	fn typed_api_errors_render_reasons() {
		let error = Error::ServiceUnavailable { reason: "daily downtime".into() };

		assert_eq!(error.to_string(), "ESI is unavailable: daily downtime.");
		assert_eq!(Error::ErrorLimitReached.to_string(), "ESI error limit reached.");
	}
}

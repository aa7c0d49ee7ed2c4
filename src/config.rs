//! Client configuration built once at startup and passed into each component.
//!
//! [`SsoConfig`] carries the application credentials and the SSO endpoint set; [`EsiConfig`]
//! carries the API root, the data source appended to every request, and the user agent. Both
//! are assembled through builders that validate URLs and reject empty identifiers.

// self
use crate::_prelude::*;

/// Default EVE SSO root hosting `authorize`, `token`, and `verify`.
pub const DEFAULT_SSO_BASE_URL: &str = "https://login.eveonline.com/oauth/";
/// Default ESI root.
pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/";
/// Default ESI data source.
pub const DEFAULT_DATA_SOURCE: &str = "tranquility";

/// Errors raised while constructing or validating configuration.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigBuildError {
	/// The SSO client identifier is empty.
	#[error("SSO client id must not be empty.")]
	EmptyClientId,
	/// The SSO client secret is empty.
	#[error("SSO client secret must not be empty.")]
	EmptyClientSecret,
	/// The user agent is empty.
	#[error("User agent must not be empty.")]
	EmptyUserAgent,
	/// The data source is empty.
	#[error("Data source must not be empty.")]
	EmptyDataSource,
	/// A configured URL failed to parse.
	#[error("The {field} URL is invalid: {source}.")]
	InvalidUrl {
		/// Which setting failed validation.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Only HTTP(S) roots are supported.
	#[error("The {field} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which setting failed validation.
		field: &'static str,
		/// URL that failed validation.
		url: String,
	},
}

/// SSO endpoint set derived from the SSO root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoEndpoints {
	/// Browser redirect target for the authorization-code flow.
	pub authorize: Url,
	/// Token endpoint for code exchanges and refreshes.
	pub token: Url,
	/// Token introspection endpoint.
	pub verify: Url,
}
impl SsoEndpoints {
	/// Derives `authorize/`, `token/`, and `verify/` below `base`.
	pub fn from_base(base: &Url) -> Result<Self, ConfigBuildError> {
		Ok(Self {
			authorize: join_endpoint("sso", base, "authorize")?,
			token: join_endpoint("sso", base, "token")?,
			verify: join_endpoint("sso", base, "verify")?,
		})
	}
}

/// Application credentials and endpoints for EVE SSO.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoConfig {
	/// Application client identifier.
	pub client_id: String,
	/// Application client secret, sent via HTTP Basic.
	pub client_secret: String,
	/// Endpoint set.
	pub endpoints: SsoEndpoints,
}
impl SsoConfig {
	/// Creates a builder for the provided application credentials.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> SsoConfigBuilder {
		SsoConfigBuilder::new(client_id, client_secret)
	}
}
impl Debug for SsoConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SsoConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("endpoints", &self.endpoints)
			.finish()
	}
}

/// Builder for [`SsoConfig`].
#[derive(Debug)]
pub struct SsoConfigBuilder {
	client_id: String,
	client_secret: String,
	base_url: Option<String>,
}
impl SsoConfigBuilder {
	fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into(), base_url: None }
	}

	/// Overrides the SSO root (defaults to [`DEFAULT_SSO_BASE_URL`]).
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SsoConfig, ConfigBuildError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigBuildError::EmptyClientId);
		}
		if self.client_secret.is_empty() {
			return Err(ConfigBuildError::EmptyClientSecret);
		}

		let base = parse_root("sso", self.base_url.as_deref().unwrap_or(DEFAULT_SSO_BASE_URL))?;

		Ok(SsoConfig {
			client_id: self.client_id,
			client_secret: self.client_secret,
			endpoints: SsoEndpoints::from_base(&base)?,
		})
	}
}

/// ESI client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsiConfig {
	/// API root; requests go to `{base_url}/{version}/{endpoint}/`.
	pub base_url: Url,
	/// Value of the `datasource` query parameter appended to every request.
	pub data_source: String,
	/// `User-Agent` header sent with every request.
	pub user_agent: String,
	/// Short-circuits requests during the daily maintenance window.
	pub downtime_guard: bool,
}
impl EsiConfig {
	/// Creates a builder; ESI asks every application to identify itself, hence the required
	/// user agent.
	pub fn builder(user_agent: impl Into<String>) -> EsiConfigBuilder {
		EsiConfigBuilder::new(user_agent)
	}
}

/// Builder for [`EsiConfig`].
#[derive(Debug)]
pub struct EsiConfigBuilder {
	user_agent: String,
	base_url: Option<String>,
	data_source: Option<String>,
	downtime_guard: bool,
}
impl EsiConfigBuilder {
	fn new(user_agent: impl Into<String>) -> Self {
		Self {
			user_agent: user_agent.into(),
			base_url: None,
			data_source: None,
			downtime_guard: true,
		}
	}

	/// Overrides the API root (defaults to [`DEFAULT_ESI_BASE_URL`]).
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Overrides the data source (defaults to [`DEFAULT_DATA_SOURCE`]).
	pub fn data_source(mut self, data_source: impl Into<String>) -> Self {
		self.data_source = Some(data_source.into());

		self
	}

	/// Enables or disables the maintenance-window short-circuit (enabled by default).
	pub fn downtime_guard(mut self, enabled: bool) -> Self {
		self.downtime_guard = enabled;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<EsiConfig, ConfigBuildError> {
		if self.user_agent.trim().is_empty() {
			return Err(ConfigBuildError::EmptyUserAgent);
		}

		let data_source = self.data_source.unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_owned());

		if data_source.trim().is_empty() {
			return Err(ConfigBuildError::EmptyDataSource);
		}

		let base_url = parse_root("esi", self.base_url.as_deref().unwrap_or(DEFAULT_ESI_BASE_URL))?;

		Ok(EsiConfig {
			base_url,
			data_source,
			user_agent: self.user_agent,
			downtime_guard: self.downtime_guard,
		})
	}
}

fn parse_root(field: &'static str, raw: &str) -> Result<Url, ConfigBuildError> {
	let url = Url::parse(raw).map_err(|source| ConfigBuildError::InvalidUrl { field, source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigBuildError::UnsupportedScheme { field, url: url.to_string() }),
	}
}

fn join_endpoint(field: &'static str, base: &Url, endpoint: &str) -> Result<Url, ConfigBuildError> {
	let raw = format!("{}/{}/", base.as_str().trim_end_matches('/'), endpoint.trim_matches('/'));

	Url::parse(&raw).map_err(|source| ConfigBuildError::InvalidUrl { field, source })
}

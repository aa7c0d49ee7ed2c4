//! ESI request orchestrator.
//!
//! Every call runs the same pipeline: the downtime and error-budget prechecks, a cache lookup
//! (GET only), the transport call with a just-in-time bearer token, the budget update, status
//! classification, and finally the cache write (GET only). Nothing is retried.

mod options;
mod response;
mod signature;

pub use options::*;
pub use response::*;
pub use signature::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{CharacterId, CredentialHandle, TokenSecret},
	budget::BudgetTracker,
	cache::{CacheEngine, ResponseCache},
	clock::{Clock, SystemClock},
	config::EsiConfig,
	error::ConfigError,
	http::{HttpTransport, ResponseMetadataSlot},
	obs::{
		self, CacheEvent, FlowKind, FlowOutcome, FlowSpan, RequestLogEntry, RequestLogger,
		TracingRequestLogger,
	},
	sso::{SsoClient, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, sso::ReqwestTransportErrorMapper};

const DOWNTIME_HOUR: u8 = 11;
const DOWNTIME_MINUTES: u8 = 8;

/// ESI client specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestEsiClient = EsiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// HTTP methods supported by ESI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiMethod {
	/// `GET`; the only cacheable method.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `DELETE`.
	Delete,
}
impl ApiMethod {
	/// Upper-case method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ApiMethod::Get => "GET",
			ApiMethod::Post => "POST",
			ApiMethod::Put => "PUT",
			ApiMethod::Delete => "DELETE",
		}
	}

	fn http_method(self) -> Method {
		match self {
			ApiMethod::Get => Method::GET,
			ApiMethod::Post => Method::POST,
			ApiMethod::Put => Method::PUT,
			ApiMethod::Delete => Method::DELETE,
		}
	}
}
impl Display for ApiMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

struct Authentication<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	sso: Arc<SsoClient<C, M>>,
	credential: CredentialHandle,
}

/// Rate-aware, cache-backed ESI client.
///
/// One client acts for at most one credential. The cache engine is shared by the response cache
/// and the error-budget tracker.
pub struct EsiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: EsiConfig,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	engine: Arc<dyn CacheEngine>,
	clock: Arc<dyn Clock>,
	budget: BudgetTracker,
	cache: ResponseCache,
	logger: Arc<dyn RequestLogger>,
	auth: Option<Authentication<C, M>>,
}
impl<C, M> EsiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an anonymous client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: EsiConfig,
		engine: Arc<dyn CacheEngine>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);

		Self {
			config,
			http_client: http_client.into(),
			error_mapper: mapper.into(),
			budget: BudgetTracker::new(engine.clone(), clock.clone()),
			cache: ResponseCache::new(engine.clone(), clock.clone()),
			engine,
			clock,
			logger: Arc::new(TracingRequestLogger),
			auth: None,
		}
	}

	/// Replaces the time source used for the downtime window, cache expiry, and budget resets.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.budget = BudgetTracker::new(self.engine.clone(), clock.clone());
		self.cache = ResponseCache::new(self.engine.clone(), clock.clone());
		self.clock = clock;

		self
	}

	/// Replaces the request logger.
	pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
		self.logger = logger;

		self
	}

	/// Acts for `credential` from now on; `sso` refreshes and verifies it.
	pub fn authenticate(&mut self, sso: Arc<SsoClient<C, M>>, credential: CredentialHandle) {
		self.auth = Some(Authentication { sso, credential });
	}

	/// Credential the client acts for, if any.
	pub fn credential(&self) -> Option<&CredentialHandle> {
		self.auth.as_ref().map(|auth| &auth.credential)
	}

	/// Configuration the client was built from.
	pub fn config(&self) -> &EsiConfig {
		&self.config
	}

	/// Error-budget tracker shared with every client using the same engine.
	pub fn budget(&self) -> &BudgetTracker {
		&self.budget
	}

	/// Response cache.
	pub fn cache(&self) -> &ResponseCache {
		&self.cache
	}

	/// Issues a cacheable `GET`.
	pub async fn get(
		&self,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		self.execute(ApiMethod::Get, endpoint, version, options).await
	}

	/// Issues a `POST`.
	pub async fn post(
		&self,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		self.execute(ApiMethod::Post, endpoint, version, options).await
	}

	/// Issues a `PUT`.
	pub async fn put(
		&self,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		self.execute(ApiMethod::Put, endpoint, version, options).await
	}

	/// Issues a `DELETE`.
	pub async fn delete(
		&self,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		self.execute(ApiMethod::Delete, endpoint, version, options).await
	}

	/// Builds `{base}/{version}/{endpoint}/?{query}&datasource={data_source}`.
	pub fn request_url(
		&self,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<Url> {
		let raw = format!(
			"{}/{}/{}/",
			self.config.base_url.as_str().trim_end_matches('/'),
			version.trim_matches('/'),
			endpoint.trim_matches('/'),
		);
		let mut url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { source })?;
		let query = options.query.iter().filter(|(key, _)| key.as_str() != DATA_SOURCE_KEY);
		let mut pairs = url.query_pairs_mut();

		for (key, value) in query {
			pairs.append_pair(key, value);
		}

		pairs.append_pair(DATA_SOURCE_KEY, &self.config.data_source);

		drop(pairs);

		Ok(url)
	}

	async fn execute(
		&self,
		method: ApiMethod,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Api;

		let span = FlowSpan::new(KIND, method.as_str());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.pipeline(method, endpoint, version, options)).await;

		obs::observe(KIND, result)
	}

	async fn pipeline(
		&self,
		method: ApiMethod,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		self.precheck().await?;

		let cacheable = method == ApiMethod::Get;
		let principal = if cacheable { self.principal().await? } else { None };
		let signature = |principal| {
			RequestSignature::compute(
				method,
				endpoint,
				version,
				options,
				principal,
				&self.config.data_source,
			)
		};

		if cacheable && !options.no_cache {
			let shared = principal.map(|_| signature(None));

			if let Some(hit) = self.lookup(signature(principal), shared).await? {
				obs::record_cache_event(CacheEvent::Hit);

				return Ok(hit);
			}

			obs::record_cache_event(CacheEvent::Miss);
		}

		let url = self.request_url(endpoint, version, options)?;
		let token = self.token().await?;
		let response = self.send(method, &url, options, token.as_ref()).await?;

		if (400..600).contains(&response.status)
			&& let (Some(remaining), Some(reset)) =
				(response.error_limit_remain(), response.error_limit_reset())
		{
			self.budget.record(remaining, reset).await?;
		}

		let outcome = classify(response.status, self.auth.is_some());
		let message = outcome.as_ref().map_or_else(|| "OK".to_owned(), ToString::to_string);

		self.logger.log(&RequestLogEntry {
			method,
			url: &url,
			status: response.status,
			error_limit_remain: response.error_limit_remain(),
			message: &message,
		});

		if let Some(err) = outcome {
			return Err(err);
		}
		if cacheable {
			let target = match response.cache_scope() {
				CacheScope::Private => Some(signature(principal)),
				CacheScope::Public => Some(signature(None)),
				CacheScope::Uncacheable => None,
			};

			if let Some(target) = target
				&& self.cache.store(&response.to_entry(), &target, response.expires()).await?
			{
				obs::record_cache_event(CacheEvent::Store);
			}
		}

		Ok(response)
	}

	async fn precheck(&self) -> Result<()> {
		if self.config.downtime_guard && is_downtime(self.clock.now()) {
			return Err(Error::ServiceUnavailable { reason: "daily downtime window".into() });
		}
		if self.budget.is_exhausted().await? {
			return Err(Error::ErrorLimitReached);
		}

		Ok(())
	}

	async fn principal(&self) -> Result<Option<CharacterId>> {
		match &self.auth {
			Some(auth) => {
				let mut credential = auth.credential.lock().await;

				Ok(Some(credential.character_id(&auth.sso).await?))
			},
			None => Ok(None),
		}
	}

	async fn token(&self) -> Result<Option<TokenSecret>> {
		match &self.auth {
			Some(auth) => {
				let mut credential = auth.credential.lock().await;

				Ok(Some(credential.token(&auth.sso).await?))
			},
			None => Ok(None),
		}
	}

	/// Tries the caller's own signature first, then the shared one.
	///
	/// A scoped miss costs one more cache round trip for the shared signature. Entries an
	/// anonymous client stored as `private` live under the empty-principal signature, which is
	/// the shared one, so an authenticated caller can be served them.
	async fn lookup(
		&self,
		scoped: RequestSignature,
		shared: Option<RequestSignature>,
	) -> Result<Option<ApiResponse>> {
		for signature in std::iter::once(scoped).chain(shared) {
			if let Some(entry) = self.cache.lookup(&signature).await? {
				return Ok(Some(ApiResponse::from_entry(entry)));
			}
		}

		Ok(None)
	}

	async fn send(
		&self,
		method: ApiMethod,
		url: &Url,
		options: &RequestOptions,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let mut builder = Request::builder()
			.method(method.http_method())
			.uri(url.as_str())
			.header(USER_AGENT, self.config.user_agent.as_str())
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/json");

		if let Some(token) = token {
			builder = builder.header(AUTHORIZATION, token.bearer());
		}

		let body =
			options.body.as_ref().map(|body| body.to_string().into_bytes()).unwrap_or_default();
		let request = builder.body(body).map_err(ConfigError::from)?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = instrumented.call(request).await.map_err(|err| {
			self.error_mapper.map_transport_error(FlowKind::Api, meta.take().as_ref(), err)
		})?;

		Ok(api_response(response))
	}
}
#[cfg(feature = "reqwest")]
impl EsiClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an anonymous client backed by a default reqwest transport.
	pub fn new(config: EsiConfig, engine: Arc<dyn CacheEngine>) -> Self {
		Self::with_http_client(
			config,
			engine,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for EsiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EsiClient")
			.field("config", &self.config)
			.field("authenticated", &self.auth.is_some())
			.finish()
	}
}

/// Maps a response status to the typed error it signals, if any.
///
/// `authenticated` tells whether the request carried a bearer token.
pub fn classify(status: u16, authenticated: bool) -> Option<Error> {
	match status {
		401 if authenticated => Some(Error::InsufficientScopes),
		403 if authenticated =>
			Some(Error::InvalidToken { reason: "ESI rejected the access token".into() }),
		401 | 403 => Some(Error::TokenRequired),
		420 => Some(Error::ErrorLimitReached),
		502 | 503 => Some(Error::ServiceUnavailable { reason: format!("ESI answered {status}") }),
		_ => None,
	}
}

/// Returns `true` during the daily maintenance window (11:00 to 11:07 UTC inclusive).
pub fn is_downtime(now: OffsetDateTime) -> bool {
	let now = now.to_offset(time::UtcOffset::UTC);

	now.hour() == DOWNTIME_HOUR && now.minute() < DOWNTIME_MINUTES
}

fn api_response(response: HttpResponse) -> ApiResponse {
	let status = response.status();
	let mut headers = BTreeMap::<String, Vec<String>>::new();

	for (name, value) in response.headers() {
		headers
			.entry(name.as_str().to_owned())
			.or_default()
			.push(String::from_utf8_lossy(value.as_bytes()).into_owned());
	}

	ApiResponse {
		status: status.as_u16(),
		reason: status.canonical_reason().unwrap_or_default().to_owned(),
		headers,
		body: response.into_body(),
		from_cache: false,
	}
}

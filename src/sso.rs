//! EVE SSO authorization service.
//!
//! [`SsoClient`] builds authorization redirects, exchanges authorization codes for
//! [`TokenPair`]s, refreshes pairs in place, and verifies tokens. Every failure surfaces as the
//! typed error of the operation that raised it: [`Error::AuthorizationFailure`] for exchanges,
//! [`Error::RefreshFailure`] for refreshes, and [`Error::InvalidToken`] for verification.

mod authorize;
mod facade;
mod verify;

pub use authorize::*;
#[cfg(feature = "reqwest")] pub use facade::ReqwestTransportErrorMapper;
pub use facade::TransportErrorMapper;
pub use verify::*;

// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeSet, TokenPair, TokenSecret},
	clock::{Clock, SystemClock},
	config::SsoConfig,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use facade::BasicFacade;

/// SSO client specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestSsoClient = SsoClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Client for the EVE SSO `authorize`, `token`, and `verify` endpoints.
pub struct SsoClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: SsoConfig,
	facade: BasicFacade<C, M>,
	clock: Arc<dyn Clock>,
}
impl<C, M> SsoClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: SsoConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let facade = BasicFacade::from_config(&config, http_client.into(), mapper.into())?;

		Ok(Self { config, facade, clock: Arc::new(SystemClock) })
	}

	/// Replaces the time source used for token expiry.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Configuration the client was built from.
	pub fn config(&self) -> &SsoConfig {
		&self.config
	}

	/// Current instant according to the client's clock.
	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	/// Builds the browser redirect asking the user to grant `scopes`; SSO returns to `callback`.
	pub fn authorization_request(&self, scopes: &ScopeSet, callback: &Url) -> AuthorizationRequest {
		AuthorizationRequest::new(
			self.config.endpoints.authorize.clone(),
			self.config.client_id.clone(),
			scopes.clone(),
			callback.clone(),
		)
	}

	/// Exchanges an authorization code for a verified [`TokenPair`].
	///
	/// The issued token is verified immediately; the exchange fails unless every scope in
	/// `required_scopes` was granted, which guards against users trimming the scope list on the
	/// consent page.
	pub async fn exchange_code(&self, code: &str, required_scopes: &ScopeSet) -> Result<TokenPair> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let grant = self.facade.exchange_code(code).await?;
				let expiry = self.expiry_after(KIND, grant.expires_in)?;
				let refresh_token = grant.refresh_token.ok_or_else(|| {
					facade::flow_failure(KIND, "token response lacks a refresh_token")
				})?;
				let info = self.verify_token(&grant.access_token).await.map_err(|err| {
					facade::flow_failure(
						KIND,
						format!("verifying the issued token failed: {}", facade::describe(&err)),
					)
				})?;
				let missing = required_scopes.missing_from(&info.scopes);

				if !missing.is_empty() {
					return Err(facade::flow_failure(
						KIND,
						format!("required scopes were not granted: {}", missing.join(" ")),
					));
				}

				Ok(TokenPair {
					access_token: grant.access_token,
					access_token_expiry: expiry,
					refresh_token,
					character_id: Some(info.character_id),
					scopes: info.scopes,
				})
			})
			.await;

		obs::observe(KIND, result)
	}

	/// Mints a new access token for `pair` and updates it in place.
	///
	/// A refresh token rotated by SSO replaces the stored one.
	pub async fn refresh(&self, pair: &mut TokenPair) -> Result<()> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let grant = self.facade.refresh(&pair.refresh_token).await?;
				let expiry = self.expiry_after(KIND, grant.expires_in)?;

				pair.access_token = grant.access_token;
				pair.access_token_expiry = expiry;

				if let Some(rotated) = grant.refresh_token {
					pair.refresh_token = rotated;
				}

				Ok(())
			})
			.await;

		obs::observe(KIND, result)
	}

	/// Verifies the credential's current access token, refreshing a pair first when needed.
	pub async fn verify(&self, credential: &mut Credential) -> Result<TokenInfo> {
		let token = credential.token(self).await?;

		self.verify_token(&token).await
	}

	/// Verifies a raw access token.
	pub async fn verify_token(&self, token: &TokenSecret) -> Result<TokenInfo> {
		const KIND: FlowKind = FlowKind::Verify;

		let span = FlowSpan::new(KIND, "verify_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let body = self.facade.verify(token).await?;

				verify::parse_token_info(&body).map_err(|reason| facade::flow_failure(KIND, reason))
			})
			.await;

		obs::observe(KIND, result)
	}

	fn expiry_after(&self, flow: FlowKind, expires_in: Duration) -> Result<OffsetDateTime> {
		self.now().checked_add(expires_in).ok_or_else(|| {
			facade::flow_failure(
				flow,
				format!("token lifetime of {}s is out of range", expires_in.whole_seconds()),
			)
		})
	}
}
#[cfg(feature = "reqwest")]
impl SsoClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(config: SsoConfig) -> Result<Self> {
		Self::with_http_client(config, ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for SsoClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SsoClient").field("config", &self.config).finish()
	}
}

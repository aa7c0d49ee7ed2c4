//! Wire-level SSO calls: the two token-endpoint grants through `oauth2`, plus `verify`.

// crates.io
use oauth2::{
	AsyncHttpClient, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::SsoConfig,
	error::{ConfigError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	obs::FlowKind,
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport during `flow` into a client error.
	fn map_transport_error(
		&self,
		flow: FlowKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		flow: FlowKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => {
				let inner = *inner;

				if inner.is_builder() {
					return ConfigError::from(inner).into();
				}

				let status = meta_status(meta).or_else(|| inner.status().map(|code| code.as_u16()));

				TransportError::network(target(flow), status, inner).into()
			},
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other {
				message: format!("unrecognized transport failure while calling {}", target(flow)),
			}
			.into(),
		}
	}
}

/// Successful token-endpoint answer.
#[derive(Debug)]
pub(crate) struct TokenGrant {
	pub(crate) access_token: TokenSecret,
	pub(crate) expires_in: Duration,
	pub(crate) refresh_token: Option<TokenSecret>,
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	verify_url: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configures a client that authenticates with HTTP Basic against the token endpoint.
	pub(crate) fn from_config(
		config: &SsoConfig,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(config.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidUrl { source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_token_uri(token_url);

		Ok(Self {
			oauth_client,
			verify_url: config.endpoints.verify.clone(),
			http_client,
			error_mapper,
		})
	}

	pub(crate) async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
		const FLOW: FlowKind = FlowKind::AuthorizationCode;

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(FLOW, meta.take(), err, self.error_mapper.as_ref()))?;

		token_grant(FLOW, response)
	}

	pub(crate) async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenGrant> {
		const FLOW: FlowKind = FlowKind::Refresh;

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(FLOW, meta.take(), err, self.error_mapper.as_ref()))?;

		token_grant(FLOW, response)
	}

	/// Calls `verify` with `token` and returns the raw body of a successful answer.
	pub(crate) async fn verify(&self, token: &TokenSecret) -> Result<Vec<u8>> {
		const FLOW: FlowKind = FlowKind::Verify;

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let request = Request::builder()
			.method(Method::GET)
			.uri(self.verify_url.as_str())
			.header(AUTHORIZATION, token.bearer())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let response = instrumented.call(request).await.map_err(|err| {
			flow_failure_from(
				FLOW,
				self.error_mapper.map_transport_error(FLOW, meta.take().as_ref(), err),
			)
		})?;

		if !response.status().is_success() {
			return Err(flow_failure(
				FLOW,
				format!("SSO verify answered {}", response.status().as_u16()),
			));
		}

		Ok(response.into_body())
	}
}

/// Builds the typed failure SSO `flow` reports for `reason`.
pub(crate) fn flow_failure(flow: FlowKind, reason: impl Into<String>) -> Error {
	let reason = reason.into();

	match flow {
		FlowKind::AuthorizationCode => Error::AuthorizationFailure { reason },
		FlowKind::Refresh => Error::RefreshFailure { reason },
		FlowKind::Verify => Error::InvalidToken { reason },
		FlowKind::Api => TransportError::Other { message: reason }.into(),
	}
}

/// Folds an error raised inside an SSO flow into that flow's typed failure. Local configuration
/// errors pass through untouched.
pub(crate) fn flow_failure_from(flow: FlowKind, err: Error) -> Error {
	match err {
		Error::Config(_) => err,
		Error::AuthorizationFailure { .. } if flow == FlowKind::AuthorizationCode => err,
		Error::RefreshFailure { .. } if flow == FlowKind::Refresh => err,
		Error::InvalidToken { .. } if flow == FlowKind::Verify => err,
		other => flow_failure(flow, describe(&other)),
	}
}

/// Renders an error together with its source chain.
pub(crate) fn describe(err: &dyn StdError) -> String {
	let mut message = err.to_string().trim_end_matches('.').to_owned();
	let mut source = err.source();

	while let Some(inner) = source {
		message.push_str(": ");
		message.push_str(inner.to_string().trim_end_matches('.'));

		source = inner.source();
	}

	message
}

fn token_grant(flow: FlowKind, response: BasicTokenResponse) -> Result<TokenGrant> {
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(flow_failure(flow, "token response carries an empty access_token"));
	}

	let expires_in = response
		.expires_in()
		.and_then(|ttl| i64::try_from(ttl.as_secs()).ok())
		.filter(|secs| *secs > 0)
		.ok_or_else(|| flow_failure(flow, "token response lacks a positive expires_in"))?;

	Ok(TokenGrant {
		access_token: TokenSecret::new(access_token.clone()),
		expires_in: Duration::seconds(expires_in),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().clone())),
	})
}

fn map_request_error<E, M>(
	flow: FlowKind,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	match err {
		RequestTokenError::ServerResponse(response) =>
			flow_failure(flow, describe_server_error(&response, meta_status(meta.as_ref()))),
		RequestTokenError::Request(error) =>
			flow_failure_from(flow, mapper.map_transport_error(flow, meta.as_ref(), error)),
		RequestTokenError::Parse(error, _body) => flow_failure(
			flow,
			format!("token response is malformed at `{}`: {}", error.path(), error.inner()),
		),
		RequestTokenError::Other(message) =>
			flow_failure(flow, format!("token endpoint returned an unexpected response: {message}")),
	}
}

fn describe_server_error(response: &BasicErrorResponse, status: Option<u16>) -> String {
	let mut reason = format!("SSO rejected the grant with `{}`", response.error().as_ref());

	if let Some(description) = response.error_description() {
		reason.push_str(": ");
		reason.push_str(description);
	}
	if let Some(status) = status {
		reason.push_str(&format!(" (HTTP {status})"));
	}

	reason
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn target(flow: FlowKind) -> &'static str {
	match flow {
		FlowKind::Api => "ESI",
		_ => "SSO",
	}
}

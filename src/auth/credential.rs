//! Bearer credentials handed to the ESI client.
//!
//! A [`Credential`] is either a static access token or a refreshable [`TokenPair`]. Refreshes
//! mutate the pair in place through an exclusive borrow; callers share the credential with the
//! client through a [`CredentialHandle`] so a rotated access token is visible to every holder and
//! nobody keeps refreshing a stale copy.

// self
use crate::{
	_prelude::*,
	auth::{CharacterId, ScopeSet, TokenSecret},
	http::HttpTransport,
	sso::{SsoClient, TransportErrorMapper},
};

/// Minimum validity a handed-out access token must still have.
pub const REFRESH_MARGIN: Duration = Duration::seconds(30);

/// Plain access token without refresh capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToken {
	/// Access token secret.
	pub token: TokenSecret,
}
impl StaticToken {
	/// Wraps an access token string.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token) }
	}
}

/// Access/refresh token pair issued by the authorization-code grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Current access token.
	pub access_token: TokenSecret,
	/// Instant the access token stops being accepted.
	#[serde(with = "time::serde::timestamp")]
	pub access_token_expiry: OffsetDateTime,
	/// Refresh token used to mint new access tokens.
	pub refresh_token: TokenSecret,
	/// Character the tokens were issued for, once known.
	pub character_id: Option<CharacterId>,
	/// Scopes granted to the tokens.
	pub scopes: ScopeSet,
}
impl TokenPair {
	/// Creates a pair with no character or scope information yet.
	pub fn new(
		access_token: impl Into<String>,
		access_token_expiry: OffsetDateTime,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			access_token_expiry,
			refresh_token: TokenSecret::new(refresh_token),
			character_id: None,
			scopes: ScopeSet::default(),
		}
	}

	/// Attaches a known character identifier.
	pub fn with_character_id(mut self, character_id: CharacterId) -> Self {
		self.character_id = Some(character_id);

		self
	}

	/// Attaches the granted scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Returns `true` once the access token is within [`REFRESH_MARGIN`] of expiring at `now`.
	pub fn needs_refresh(&self, now: OffsetDateTime) -> bool {
		now + REFRESH_MARGIN >= self.access_token_expiry
	}
}

/// Capability that yields a bearer token and the principal it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
	/// Non-refreshable token; its character is only known through SSO verification.
	Static(StaticToken),
	/// Refreshable pair.
	Pair(TokenPair),
}
impl Credential {
	/// Returns an access token with at least [`REFRESH_MARGIN`] of validity left at issue time,
	/// refreshing a pair first when needed.
	///
	/// The margin is measured when the token is handed out, not when ESI receives it.
	pub async fn token<C, M>(&mut self, sso: &SsoClient<C, M>) -> Result<TokenSecret>
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		match self {
			Self::Static(token) => Ok(token.token.clone()),
			Self::Pair(pair) => {
				if pair.needs_refresh(sso.now()) {
					sso.refresh(pair).await?;
				}

				Ok(pair.access_token.clone())
			},
		}
	}

	/// Returns the character the credential acts for.
	///
	/// Pairs answer from their stored identifier and remember the result of a verification;
	/// static tokens verify on every call.
	pub async fn character_id<C, M>(&mut self, sso: &SsoClient<C, M>) -> Result<CharacterId>
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		if let Self::Pair(TokenPair { character_id: Some(id), .. }) = self {
			return Ok(*id);
		}

		let info = sso.verify(self).await?;

		if let Self::Pair(pair) = self {
			pair.character_id = Some(info.character_id);
		}

		Ok(info.character_id)
	}
}
impl From<StaticToken> for Credential {
	fn from(value: StaticToken) -> Self {
		Self::Static(value)
	}
}
impl From<TokenPair> for Credential {
	fn from(value: TokenPair) -> Self {
		Self::Pair(value)
	}
}

/// Shared ownership of one [`Credential`].
///
/// Clones point at the same credential, so a refresh performed by the ESI client is observed by
/// the caller that handed the credential over.
#[derive(Clone, Debug)]
pub struct CredentialHandle(Arc<AsyncMutex<Credential>>);
impl CredentialHandle {
	/// Wraps a credential for sharing.
	pub fn new(credential: impl Into<Credential>) -> Self {
		Self(Arc::new(AsyncMutex::new(credential.into())))
	}

	/// Locks the credential for exclusive use.
	pub async fn lock(&self) -> async_lock::MutexGuard<'_, Credential> {
		self.0.lock().await
	}

	/// Returns a copy of the current credential, e.g. for persisting a rotated pair.
	pub async fn snapshot(&self) -> Credential {
		self.0.lock().await.clone()
	}

	/// Returns `true` if both handles share the same credential.
	pub fn same_credential(&self, other: &CredentialHandle) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl From<Credential> for CredentialHandle {
	fn from(value: Credential) -> Self {
		Self::new(value)
	}
}

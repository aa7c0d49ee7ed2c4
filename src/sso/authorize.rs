// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, auth::ScopeSet};

const STATE_LEN: usize = 32;

/// Browser redirect for the authorization-code flow, returned by
/// [`SsoClient::authorization_request`](crate::sso::SsoClient::authorization_request).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	endpoint: Url,
	client_id: String,
	scopes: ScopeSet,
	callback: Url,
	state: String,
}
impl AuthorizationRequest {
	pub(crate) fn new(endpoint: Url, client_id: String, scopes: ScopeSet, callback: Url) -> Self {
		Self { endpoint, client_id, scopes, callback, state: random_state() }
	}

	/// Replaces the generated state, e.g. with a value tied to the caller's session.
	pub fn with_state(mut self, state: impl Into<String>) -> Self {
		self.state = state.into();

		self
	}

	/// Opaque state that must round-trip through the SSO redirect.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// Scopes the user is asked to grant.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// URL to send the user's browser to.
	pub fn url(&self) -> Url {
		let mut url = self.endpoint.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("redirect_uri", self.callback.as_str());
		pairs.append_pair("client_id", &self.client_id);
		pairs.append_pair("scope", &self.scopes.normalized());
		pairs.append_pair("state", &self.state);

		drop(pairs);

		url
	}

	/// Validates the `state` parameter SSO echoed back to the callback.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::AuthorizationFailure { reason: "authorization state mismatch".into() })
		}
	}
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

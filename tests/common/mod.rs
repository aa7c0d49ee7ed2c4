//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use parking_lot::Mutex;
use serde_json::{Value, json};
use time::{OffsetDateTime, macros};
// self
use esi_broker::{
	cache::{CacheEngine, MemoryCache},
	clock::{Clock, ManualClock},
	config::{EsiConfig, SsoConfig},
	esi::{ApiMethod, ReqwestEsiClient},
	obs::{RequestLogEntry, RequestLogger},
	sso::ReqwestSsoClient,
};

pub const USER_AGENT: &str = "esi-broker-tests/1.0 (ops@example.invalid)";
pub const CLIENT_ID: &str = "app-client";
pub const CLIENT_SECRET: &str = "app-secret";
pub const CHARACTER_ID: i64 = 90_000_001;
pub const OTHER_CHARACTER_ID: i64 = 90_000_002;
pub const TOKEN_PATH: &str = "/oauth/token/";
pub const VERIFY_PATH: &str = "/oauth/verify/";
/// `Expires` five minutes after [`start`].
pub const EXPIRES_SOON: &str = "Thu, 01 Jan 2026 00:05:00 GMT";

/// Instant every manual clock starts at; well clear of the daily downtime window.
pub fn start() -> OffsetDateTime {
	macros::datetime!(2026-01-01 00:00 UTC)
}

/// Clock, engine, and the shared handle both are driven by.
pub struct Harness {
	pub clock: ManualClock,
	pub engine: MemoryCache,
}
impl Harness {
	pub fn new() -> Self {
		let clock = ManualClock::new(start());
		let engine = MemoryCache::new().with_clock(Arc::new(clock.clone()));

		Self { clock, engine }
	}

	pub fn shared_clock(&self) -> Arc<dyn Clock> {
		Arc::new(self.clock.clone())
	}

	pub fn shared_engine(&self) -> Arc<dyn CacheEngine> {
		Arc::new(self.engine.clone())
	}

	pub fn sso(&self, server: &MockServer) -> Arc<ReqwestSsoClient> {
		let config = SsoConfig::builder(CLIENT_ID, CLIENT_SECRET)
			.base_url(server.url("/oauth/"))
			.build()
			.expect("SSO configuration fixture should build.");
		let client = ReqwestSsoClient::new(config).expect("SSO client fixture should build.");

		Arc::new(client.with_clock(self.shared_clock()))
	}

	pub fn esi(&self, server: &MockServer) -> ReqwestEsiClient {
		let config = EsiConfig::builder(USER_AGENT)
			.base_url(server.base_url())
			.build()
			.expect("ESI configuration fixture should build.");

		ReqwestEsiClient::new(config, self.shared_engine()).with_clock(self.shared_clock())
	}
}

/// Token endpoint answer; `refresh_token` is omitted when `None`.
pub fn token_body(access_token: &str, refresh_token: Option<&str>, expires_in: i64) -> Value {
	let mut body = json!({
		"access_token": access_token,
		"token_type": "bearer",
		"expires_in": expires_in,
	});

	if let Some(refresh_token) = refresh_token {
		body["refresh_token"] = json!(refresh_token);
	}

	body
}

/// Verify endpoint answer for `character_id` holding `scopes`.
pub fn verify_body(character_id: i64, scopes: &str) -> Value {
	json!({
		"CharacterID": character_id,
		"CharacterName": "Test Pilot",
		"ExpiresOn": "2026-01-01T00:20:00",
		"Scopes": scopes,
		"TokenType": "Character",
		"CharacterOwnerHash": "owner-hash",
		"IntellectualProperty": "EVE",
	})
}

/// Mocks `verify` for requests bearing `access_token`.
pub async fn mock_verify<'a>(
	server: &'a MockServer,
	access_token: &str,
	character_id: i64,
	scopes: &str,
) -> httpmock::Mock<'a> {
	let bearer = format!("Bearer {access_token}");
	let body = verify_body(character_id, scopes);

	server
		.mock_async(|when, then| {
			when.method(GET).path(VERIFY_PATH).header("authorization", bearer);
			then.status(200).header("content-type", "application/json").json_body(body);
		})
		.await
}

/// Owned copy of a [`RequestLogEntry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedRequest {
	pub method: ApiMethod,
	pub url: String,
	pub status: u16,
	pub error_limit_remain: Option<i64>,
	pub message: String,
}

/// Logger keeping every entry for later assertions.
#[derive(Clone, Default)]
pub struct RecordingLogger(Arc<Mutex<Vec<LoggedRequest>>>);
impl RecordingLogger {
	pub fn entries(&self) -> Vec<LoggedRequest> {
		self.0.lock().clone()
	}
}
impl RequestLogger for RecordingLogger {
	fn log(&self, entry: &RequestLogEntry<'_>) {
		self.0.lock().push(LoggedRequest {
			method: entry.method,
			url: entry.url.to_string(),
			status: entry.status,
			error_limit_remain: entry.error_limit_remain,
			message: entry.message.to_owned(),
		});
	}
}

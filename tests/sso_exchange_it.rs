#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::Duration;
// self
use common::*;
use esi_broker::{
	auth::{CharacterId, ScopeSet},
	error::Error,
	url::Url,
};

const SKILLS: &str = "esi-skills.read_skills.v1";
const WALLET: &str = "esi-wallet.read_character_wallet.v1";

#[tokio::test]
async fn exchange_returns_a_verified_pair() {
	let server = MockServer::start_async().await;
	let harness = Harness::new();
	let sso = harness.sso(&server);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header_exists("authorization")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=auth-code");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(token_body("access-1", Some("refresh-1"), 1199));
		})
		.await;
	let verify = mock_verify(&server, "access-1", CHARACTER_ID, &format!("{SKILLS} {WALLET}")).await;
	let required = ScopeSet::new([SKILLS]).expect("Scope fixture should be valid.");
	let pair = sso.exchange_code("auth-code", &required).await.expect("Exchange should succeed.");

	token.assert_calls_async(1).await;
	verify.assert_calls_async(1).await;

	assert_eq!(pair.access_token.expose(), "access-1");
	assert_eq!(pair.refresh_token.expose(), "refresh-1");
	assert_eq!(pair.access_token_expiry, start() + Duration::seconds(1199));
	assert_eq!(pair.character_id, Some(CharacterId::new(CHARACTER_ID)));
	assert!(pair.scopes.contains(SKILLS));
	assert!(pair.scopes.contains(WALLET));
}

#[tokio::test]
async fn exchange_fails_when_the_user_trimmed_scopes() {
	let server = MockServer::start_async().await;
	let harness = Harness::new();
	let sso = harness.sso(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.json_body(token_body("access-1", Some("refresh-1"), 1199));
		})
		.await;
	mock_verify(&server, "access-1", CHARACTER_ID, SKILLS).await;

	let required = ScopeSet::new([SKILLS, WALLET]).expect("Scope fixture should be valid.");
	let err = sso
		.exchange_code("auth-code", &required)
		.await
		.expect_err("A missing scope must fail the exchange.");

	match err {
		Error::AuthorizationFailure { reason } => assert!(reason.contains(WALLET), "{reason}"),
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn rejected_code_is_an_authorization_failure() {
	let server = MockServer::start_async().await;
	let harness = Harness::new();
	let sso = harness.sso(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400).header("content-type", "application/json").json_body(json!({
				"error": "invalid_grant",
				"error_description": "Authorization code is invalid."
			}));
		})
		.await;

	let verify = mock_verify(&server, "access-1", CHARACTER_ID, SKILLS).await;
	let err = sso
		.exchange_code("stale-code", &ScopeSet::default())
		.await
		.expect_err("A rejected code must fail the exchange.");

	assert!(matches!(err, Error::AuthorizationFailure { .. }), "{err:?}");

	verify.assert_calls_async(0).await;
}

#[tokio::test]
async fn exchange_requires_a_refresh_token() {
	let server = MockServer::start_async().await;
	let harness = Harness::new();
	let sso = harness.sso(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.json_body(token_body("access-1", None, 1199));
		})
		.await;

	let err = sso
		.exchange_code("auth-code", &ScopeSet::default())
		.await
		.expect_err("A grant without refresh token must fail the exchange.");

	assert!(matches!(err, Error::AuthorizationFailure { .. }), "{err:?}");
}

#[tokio::test]
async fn authorization_redirect_carries_scopes_and_state() {
	let server = MockServer::start_async().await;
	let harness = Harness::new();
	let sso = harness.sso(&server);
	let scopes = ScopeSet::new([WALLET, SKILLS]).expect("Scope fixture should be valid.");
	let callback =
		Url::parse("https://app.example/callback").expect("Callback fixture should parse.");
	let request = sso.authorization_request(&scopes, &callback).with_state("login");
	let url = request.url();
	let query = url.query_pairs().into_owned().collect::<Vec<_>>();

	assert_eq!(url.path(), "/oauth/authorize/");
	assert_eq!(
		query,
		vec![
			("response_type".to_owned(), "code".to_owned()),
			("redirect_uri".to_owned(), "https://app.example/callback".to_owned()),
			("client_id".to_owned(), CLIENT_ID.to_owned()),
			("scope".to_owned(), format!("{SKILLS} {WALLET}")),
			("state".to_owned(), "login".to_owned()),
		]
	);
	assert!(request.validate_state("login").is_ok());
	assert!(matches!(
		request.validate_state("forged"),
		Err(Error::AuthorizationFailure { .. })
	));

	let random = sso.authorization_request(&scopes, &callback);

	assert_eq!(random.state().len(), 32);
}

// crates.io
use httpmock::prelude::*;
// self
use volvo_connect::{
	_preludet::*,
	auth::ScopeSet,
	flows::{AuthState, PkceCodeChallengeMethod},
};

const TOKEN_PATH: &str = "/as/token.oauth2";
const BASIC_AUTH: &str = "Basic Y2xpZW50LWl0OnNlY3JldC1pdA==";

#[tokio::test]
async fn authorization_url_carries_pkce_parameters() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let scopes = ScopeSet::new(["openid", "conve:fuel_status"])
		.expect("Scope fixture should be valid for authorization URL test.");
	let redirect_uri = Url::parse("https://app.example.com/callback")
		.expect("Redirect URI should parse successfully.");
	let (url, challenge) = client
		.authorizer()
		.build_authorization_url(&scopes, &redirect_uri)
		.expect("Authorization URL should build.");
	let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

	assert_eq!(url.path(), "/as/authorization.oauth2");
	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("client_id"), Some(&TEST_CLIENT_ID.into()));
	assert_eq!(pairs.get("redirect_uri"), Some(&redirect_uri.as_str().into()));
	assert_eq!(pairs.get("scope"), Some(&"conve:fuel_status openid".into()));
	assert_eq!(pairs.get("state"), Some(&challenge.state));
	assert_eq!(pairs.get("code_challenge"), Some(&challenge.challenge));
	assert_eq!(pairs.get("code_challenge_method"), Some(&"S256".into()));
	assert_eq!(challenge.method, PkceCodeChallengeMethod::S256);
	assert_eq!(challenge.verifier().len(), 64);
	assert_eq!(challenge.state.len(), 32);
	assert!(store.snapshot().is_none(), "Building the URL must not touch the store.");
}

#[tokio::test]
async fn exchange_code_persists_margin_adjusted_tokens() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("authorization", BASIC_AUTH)
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "abc123")
				.form_urlencoded_tuple("code_verifier", "verifier-it")
				.form_urlencoded_tuple("redirect_uri", "https://app.example.com/callback");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"at-1\",\"refresh_token\":\"rt-1\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;

	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Unauthenticated
	);

	let before = OffsetDateTime::now_utc();
	let tokens = client
		.authorizer()
		.exchange_code_for_tokens("abc123", "verifier-it")
		.await
		.expect("Authorization code exchange should succeed.");
	let after = OffsetDateTime::now_utc();

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "at-1");
	assert_eq!(tokens.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-1"));
	assert!(tokens.expires_at >= before + Duration::seconds(3540));
	assert!(tokens.expires_at <= after + Duration::seconds(3540));

	let stored = store.snapshot().expect("Exchanged tokens should be persisted.");

	assert_eq!(stored.access_token.expose(), "at-1");
	assert_eq!(stored.expires_at, tokens.expires_at);
	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Authenticated
	);
}

#[tokio::test]
async fn missing_expires_in_defaults_to_one_hour() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_test_client(test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-default\"}");
		})
		.await;

	let tokens = client
		.authorizer()
		.exchange_code_for_tokens("abc123", "verifier-it")
		.await
		.expect("Exchange without expires_in should succeed.");
	let remaining = tokens.expires_at - OffsetDateTime::now_utc();

	assert!(remaining > Duration::seconds(3500) && remaining <= Duration::seconds(3540));
	assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
async fn complete_authorization_validates_state_before_exchanging() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-state\",\"expires_in\":600}");
		})
		.await;
	let (_, challenge) =
		client.authorizer().start_authorization().expect("Authorization should start.");
	let err = client
		.authorizer()
		.complete_authorization(&challenge, "https://app.example.com/callback?code=abc&state=forged")
		.await
		.expect_err("Mismatched state should be rejected.");

	assert!(err.is_authentication(), "Unexpected error: {err:?}.");
	assert_eq!(mock.calls_async().await, 0);

	let callback =
		format!("https://app.example.com/callback?code=abc&state={}", challenge.state);

	client
		.authorizer()
		.complete_authorization(&challenge, &callback)
		.await
		.expect("Matching state should complete the authorization.");

	assert_eq!(mock.calls_async().await, 1);
	assert!(store.snapshot().is_some());
}

#[tokio::test]
async fn rejected_code_is_an_authentication_error() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code expired\"}");
		})
		.await;
	let err = client
		.authorizer()
		.exchange_code_for_tokens("stale", "verifier-it")
		.await
		.expect_err("Rejected code should fail.");

	mock.assert_async().await;

	assert!(matches!(
		&err,
		Error::Authentication { reason } if reason.contains("invalid_grant")
	));
	assert!(store.snapshot().is_none());
}

#[tokio::test]
async fn server_failures_during_exchange_are_authentication_errors() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(503).body("maintenance");
		})
		.await;

	let err = client
		.authorizer()
		.exchange_code_for_tokens("abc123", "verifier-it")
		.await
		.expect_err("Server failure should surface.");

	assert!(err.is_authentication(), "Unexpected error: {err:?}.");
	assert!(store.snapshot().is_none());
}

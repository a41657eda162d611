// crates.io
use httpmock::prelude::*;
// self
use volvo_connect::{
	_preludet::*,
	auth::TokenSet,
	flows::AuthState,
	store::{MemoryStore, TokenStore},
};

const TOKEN_PATH: &str = "/as/token.oauth2";

async fn seed_tokens(store: &MemoryStore, access: &str, refresh: Option<&str>, ttl: Duration) {
	let issued = OffsetDateTime::now_utc() - Duration::minutes(5);
	let mut builder = TokenSet::builder()
		.access_token(access)
		.issued_at(issued)
		.expires_at(OffsetDateTime::now_utc() + ttl);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	store
		.save(builder.build().expect("Token set fixture should build successfully."))
		.await
		.expect("Seeding the memory store should succeed.");
}

#[tokio::test]
async fn active_token_is_returned_without_refreshing() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(500);
		})
		.await;

	seed_tokens(&store, "at-live", Some("rt-live"), Duration::minutes(10)).await;

	let token = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect("Active token should be returned.");

	assert_eq!(token, "at-live");
	assert_eq!(mock.calls_async().await, 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_keeps_refresh_token() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "rt-old");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-new\",\"expires_in\":1800}");
		})
		.await;

	seed_tokens(&store, "at-old", Some("rt-old"), -Duration::seconds(1)).await;

	let token = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect("Expired token should be refreshed.");

	mock.assert_async().await;

	assert_eq!(token, "at-new");

	let stored = store.snapshot().expect("Refreshed tokens should be persisted.");

	assert_eq!(stored.access_token.expose(), "at-new");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-old"));
	assert!(stored.is_active_at(OffsetDateTime::now_utc()));

	let again = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect("Fresh token should be reused.");

	assert_eq!(again, "at-new");
	assert_eq!(mock.calls_async().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_a_single_refresh() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(200))
				.body("{\"access_token\":\"at-shared\",\"refresh_token\":\"rt-2\",\"expires_in\":3600}");
		})
		.await;

	seed_tokens(&store, "at-old", Some("rt-1"), -Duration::seconds(1)).await;

	let handles = (0..8)
		.map(|_| {
			let authorizer = client.authorizer().clone();

			tokio::spawn(async move { authorizer.get_valid_access_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Refresh task should not panic.")
			.expect("Every caller should receive a token.");

		assert_eq!(token, "at-shared");
	}

	assert_eq!(mock.calls_async().await, 1);

	let metrics = client.authorizer().refresh_metrics();

	assert_eq!(metrics.attempts(), 1);
	assert_eq!(metrics.successes(), 1);
	assert_eq!(metrics.failures(), 0);
}

#[tokio::test]
async fn rejected_refresh_token_revokes_credentials() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;

	seed_tokens(&store, "at-old", Some("rt-revoked"), -Duration::seconds(1)).await;

	let err = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect_err("Rejected refresh should fail.");

	assert!(err.is_authentication(), "Unexpected error: {err:?}.");
	assert!(store.snapshot().expect("Revoked tokens stay on record.").is_revoked());
	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Unauthenticated
	);

	let err = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect_err("Revoked credentials should fail fast.");

	assert!(err.is_authentication());
	assert_eq!(mock.calls_async().await, 1);
	assert_eq!(client.authorizer().refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn server_failure_during_refresh_keeps_credentials() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(502).body("bad gateway");
		})
		.await;
	seed_tokens(&store, "at-old", Some("rt-keep"), -Duration::seconds(1)).await;

	let err = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect_err("Server failure should surface.");

	assert!(matches!(err, Error::Transient(_)), "Unexpected error: {err:?}.");

	let stored = store.snapshot().expect("Tokens should remain stored.");

	assert!(!stored.is_revoked());
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-keep"));
}

#[tokio::test]
async fn missing_credentials_require_authorization() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let err = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect_err("Empty store should fail.");

	assert!(err.is_authentication());

	seed_tokens(&store, "at-old", None, -Duration::seconds(1)).await;

	let err = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect_err("Expired token without refresh token should fail.");

	assert!(err.is_authentication());
	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Unauthenticated
	);
}

#[tokio::test]
async fn explicit_refresh_and_logout() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("refresh_token", "rt-manual");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-manual\",\"refresh_token\":\"rt-rotated\",\"expires_in\":900}");
		})
		.await;

	seed_tokens(&store, "at-old", Some("rt-manual"), Duration::minutes(30)).await;

	let tokens = client
		.authorizer()
		.refresh_access_token("rt-manual")
		.await
		.expect("Explicit refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "at-manual");
	assert_eq!(tokens.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-rotated"));
	assert!(client.authorizer().is_authenticated().await);

	client.logout().await.expect("Logout should succeed.");

	assert!(store.snapshot().is_none());
	assert!(!client.authorizer().is_authenticated().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_refresh_is_shared_with_concurrent_callers() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("refresh_token", "rt-old");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(300))
				.body("{\"access_token\":\"at-new\",\"expires_in\":1800}");
		})
		.await;

	seed_tokens(&store, "at-old", Some("rt-old"), -Duration::seconds(1)).await;

	let authorizer = client.authorizer().clone();
	let explicit = tokio::spawn(async move { authorizer.refresh_access_token("rt-old").await });

	tokio::time::sleep(StdDuration::from_millis(50)).await;

	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Refreshing
	);

	let token = client
		.authorizer()
		.get_valid_access_token()
		.await
		.expect("Waiting caller should reuse the explicit refresh.");
	let tokens = explicit
		.await
		.expect("Explicit refresh task should not panic.")
		.expect("Explicit refresh should succeed.");

	assert_eq!(token, "at-new");
	assert_eq!(tokens.access_token.expose(), "at-new");
	assert_eq!(mock.calls_async().await, 1);
	assert_eq!(client.authorizer().refresh_metrics().attempts(), 1);
	assert_eq!(
		client.authorizer().state().await.expect("State should load."),
		AuthState::Authenticated
	);
}

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use volvo_connect::{
	_preludet::*,
	auth::{TokenSet, Vin},
	request::{Command, Endpoint, EndpointDescriptor},
	store::{MemoryStore, TokenStore},
};

const TOKEN_PATH: &str = "/as/token.oauth2";
const FUEL_PATH: &str = "/connected-vehicle/v2/vehicles/YV1AB12C3D4567890/fuel";

fn vin() -> Vin {
	Vin::new("YV1AB12C3D4567890").expect("VIN fixture should be valid.")
}

async fn seed_tokens(store: &MemoryStore, access: &str) {
	let tokens = TokenSet::builder()
		.access_token(access)
		.refresh_token("rt-it")
		.issued_at(OffsetDateTime::now_utc())
		.expires_at(OffsetDateTime::now_utc() + Duration::minutes(30))
		.build()
		.expect("Token set fixture should build successfully.");

	store.save(tokens).await.expect("Seeding the memory store should succeed.");
}

#[tokio::test]
async fn successful_reads_send_credentials_and_are_cached() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(FUEL_PATH)
				.header("authorization", "Bearer at-live")
				.header("vcc-api-key", TEST_API_KEY)
				.header("accept", "application/json");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"data\":{\"fuelAmount\":{\"value\":\"42\",\"unit\":\"l\"}}}");
		})
		.await;

	seed_tokens(&store, "at-live").await;

	let first = client.get(&vin(), Endpoint::Fuel).await.expect("Fuel read should succeed.");
	let second = client.data(&vin(), Endpoint::Fuel).await.expect("Cached read should succeed.");

	assert_eq!(first, json!({ "data": { "fuelAmount": { "value": "42", "unit": "l" } } }));
	assert_eq!(second, json!({ "fuelAmount": { "value": "42", "unit": "l" } }));
	assert_eq!(mock.calls_async().await, 1);
	assert_eq!(client.executor().cache().len(), 1);
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path(FUEL_PATH).header("authorization", "Bearer at-stale");
			then.status(401);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path(FUEL_PATH).header("authorization", "Bearer at-fresh");
			then.status(200).header("content-type", "application/json").body("{\"data\":{}}");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-fresh\",\"expires_in\":3600}");
		})
		.await;

	seed_tokens(&store, "at-stale").await;

	let body = client.get(&vin(), Endpoint::Fuel).await.expect("Retry should succeed.");

	assert_eq!(body, json!({ "data": {} }));
	assert_eq!(stale.calls_async().await, 1);
	assert_eq!(fresh.calls_async().await, 1);
	assert_eq!(token.calls_async().await, 1);
	assert_eq!(
		store.snapshot().expect("Refreshed tokens should be stored.").access_token.expose(),
		"at-fresh"
	);
}

#[tokio::test]
async fn second_unauthorized_response_is_an_authentication_error() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path(FUEL_PATH);
			then.status(401);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-fresh\",\"expires_in\":3600}");
		})
		.await;

	seed_tokens(&store, "at-stale").await;

	let err = client.get(&vin(), Endpoint::Fuel).await.expect_err("Second 401 should fail.");

	assert!(err.is_authentication(), "Unexpected error: {err:?}.");
	assert_eq!(api.calls_async().await, 2);
	assert_eq!(token.calls_async().await, 1);
}

#[tokio::test]
async fn error_statuses_map_to_precise_errors_without_retrying() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let throttled = server
		.mock_async(|when, then| {
			when.method(GET).path(FUEL_PATH);
			then.status(429).header("retry-after", "30");
		})
		.await;
	let missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/connected-vehicle/v2/vehicles/YV1AB12C3D4567890/doors");
			then.status(404);
		})
		.await;
	let broken = server
		.mock_async(|when, then| {
			when.method(GET).path("/connected-vehicle/v2/vehicles/YV1AB12C3D4567890/tyres");
			then.status(500).body("upstream exploded");
		})
		.await;

	seed_tokens(&store, "at-live").await;

	let err = client.get(&vin(), Endpoint::Fuel).await.expect_err("429 should fail.");

	assert!(matches!(
		err,
		Error::RateLimit { retry_after: Some(wait) } if wait == Duration::seconds(30)
	));

	let err = client.get(&vin(), Endpoint::Doors).await.expect_err("404 should fail.");

	assert!(matches!(err, Error::VehicleNotFound { ref path } if path.ends_with("/doors")));

	let err = client.get(&vin(), Endpoint::Tyres).await.expect_err("500 should fail.");

	assert!(matches!(
		err,
		Error::VolvoApi { status: 500, ref body } if body == "upstream exploded"
	));
	assert_eq!(throttled.calls_async().await, 1);
	assert_eq!(missing.calls_async().await, 1);
	assert_eq!(broken.calls_async().await, 1);
	assert!(client.executor().cache().is_empty());
}

#[tokio::test]
async fn commands_post_bodies_and_are_never_cached() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));
	let command = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/connected-vehicle/v2/vehicles/YV1AB12C3D4567890/commands/engine-start")
				.header("content-type", "application/json")
				.json_body(json!({ "runtime": 10 }));
			then.status(200).body("");
		})
		.await;

	seed_tokens(&store, "at-live").await;

	for _ in 0..2 {
		let body = client
			.send_command(&vin(), Command::EngineStart { runtime_minutes: 10 })
			.await
			.expect("Command should succeed.");

		assert_eq!(body, json!({ "status": "success" }));
	}

	assert_eq!(command.calls_async().await, 2);
	assert!(client.executor().cache().is_empty());
}

#[tokio::test]
async fn vehicle_list_is_parsed_into_vins() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/connected-vehicle/v2/vehicles");
			then.status(200).header("content-type", "application/json").body(
				"{\"data\":[{\"vin\":\"YV1AB12C3D4567890\"},{\"vin\":\"bogus\"},{\"vin\":\"YV1AB12C3D4567891\"}]}",
			);
		})
		.await;
	seed_tokens(&store, "at-live").await;

	let vins = client.list_vehicles().await.expect("Vehicle list should load.");

	assert_eq!(vins.iter().map(Vin::as_str).collect::<Vec<_>>(), [
		"YV1AB12C3D4567890",
		"YV1AB12C3D4567891"
	]);
}

#[tokio::test]
async fn requests_are_spaced_by_the_minimum_interval() {
	let server = MockServer::start_async().await;
	let config = test_config(&server.base_url()).with_min_request_interval(StdDuration::from_millis(100));
	let (client, store) = build_test_client(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(FUEL_PATH);
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;

	seed_tokens(&store, "at-live").await;

	let descriptor = EndpointDescriptor::get("fuel", FUEL_PATH);
	let started = Instant::now();

	for _ in 0..3 {
		client.executor().execute(&descriptor).await.expect("Uncached read should succeed.");
	}

	assert!(started.elapsed() >= StdDuration::from_millis(200));
	assert_eq!(mock.calls_async().await, 3);
}

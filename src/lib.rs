//! Volvo Cars connected-vehicle client: authorization-code + PKCE onboarding, single-flight
//! token refresh, rate-limited and cached API requests, and scheduled background collection with
//! isolated callbacks.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod request;
pub mod scheduler;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::VolvoClient,
		config::VolvoConfig,
		http::ReqwestHttpClient,
		store::{MemoryStore, TokenStore},
	};

	/// Client ID used by the integration-test fixtures.
	pub const TEST_CLIENT_ID: &str = "client-it";
	/// Client secret used by the integration-test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "secret-it";
	/// API key used by the integration-test fixtures.
	pub const TEST_API_KEY: &str = "vcc-key-it";

	/// Builds a configuration whose API and auth endpoints both point at `base_url` (usually an
	/// `httpmock` server).
	pub fn test_config(base_url: &str) -> VolvoConfig {
		let base = Url::parse(base_url).expect("Mock server base URL should parse.");

		VolvoConfig::new(
			TEST_CLIENT_ID,
			TEST_CLIENT_SECRET,
			Url::parse("https://app.example.com/callback").expect("Redirect URI should parse."),
			TEST_API_KEY,
		)
		.with_api_base_url(base.clone())
		.with_auth_base_url(base)
		.with_min_request_interval(StdDuration::ZERO)
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client(timeout: StdDuration) -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`VolvoClient`] backed by an in-memory store and the test transport so tests
	/// never touch disk.
	pub fn build_test_client(config: VolvoConfig) -> (VolvoClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let http_client = test_reqwest_http_client(config.request_timeout);
		let client = VolvoClient::with_http_client(config, store, http_client);

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::{Duration as StdDuration, Instant},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};

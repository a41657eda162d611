//! Authenticated, rate-limited, cached access to the connected-vehicle API.
//!
//! [`RequestExecutor::execute`] composes the pieces in a fixed order: cache lookup, rate-limit
//! gate, token acquisition, HTTP call. A 401 forces one refresh and one retry; every other
//! failure surfaces as its precise [`Error`] variant without retrying.

pub mod cache;
pub mod endpoint;
pub mod rate_limit;

pub use cache::*;
pub use endpoint::*;
pub use rate_limit::*;

// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::json;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
	flows::Authorizer,
	http::{HttpResponse, ReqwestHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const API_KEY_HEADER: &str = "vcc-api-key";

/// Shared executor for foreground calls and scheduler runs.
#[derive(Debug)]
pub struct RequestExecutor {
	authorizer: Arc<Authorizer>,
	http_client: ReqwestHttpClient,
	rate_limiter: Arc<RateLimiter>,
	cache: Arc<ResponseCache>,
}
impl RequestExecutor {
	/// Creates an executor over shared collaborators.
	pub fn new(
		authorizer: Arc<Authorizer>,
		http_client: ReqwestHttpClient,
		rate_limiter: Arc<RateLimiter>,
		cache: Arc<ResponseCache>,
	) -> Self {
		Self { authorizer, http_client, rate_limiter, cache }
	}

	/// Token lifecycle owner.
	pub fn authorizer(&self) -> &Arc<Authorizer> {
		&self.authorizer
	}

	/// Shared rate limiter.
	pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
		&self.rate_limiter
	}

	/// Shared response cache.
	pub fn cache(&self) -> &Arc<ResponseCache> {
		&self.cache
	}

	/// Executes the described request and returns the parsed JSON body.
	pub async fn execute(&self, descriptor: &EndpointDescriptor) -> Result<Value> {
		let cache_key = descriptor.cache_key();

		if let Some(hit) = cache_key.as_deref().and_then(|key| self.cache.get(key)) {
			tracing::debug!(endpoint = %descriptor.name, "Serving response from cache.");

			return Ok(hit);
		}

		const KIND: FlowKind = FlowKind::ApiRequest;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let (mut response, token) = self.send_authorized(descriptor, None).await?;

				if response.status == StatusCode::UNAUTHORIZED {
					tracing::info!(endpoint = %descriptor.name, "API rejected the access token; refreshing once.");

					(response, _) = self.send_authorized(descriptor, Some(&token)).await?;

					if response.status == StatusCode::UNAUTHORIZED {
						return Err(Error::authentication(
							"API rejected the access token after a refresh",
						));
					}
				}

				let value = into_json(descriptor, response)?;

				if let (Some(key), Some(ttl)) = (cache_key, descriptor.ttl) {
					self.cache.put(key, value.clone(), ttl);
				}

				Ok(value)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Drops every cached response.
	pub fn clear_cache(&self) {
		self.cache.clear();
	}

	/// Acquires a rate-limit slot and a token, then sends the request.
	///
	/// With `rejected_token` set, that token is replaced through a forced refresh first. Returns
	/// the response together with the token that was sent.
	async fn send_authorized(
		&self,
		descriptor: &EndpointDescriptor,
		rejected_token: Option<&str>,
	) -> Result<(HttpResponse, String)> {
		self.rate_limiter.acquire().await;

		let token = match rejected_token {
			None => self.authorizer.get_valid_access_token().await?,
			Some(stale) => self.authorizer.force_refresh(stale).await?,
		};
		let config = self.authorizer.config();
		let url = config.api_url(&descriptor.path)?;
		let mut request = self
			.http_client
			.request(descriptor.method.clone(), url)
			.bearer_auth(&token)
			.header(API_KEY_HEADER, &config.vcc_api_key)
			.header(ACCEPT, "application/json");

		if let Some(body) = &descriptor.body {
			let bytes = serde_json::to_vec(body).map_err(ConfigError::RequestBody)?;

			request = request.header(CONTENT_TYPE, "application/json").body(bytes);
		}

		let response = self.http_client.send(request, "api").await?;

		Ok((response, token))
	}
}

/// Maps a final (post-retry) response onto the JSON body or the precise error variant.
fn into_json(descriptor: &EndpointDescriptor, response: HttpResponse) -> Result<Value> {
	let status = response.status;

	match status {
		StatusCode::TOO_MANY_REQUESTS =>
			return Err(Error::RateLimit { retry_after: response.retry_after }),
		StatusCode::NOT_FOUND =>
			return Err(Error::VehicleNotFound { path: descriptor.path.clone() }),
		_ if !status.is_success() =>
			return Err(Error::VolvoApi { status: status.as_u16(), body: response.body_text() }),
		_ => {},
	}

	if response.is_body_blank() {
		return Ok(json!({ "status": "success" }));
	}

	serde_json::from_slice(&response.body).map_err(|source| {
		Error::from(TransientError::ApiResponseParse { path: descriptor.path.clone(), source })
	})
}

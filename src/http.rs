//! Transport primitives shared by the token endpoint and the connected-vehicle API.
//!
//! [`ReqwestHttpClient`] sends a prepared [`reqwest::RequestBuilder`] and buffers it into an
//! [`HttpResponse`] carrying the status, the parsed Retry-After hint, and the body. Redirects are
//! never followed: both the token endpoint and the API answer directly.

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	RequestBuilder, StatusCode,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Response status.
	pub status: StatusCode,
	/// Retry-After hint parsed from the response headers.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` when the body is empty or whitespace only.
	pub fn is_body_blank(&self) -> bool {
		self.body.iter().all(u8::is_ascii_whitespace)
	}

	/// Lossy UTF-8 view of the body for error reporting.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// Configure any custom client to disable redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the provided per-request timeout and redirects disabled.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Sends the prepared request and buffers the response.
	///
	/// `target` names the upstream ("token endpoint", "api") in transport errors.
	pub async fn send(
		&self,
		request: RequestBuilder,
		target: &'static str,
	) -> Result<HttpResponse, TransportError> {
		let response =
			request.send().await.map_err(|e| TransportError::network(target, e))?;
		let status = response.status();
		let retry_after = parse_retry_after(response.headers());
		let body = response.bytes().await.map_err(|e| TransportError::network(target, e))?;

		tracing::debug!(target_name = target, status = status.as_u16(), "HTTP response received.");

		Ok(HttpResponse { status, retry_after, body: body.to_vec() })
	}
}
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self(ReqwestClient::builder().redirect(Policy::none()).build().unwrap_or_default())
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Parses a `Retry-After` header given as delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	parse_retry_after_value(raw, OffsetDateTime::now_utc())
}

fn parse_retry_after_value(raw: &str, now: OffsetDateTime) -> Option<Duration> {
	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}

		return Some(Duration::ZERO);
	}

	None
}

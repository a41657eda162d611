//! Crate-level error types shared by the authorization flow, executor, stores, and scheduler.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The first five variants are the request-facing taxonomy; the remaining ones carry local
/// configuration, storage, and transport failures.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token invalid, expired, or revoked; authorization denied or rejected.
	#[error("Authentication failed: {reason}.")]
	Authentication {
		/// Provider- or client-supplied reason string.
		reason: String,
	},
	/// The API answered with HTTP 429.
	#[error("Rate limit exceeded.")]
	RateLimit {
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The API answered with HTTP 404 (unknown or inaccessible VIN).
	#[error("Vehicle not found or not accessible: {path}.")]
	VehicleNotFound {
		/// Request path that produced the 404.
		path: String,
	},
	/// Any other non-2xx API response.
	#[error("API request failed with status {status}.")]
	VolvoApi {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The OAuth redirect could not be parsed.
	#[error("Authorization callback is malformed: {reason}.")]
	CallbackParse {
		/// What was missing or malformed.
		reason: String,
	},

	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns `true` for authentication failures that require a new authorization.
	pub fn is_authentication(&self) -> bool {
		matches!(self, Self::Authentication { .. })
	}

	pub(crate) fn authentication(reason: impl Into<String>) -> Self {
		Self::Authentication { reason: reason.into() }
	}

	pub(crate) fn callback_parse(reason: impl Into<String>) -> Self {
		Self::CallbackParse { reason: reason.into() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required environment variable is absent or empty.
	#[error("Required configuration variable `{name}` is not set.")]
	MissingVariable {
		/// Variable name without prefix.
		name: &'static str,
	},
	/// A configuration value could not be parsed.
	#[error("Configuration variable `{name}` is invalid: {reason}.")]
	InvalidVariable {
		/// Variable name without prefix.
		name: &'static str,
		/// Parse failure description.
		reason: String,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// A VIN failed validation.
	#[error(transparent)]
	InvalidVin(#[from] crate::auth::IdentifierError),
	/// The scheduler was started with a zero interval.
	#[error("Collection interval must be greater than zero.")]
	ZeroInterval,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_url(value: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned a server-side failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The API returned a 2xx body that is not JSON.
	#[error("API response body from {path} is not valid JSON.")]
	ApiResponseParse {
		/// Request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Which upstream was being called.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target, source: Box::new(src) }
	}
}

//! Client configuration and environment loading.
//!
//! Every variable can be supplied either unprefixed (`CLIENT_ID`) or with the `VOLVO_` prefix
//! (`VOLVO_CLIENT_ID`); the unprefixed name wins when both are set.

// std
use std::{env, path::PathBuf};
// self
use crate::{
	_prelude::*,
	auth::{ScopeCategory, ScopeSet, Vin},
	error::ConfigError,
};

/// Default Volvo ID authority.
pub const DEFAULT_AUTH_BASE_URL: &str = "https://volvoid.eu.volvocars.com";
/// Default connected-vehicle API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.volvocars.com";
/// Default token file location.
pub const DEFAULT_TOKEN_STORAGE_PATH: &str = "tokens.json";
/// Default minimum spacing between outbound API requests.
pub const DEFAULT_MIN_REQUEST_INTERVAL: StdDuration = StdDuration::from_millis(1_000);
/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

const ENV_PREFIX: &str = "VOLVO_";
const AUTHORIZATION_PATH: &str = "/as/authorization.oauth2";
const TOKEN_PATH: &str = "/as/token.oauth2";

/// Static configuration for a [`VolvoClient`](crate::client::VolvoClient).
#[derive(Clone)]
pub struct VolvoConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret (sent via HTTP Basic).
	pub client_secret: String,
	/// Redirect URI registered with the application.
	pub redirect_uri: Url,
	/// Application API key sent as `vcc-api-key`.
	pub vcc_api_key: String,
	/// Scopes requested during authorization.
	pub scopes: ScopeSet,
	/// Connected-vehicle API base URL.
	pub api_base_url: Url,
	/// Authorization server base URL.
	pub auth_base_url: Url,
	/// Token file location used by [`FileStore`](crate::store::FileStore).
	pub token_storage_path: PathBuf,
	/// Vehicles polled by the scheduler; empty means "every vehicle on the account".
	pub vins: Vec<Vin>,
	/// Minimum spacing between outbound API requests; zero disables limiting.
	pub min_request_interval: StdDuration,
	/// Per-request HTTP timeout.
	pub request_timeout: StdDuration,
}
impl VolvoConfig {
	/// Creates a configuration with the required credentials and default endpoints.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
		vcc_api_key: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_uri,
			vcc_api_key: vcc_api_key.into(),
			scopes: ScopeSet::category(ScopeCategory::Default),
			api_base_url: default_url(DEFAULT_API_BASE_URL),
			auth_base_url: default_url(DEFAULT_AUTH_BASE_URL),
			token_storage_path: PathBuf::from(DEFAULT_TOKEN_STORAGE_PATH),
			vins: Vec::new(),
			min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Loads the configuration through a caller-supplied variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &'static str| -> Option<String> {
			lookup(name)
				.filter(|v| !v.trim().is_empty())
				.or_else(|| lookup(&format!("{ENV_PREFIX}{name}")))
				.filter(|v| !v.trim().is_empty())
				.map(|v| v.trim().to_owned())
		};
		let required = |name: &'static str| get(name).ok_or(ConfigError::MissingVariable { name });
		let redirect_raw = required("REDIRECT_URI")?;
		let redirect_uri =
			Url::parse(&redirect_raw).map_err(|e| ConfigError::invalid_url(redirect_raw, e))?;
		let mut config = Self::new(
			required("CLIENT_ID")?,
			required("CLIENT_SECRET")?,
			redirect_uri,
			required("VCC_API_KEY")?,
		);

		if let Some(raw) = get("SCOPES") {
			config.scopes = parse_scopes(&raw)?;
		}
		if let Some(raw) = get("API_BASE_URL") {
			config.api_base_url = Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e))?;
		}
		if let Some(raw) = get("AUTH_BASE_URL") {
			config.auth_base_url = Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e))?;
		}
		if let Some(raw) = get("TOKEN_STORAGE_PATH") {
			config.token_storage_path = PathBuf::from(raw);
		}
		if let Some(raw) = get("VINS") {
			config.vins = raw
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(Vin::new)
				.collect::<Result<_, _>>()?;
		}
		if let Some(raw) = get("MIN_REQUEST_INTERVAL_MS") {
			config.min_request_interval =
				StdDuration::from_millis(parse_u64("MIN_REQUEST_INTERVAL_MS", &raw)?);
		}
		if let Some(raw) = get("REQUEST_TIMEOUT_SECS") {
			let secs = parse_u64("REQUEST_TIMEOUT_SECS", &raw)?;

			if secs == 0 {
				return Err(ConfigError::InvalidVariable {
					name: "REQUEST_TIMEOUT_SECS",
					reason: "must be greater than zero".into(),
				});
			}

			config.request_timeout = StdDuration::from_secs(secs);
		}

		Ok(config)
	}

	/// Overrides the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the API base URL.
	pub fn with_api_base_url(mut self, url: Url) -> Self {
		self.api_base_url = url;

		self
	}

	/// Overrides the authorization server base URL.
	pub fn with_auth_base_url(mut self, url: Url) -> Self {
		self.auth_base_url = url;

		self
	}

	/// Overrides the token file location.
	pub fn with_token_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.token_storage_path = path.into();

		self
	}

	/// Sets the vehicles polled by the scheduler.
	pub fn with_vins(mut self, vins: impl IntoIterator<Item = Vin>) -> Self {
		self.vins = vins.into_iter().collect();

		self
	}

	/// Overrides the minimum spacing between API requests.
	pub fn with_min_request_interval(mut self, interval: StdDuration) -> Self {
		self.min_request_interval = interval;

		self
	}

	/// Overrides the per-request HTTP timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Authorization endpoint (`<auth base>/as/authorization.oauth2`).
	pub fn authorization_endpoint(&self) -> Result<Url, ConfigError> {
		join(&self.auth_base_url, AUTHORIZATION_PATH)
	}

	/// Token endpoint (`<auth base>/as/token.oauth2`).
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		join(&self.auth_base_url, TOKEN_PATH)
	}

	/// Resolves an API path (leading slash included) against the API base URL.
	pub fn api_url(&self, path: &str) -> Result<Url, ConfigError> {
		join(&self.api_base_url, path)
	}
}
impl Debug for VolvoConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VolvoConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("vcc_api_key", &"<redacted>")
			.field("scopes", &self.scopes)
			.field("api_base_url", &self.api_base_url.as_str())
			.field("auth_base_url", &self.auth_base_url.as_str())
			.field("token_storage_path", &self.token_storage_path)
			.field("vins", &self.vins)
			.field("min_request_interval", &self.min_request_interval)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

fn default_url(raw: &'static str) -> Url {
	Url::parse(raw).unwrap_or_else(|e| unreachable!("default URL {raw} is invalid: {e}"))
}

/// Appends `path` to `base`, keeping any path prefix the base already carries.
fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let raw = format!("{}{}", base.as_str().trim_end_matches('/'), path);

	Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e))
}

fn parse_scopes(raw: &str) -> Result<ScopeSet, ConfigError> {
	match ScopeCategory::from_name(raw) {
		Some(category) => Ok(ScopeSet::category(category)),
		None => Ok(ScopeSet::from_comma_separated(raw)?),
	}
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
	raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidVariable {
		name,
		reason: e.to_string(),
	})
}

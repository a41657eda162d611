//! Shared helpers for the token-endpoint grants (request dispatch, response parsing, error mapping).

// crates.io
use reqwest::{StatusCode, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret, TokenSet},
	error::{ConfigError, TransientError},
	flows::Authorizer,
	http::HttpResponse,
};

/// `grant_type` of the authorization-code exchange.
pub(crate) const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";
/// `grant_type` of the refresh-token exchange.
pub(crate) const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::seconds(3_600);

/// Successful token-endpoint payload.
///
/// `token_type` is not required; the authority sometimes omits it.
#[derive(Clone, Deserialize)]
pub(crate) struct TokenResponse {
	pub(crate) access_token: String,
	#[serde(default)]
	pub(crate) refresh_token: Option<String>,
	#[serde(default)]
	pub(crate) expires_in: Option<i64>,
	#[serde(default)]
	pub(crate) scope: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

impl Authorizer {
	/// POSTs a form to the token endpoint with HTTP Basic client authentication.
	pub(crate) async fn request_token(
		&self,
		grant: &'static str,
		form: &[(&str, &str)],
	) -> Result<TokenResponse> {
		let config = self.config();
		let endpoint = config.token_endpoint()?;
		let mut params = Vec::with_capacity(form.len() + 1);

		params.push(("grant_type", grant));
		params.extend_from_slice(form);

		let request = self
			.http_client
			.post(endpoint)
			.basic_auth(&config.client_id, Some(&config.client_secret))
			.header(ACCEPT, "application/json")
			.form(&params);
		let response = self.http_client.send(request, "token endpoint").await?;

		if !response.is_success() {
			let err = map_token_error(grant, &response);

			tracing::warn!(grant, status = response.status.as_u16(), "Token endpoint rejected the request.");

			return Err(err);
		}

		parse_token_response(&response)
	}

	/// Converts a token response into a persisted-ready [`TokenSet`].
	///
	/// `previous_refresh` is kept when the response does not rotate the refresh token.
	pub(crate) fn token_set_from_response(
		&self,
		response: TokenResponse,
		requested_scopes: &ScopeSet,
		previous_refresh: Option<&TokenSecret>,
	) -> Result<TokenSet> {
		let expires_in = match response.expires_in {
			Some(secs) if secs <= 0 => return Err(ConfigError::NonPositiveExpiresIn.into()),
			Some(secs) if secs > i64::from(u32::MAX) =>
				return Err(ConfigError::ExpiresInOutOfRange.into()),
			Some(secs) => Duration::seconds(secs),
			None => DEFAULT_EXPIRES_IN,
		};
		let scopes = match response.scope.as_deref().map(str::parse::<ScopeSet>) {
			Some(Ok(granted)) if !granted.is_empty() => granted,
			_ => requested_scopes.clone(),
		};
		let mut builder = TokenSet::builder()
			.access_token(response.access_token)
			.scopes(scopes)
			.issued_at(OffsetDateTime::now_utc())
			.expires_in(expires_in)
			.safety_margin(self.expiry_margin());

		match (response.refresh_token, previous_refresh) {
			(Some(fresh), _) => builder = builder.refresh_token(fresh),
			(None, Some(previous)) => builder = builder.refresh_token(previous.expose()),
			(None, None) => {},
		}

		builder.build().map_err(|e| Error::authentication(e.to_string()))
	}
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		Error::from(TransientError::TokenResponseParse {
			source,
			status: Some(response.status.as_u16()),
		})
	})
}

/// Classifies a non-2xx token-endpoint response.
///
/// A failed code exchange is always an authentication failure: the code is single-use, so there is
/// nothing to retry. For refresh, 429 and 5xx are temporary and every other 4xx means the grant or
/// client was rejected.
pub(crate) fn map_token_error(grant: &str, response: &HttpResponse) -> Error {
	let status = response.status;
	let message = match serde_json::from_slice::<OAuthErrorBody>(&response.body) {
		Ok(OAuthErrorBody { error, error_description: Some(description) }) =>
			format!("{error}: {description}"),
		Ok(OAuthErrorBody { error, error_description: None }) => error,
		Err(_) => format!("token endpoint returned HTTP {}", status.as_u16()),
	};

	if grant == AUTHORIZATION_CODE_GRANT {
		return Error::authentication(message);
	}
	if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
		return TransientError::TokenEndpoint {
			message,
			status: Some(status.as_u16()),
			retry_after: response.retry_after,
		}
		.into();
	}
	if status.is_client_error() {
		return Error::authentication(message);
	}

	TransientError::TokenEndpoint { message, status: Some(status.as_u16()), retry_after: None }
		.into()
}

//! Authorization Code + PKCE onboarding.
//!
//! [`Authorizer::start_authorization`] produces the URL the user opens in a browser together with
//! the [`PkceChallenge`] that must be kept until the redirect arrives.
//! [`Authorizer::complete_authorization`] parses the redirect, validates `state`, exchanges the
//! code, and persists the resulting token set.

mod session;

pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSet},
	flows::{Authorizer, common::AUTHORIZATION_CODE_GRANT},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl Authorizer {
	/// Builds the authorization URL for the provided scopes and redirect URI.
	///
	/// No side effects; the returned challenge carries the verifier and `state`.
	pub fn build_authorization_url(
		&self,
		scopes: &ScopeSet,
		redirect_uri: &Url,
	) -> Result<(Url, PkceChallenge)> {
		let _span = FlowSpan::new(FlowKind::AuthorizationCode, "build_authorization_url").entered();
		let endpoint = self.config().authorization_endpoint()?;
		let challenge = PkceChallenge::generate(redirect_uri.clone(), scopes.clone());
		let url = session::build_authorize_url(endpoint, &self.config().client_id, &challenge);

		tracing::debug!(scopes = %scopes, "Authorization URL built.");

		Ok((url, challenge))
	}

	/// Builds the authorization URL for the configured scopes and redirect URI.
	pub fn start_authorization(&self) -> Result<(Url, PkceChallenge)> {
		let config = self.config();

		self.build_authorization_url(&config.scopes, &config.redirect_uri)
	}

	/// Extracts `(code, state)` from the redirect URL the authority sent the user to.
	///
	/// An `error` parameter becomes [`Error::Authentication`]; a missing `code` or `state` or an
	/// unparseable URL becomes [`Error::CallbackParse`].
	pub fn extract_code(callback_url: &str) -> Result<(String, String)> {
		let url = Url::parse(callback_url.trim())
			.map_err(|e| Error::callback_parse(format!("callback URL cannot be parsed: {e}")))?;
		let mut code = None;
		let mut state = None;
		let mut error = None;
		let mut error_description = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"code" => code = Some(value.into_owned()),
				"state" => state = Some(value.into_owned()),
				"error" => error = Some(value.into_owned()),
				"error_description" => error_description = Some(value.into_owned()),
				_ => {},
			}
		}

		if let Some(error) = error {
			let reason = match error_description {
				Some(description) => format!("{error}: {description}"),
				None => error,
			};

			return Err(Error::authentication(reason));
		}

		let code = code
			.filter(|c| !c.is_empty())
			.ok_or_else(|| Error::callback_parse("callback URL has no `code` parameter"))?;
		let state = state
			.filter(|s| !s.is_empty())
			.ok_or_else(|| Error::callback_parse("callback URL has no `state` parameter"))?;

		Ok((code, state))
	}

	/// Parses the redirect, validates `state`, and exchanges the code for tokens.
	pub async fn complete_authorization(
		&self,
		challenge: &PkceChallenge,
		callback_url: &str,
	) -> Result<TokenSet> {
		let (code, state) = Self::extract_code(callback_url)?;

		challenge.validate_state(&state)?;

		self.exchange_code(&code, challenge.verifier(), &challenge.redirect_uri, &challenge.scopes)
			.await
	}

	/// Exchanges an authorization code using the configured redirect URI and scopes.
	///
	/// The resulting token set is persisted before it is returned.
	pub async fn exchange_code_for_tokens(&self, code: &str, verifier: &str) -> Result<TokenSet> {
		let config = self.config();

		self.exchange_code(code, verifier, &config.redirect_uri, &config.scopes).await
	}

	async fn exchange_code(
		&self,
		code: &str,
		verifier: &str,
		redirect_uri: &Url,
		scopes: &ScopeSet,
	) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code_for_tokens");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let response = self
					.request_token(
						AUTHORIZATION_CODE_GRANT,
						&[
							("code", code),
							("redirect_uri", redirect_uri.as_str()),
							("code_verifier", verifier),
						],
					)
					.await?;
				let tokens = self.token_set_from_response(response, scopes, None)?;

				self.store().save(tokens.clone()).await?;

				tracing::info!(expires_at = %tokens.expires_at, "Authorization completed.");

				Ok(tokens)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

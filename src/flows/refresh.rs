//! Refresh token orchestration with a single-flight guard and metrics.
//!
//! [`Authorizer::get_valid_access_token`] returns the stored access token while it is within its
//! margin-adjusted lifetime. Once it expires, callers queue on one async mutex: the first performs
//! a `grant_type=refresh_token` call while the rest wait and reuse its result after re-reading the
//! store. A rejected refresh token revokes the stored set, so later callers fail fast with
//! [`Error::Authentication`] until the user authorizes again.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret, TokenSet},
	flows::{Authorizer, common::REFRESH_TOKEN_GRANT},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl Authorizer {
	/// Returns an access token that is valid now, refreshing it first when needed.
	pub async fn get_valid_access_token(&self) -> Result<String> {
		if let Some(token) = self.usable_access_token().await? {
			return Ok(token);
		}

		let _singleflight = self.refresh_guard.lock().await;
		let current = self.load_for_refresh().await?;

		if current.is_active_at(OffsetDateTime::now_utc()) {
			self.refresh_metrics.record_reuse();

			return Ok(current.access_token.expose().to_owned());
		}

		self.refresh_locked(current).await.map(|tokens| tokens.access_token.expose().to_owned())
	}

	/// Refreshes after the API rejected `stale_access_token` with HTTP 401.
	///
	/// When another caller already replaced the stale token, the replacement is reused and no
	/// token-endpoint call is made.
	pub async fn force_refresh(&self, stale_access_token: &str) -> Result<String> {
		let _singleflight = self.refresh_guard.lock().await;
		let current = self.load_for_refresh().await?;

		if !current.access_token.matches(stale_access_token)
			&& current.is_active_at(OffsetDateTime::now_utc())
		{
			self.refresh_metrics.record_reuse();

			return Ok(current.access_token.expose().to_owned());
		}

		self.refresh_locked(current).await.map(|tokens| tokens.access_token.expose().to_owned())
	}

	/// Exchanges `refresh_token` for a new token set and persists it.
	///
	/// A rejected refresh token marks the stored set as revoked and yields
	/// [`Error::Authentication`]. Transport and server failures leave the store untouched. When
	/// the response carries no new refresh token, `refresh_token` is kept.
	///
	/// Shares the single-flight guard with [`Self::get_valid_access_token`], so concurrent
	/// callers wait for this refresh and reuse its result.
	pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
		let _singleflight = self.refresh_guard.lock().await;
		let _flag = self.mark_refreshing();
		let scopes = match self.store().load().await? {
			Some(current) => current.scopes,
			None => self.config().scopes.clone(),
		};

		self.refresh_with(&TokenSecret::new(refresh_token), &scopes).await
	}

	async fn usable_access_token(&self) -> Result<Option<String>> {
		let current = self.store().load().await?.ok_or_else(not_authorized)?;

		if current.is_revoked() {
			return Err(revoked());
		}
		if current.is_active_at(OffsetDateTime::now_utc()) {
			return Ok(Some(current.access_token.expose().to_owned()));
		}

		Ok(None)
	}

	async fn load_for_refresh(&self) -> Result<TokenSet> {
		let current = self.store().load().await?.ok_or_else(not_authorized)?;

		if current.is_revoked() {
			return Err(revoked());
		}

		Ok(current)
	}

	/// Runs a refresh for `current`. Callers must hold the single-flight guard.
	async fn refresh_locked(&self, current: TokenSet) -> Result<TokenSet> {
		let refresh_token = current.refresh_token.ok_or_else(|| {
			Error::authentication("Access token expired and no refresh token is stored")
		})?;
		let _flag = self.mark_refreshing();

		self.refresh_with(&refresh_token, &current.scopes).await
	}

	async fn refresh_with(&self, refresh_token: &TokenSecret, scopes: &ScopeSet) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				let response = match self
					.request_token(REFRESH_TOKEN_GRANT, &[("refresh_token", refresh_token.expose())])
					.await
				{
					Ok(response) => response,
					Err(err) => {
						self.refresh_metrics.record_failure();

						if err.is_authentication() {
							tracing::warn!(error = %err, "Refresh token rejected; revoking stored credentials.");

							if let Err(store_err) =
								self.store().revoke(OffsetDateTime::now_utc()).await
							{
								tracing::error!(error = %store_err, "Failed to mark stored credentials as revoked.");
							}
						}

						return Err(err);
					},
				};
				let tokens = self
					.token_set_from_response(response, scopes, Some(refresh_token))
					.inspect_err(|_| self.refresh_metrics.record_failure())?;

				self.store()
					.save(tokens.clone())
					.await
					.inspect_err(|_| self.refresh_metrics.record_failure())?;
				self.refresh_metrics.record_success();

				tracing::debug!(expires_at = %tokens.expires_at, "Access token refreshed.");

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

fn not_authorized() -> Error {
	Error::authentication("No stored credentials; authorization is required")
}

fn revoked() -> Error {
	Error::authentication("Stored credentials were revoked; authorization is required")
}

//! Token lifecycle orchestration: authorization-code + PKCE onboarding and single-flight refresh.

pub mod auth_code_pkce;
pub mod common;
pub mod refresh;

pub use auth_code_pkce::*;
pub use refresh::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	config::VolvoConfig,
	http::ReqwestHttpClient,
	store::TokenStore,
};

/// Default amount subtracted from the server-declared token lifetime.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// Authorization state derived from the stored token set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthState {
	/// No usable credentials; a new authorization is required.
	Unauthenticated,
	/// Credentials are stored and usable (possibly after a refresh).
	Authenticated,
	/// A refresh call is in flight.
	Refreshing,
}

/// Owns the token lifecycle for a single client against the Volvo ID authority.
///
/// The authorizer holds the HTTP client, token store, and configuration so the grant
/// implementations in [`auth_code_pkce`] and [`refresh`] can focus on request shaping. All
/// refreshes run behind one async mutex so concurrent callers observing an expired token
/// trigger exactly one token-endpoint call.
pub struct Authorizer {
	config: Arc<VolvoConfig>,
	http_client: ReqwestHttpClient,
	store: Arc<dyn TokenStore>,
	expiry_margin: Duration,
	refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: AsyncMutex<()>,
	refreshing: AtomicBool,
}
impl Authorizer {
	/// Creates an authorizer using the provided transport and store.
	pub fn new(
		config: Arc<VolvoConfig>,
		http_client: ReqwestHttpClient,
		store: Arc<dyn TokenStore>,
	) -> Self {
		Self {
			config,
			http_client,
			store,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
			refresh_metrics: Default::default(),
			refresh_guard: AsyncMutex::new(()),
			refreshing: AtomicBool::new(false),
		}
	}

	/// Overrides the safety margin subtracted from `expires_in` (defaults to 60 seconds).
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Configuration in use.
	pub fn config(&self) -> &VolvoConfig {
		&self.config
	}

	/// Token store in use.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Safety margin applied to new token sets.
	pub fn expiry_margin(&self) -> Duration {
		self.expiry_margin
	}

	/// Shared refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Derives the current [`AuthState`] from the store.
	pub async fn state(&self) -> Result<AuthState> {
		if self.refreshing.load(Ordering::Acquire) {
			return Ok(AuthState::Refreshing);
		}

		let state = match self.store.load().await? {
			None => AuthState::Unauthenticated,
			Some(tokens) if tokens.is_revoked() => AuthState::Unauthenticated,
			Some(tokens)
				if tokens.refresh_token.is_none()
					&& !tokens.is_active_at(OffsetDateTime::now_utc()) =>
				AuthState::Unauthenticated,
			Some(_) => AuthState::Authenticated,
		};

		Ok(state)
	}

	/// Returns `true` unless a new authorization is required.
	///
	/// Store failures are logged and reported as unauthenticated.
	pub async fn is_authenticated(&self) -> bool {
		match self.state().await {
			Ok(state) => state != AuthState::Unauthenticated,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to read the token store.");

				false
			},
		}
	}

	/// Removes the stored credentials.
	pub async fn logout(&self) -> Result<()> {
		let _singleflight = self.refresh_guard.lock().await;

		self.store.clear().await?;

		tracing::info!("Stored credentials cleared.");

		Ok(())
	}

	fn mark_refreshing(&self) -> RefreshingFlag<'_> {
		self.refreshing.store(true, Ordering::Release);

		RefreshingFlag(&self.refreshing)
	}
}
impl Debug for Authorizer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authorizer")
			.field("client_id", &self.config.client_id)
			.field("expiry_margin", &self.expiry_margin)
			.field("refreshing", &self.refreshing.load(Ordering::Relaxed))
			.finish()
	}
}

/// Clears the refreshing flag on every exit path, including cancellation.
struct RefreshingFlag<'a>(&'a AtomicBool);
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

//! In-process [`TokenStore`] for tests and short-lived tools.

// self
use crate::{
	_prelude::*,
	auth::TokenSet,
	store::{StoreFuture, TokenStore},
};

/// Thread-safe store that never touches disk.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<TokenSet>>>);
impl MemoryStore {
	/// Creates a store pre-seeded with a token set.
	pub fn with_tokens(tokens: TokenSet) -> Self {
		Self(Arc::new(RwLock::new(Some(tokens))))
	}

	/// Returns a synchronous snapshot of the stored token set.
	pub fn snapshot(&self) -> Option<TokenSet> {
		self.0.read().clone()
	}
}
impl TokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenSet>> {
		Box::pin(async move { Ok(self.0.read().clone()) })
	}

	fn save(&self, tokens: TokenSet) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			*self.0.write() = Some(tokens);

			Ok(())
		})
	}

	fn revoke(&self, instant: OffsetDateTime) -> StoreFuture<'_, Option<TokenSet>> {
		Box::pin(async move {
			let mut guard = self.0.write();

			Ok(guard.as_mut().map(|tokens| {
				tokens.revoke(instant);

				tokens.clone()
			}))
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().take();

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tokens() -> TokenSet {
		TokenSet::builder()
			.access_token("access")
			.refresh_token("refresh")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.")
	}

	#[tokio::test]
	async fn save_revoke_and_clear() {
		let store = MemoryStore::default();

		assert!(store.load().await.expect("Load should succeed.").is_none());

		store.save(tokens()).await.expect("Save should succeed.");

		let revoked = store
			.revoke(OffsetDateTime::now_utc())
			.await
			.expect("Revoke should succeed.")
			.expect("Revoke should return the stored set.");

		assert!(revoked.is_revoked());
		assert!(store.snapshot().is_some_and(|t| t.is_revoked()));

		store.clear().await.expect("Clear should succeed.");

		assert!(store.snapshot().is_none());
	}
}

//! Storage contract and built-in stores for the client's token set.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenSet};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable home of the single token set owned by a client.
///
/// Implementations keep the latest token set in memory so reads never touch durable
/// storage, and persist on every mutation.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current token set, if any.
	fn load(&self) -> StoreFuture<'_, Option<TokenSet>>;

	/// Persists or replaces the token set.
	fn save(&self, tokens: TokenSet) -> StoreFuture<'_, ()>;

	/// Marks the stored token set as revoked at the provided instant.
	fn revoke(&self, instant: OffsetDateTime) -> StoreFuture<'_, Option<TokenSet>>;

	/// Removes every stored credential.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk full"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}

//! Storage contracts and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, credential::CredentialPair};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the session credential pair.
///
/// Implementations must be safe to call from the coordinator's critical path: a write
/// replaces the pair wholesale, so a concurrent reader never observes a lone access
/// token without its refresh counterpart.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current credential pair, if one is stored.
	fn load(&self) -> StoreFuture<'_, Option<CredentialPair>>;

	/// Replaces the stored pair wholesale.
	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Removes the stored pair.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
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

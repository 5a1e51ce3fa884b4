//! Watch-backed in-memory [`CredentialStore`] for tests, demos, and UI bindings.

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	credential::CredentialPair,
	store::{CredentialStore, StoreFuture},
};

/// In-process store that broadcasts every credential change to subscribers.
///
/// The pair lives inside a [`watch`] channel, so reads and writes are atomic and UI
/// hosts can observe login/refresh/logout transitions without polling.
#[derive(Clone, Debug)]
pub struct MemoryStore(watch::Sender<Option<CredentialPair>>);
impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self(watch::Sender::new(None))
	}

	/// Creates a store seeded with an existing pair.
	pub fn with_pair(pair: CredentialPair) -> Self {
		Self(watch::Sender::new(Some(pair)))
	}

	/// Subscribes to credential changes; each notification carries the full pair state.
	pub fn subscribe(&self) -> watch::Receiver<Option<CredentialPair>> {
		self.0.subscribe()
	}

	/// Returns the current pair without going through the async contract.
	pub fn current(&self) -> Option<CredentialPair> {
		self.0.borrow().clone()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialPair>> {
		Box::pin(async move { Ok(self.0.borrow().clone()) })
	}

	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.send_replace(Some(pair));

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.send_replace(None);

			Ok(())
		})
	}
}

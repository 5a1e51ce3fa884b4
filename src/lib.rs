//! Async task-management API client—bearer authentication, a single-flight
//! credential-refresh coordinator, and transport-aware observability in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod classify;
pub mod client;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::ApiClient,
		http::ReqwestTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs an [`ApiClient`] backed by an in-memory store and the insecure test
	/// transport, returning the store handle for seeding and inspection.
	pub fn build_test_client(base_url: &str) -> (ApiClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::new());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let base = Url::parse(base_url).expect("Test base URL should parse successfully.");
		let client = ApiClient::with_transport(base, store, Arc::new(test_reqwest_transport()))
			.expect("Test client should build successfully.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;

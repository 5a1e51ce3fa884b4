//! Transport primitives for the task API client.
//!
//! The module exposes [`ApiTransport`] so downstream crates can integrate custom HTTP
//! clients: the trait is the client's only dependency on an HTTP stack. Responses are
//! fully buffered before they are returned, which keeps the response classifier and
//! the refresh coordinator free of streaming concerns.

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Request type flowing through [`ApiTransport`].
pub type HttpRequest = http::Request<Vec<u8>>;
/// Buffered response type produced by [`ApiTransport`].
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing one buffered exchange.
///
/// Implementations must be `Send + Sync` so a single transport can be shared between
/// the request path and the refresh coordinator. Timeouts are the transport's own
/// responsibility; the coordinator imposes none of its own on the refresh call.
pub trait ApiTransport
where
	Self: Send + Sync,
{
	/// Executes one HTTP exchange, buffering the full response body.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Configure timeouts on the [`ReqwestClient`] itself; a timeout during a refresh
/// call surfaces as a refresh failure like any other transport error.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request =
				reqwest::Request::try_from(request).map_err(TransportError::network)?;
			let response = client.execute(request).await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut buffered =
				HttpResponse::new(response.bytes().await.map_err(TransportError::from)?.to_vec());

			*buffered.status_mut() = status;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

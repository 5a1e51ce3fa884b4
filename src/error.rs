//! Client-level error types shared across the coordinator, stores, and typed endpoints.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-building problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Non-2xx API response surfaced to the caller.
	#[error("API request failed with status {status}: {message}.")]
	Api {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Message extracted from the response body, or the status reason phrase.
		message: String,
	},
	/// Credential refresh failed; the session cannot be recovered automatically.
	#[error("Credential refresh failed: {reason}.")]
	RefreshFailed {
		/// Human-readable failure summary shared by every affected caller.
		reason: String,
	},
	/// No usable session remains; the caller must re-authenticate.
	#[error("Session has ended and re-authentication is required.")]
	SessionEnded,
	/// The pending-retry queue behind an in-flight refresh is full.
	#[error("Refresh queue is full ({capacity} suspended callers).")]
	RefreshQueueFull {
		/// Configured queue bound that was hit.
		capacity: usize,
	},
}

/// Configuration and request-building failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Endpoint path cannot be joined onto the base URL.
	#[error("Endpoint path `{path}` cannot be joined onto the base URL.")]
	InvalidEndpoint {
		/// Path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},

	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestEncode(#[from] serde_json::Error),
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	ResponseDecode {
		/// Structured parsing failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Response envelope carried no data payload.
	#[error("Response envelope is missing its data payload.")]
	MissingData,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
///
/// These are never retried by the coordinator; a transport failure during a refresh
/// cycle is treated as a refresh failure and fans out to every queued caller.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request timed out before the server responded.
	#[error("Request timed out before the server responded.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

//! Response classification driving the refresh-and-retry-once policy.
//!
//! A completed attempt lands in exactly one of three buckets: forward the response,
//! hand control to the refresh coordinator, or fail terminally. The retry marker
//! keeps a request that still receives a 401 after a fresh credential from triggering
//! another refresh cycle.

// crates.io
use http::StatusCode;
// self
use crate::{_prelude::*, http::HttpResponse};

#[derive(Deserialize)]
struct MessageBody {
	#[serde(default)]
	message: Option<String>,
}

/// Classification of one completed request attempt.
#[derive(Debug)]
pub enum Disposition {
	/// 2xx response, forwarded unchanged.
	Success(HttpResponse),
	/// 401 on a first attempt; the caller should obtain a fresh credential and retry once.
	AuthFailure,
	/// Terminal failure carrying the extracted error.
	Failed(Error),
}

/// Classifies a completed attempt against the per-request retry marker.
///
/// A 401 on an already-retried request is not an authorization failure anymore; it
/// surfaces as an application error like any other non-2xx status.
pub fn classify(response: HttpResponse, already_retried: bool) -> Disposition {
	let status = response.status();

	if status.is_success() {
		return Disposition::Success(response);
	}
	if status == StatusCode::UNAUTHORIZED && !already_retried {
		return Disposition::AuthFailure;
	}

	let message = extract_message(response.body())
		.unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

	Disposition::Failed(Error::Api { status: status.as_u16(), message })
}

/// Pulls the `message` field out of an error body, when one exists.
pub(crate) fn extract_message(body: &[u8]) -> Option<String> {
	serde_json::from_slice::<MessageBody>(body)
		.ok()
		.and_then(|parsed| parsed.message)
		.filter(|message| !message.is_empty())
}

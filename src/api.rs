//! Wire types and typed endpoint methods for the task-management API.

pub mod auth;
pub mod tasks;

pub use auth::*;
pub use tasks::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Response envelope shared by every task API endpoint.
///
/// The `message` field doubles as the error text surfaced to callers on non-2xx
/// responses; on success it usually carries a human-readable status line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
	/// Human-readable status or error description.
	#[serde(default)]
	pub message: Option<String>,
	/// Payload carried on success.
	#[serde(default = "Option::default")]
	pub data: Option<T>,
}
impl<T> ApiEnvelope<T> {
	/// Extracts the payload, failing when the envelope carries none.
	pub fn into_data(self) -> Result<T> {
		self.data.ok_or_else(|| ConfigError::MissingData.into())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn envelope_tolerates_missing_fields() {
		let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_str("{\"data\":[1,2]}")
			.expect("Envelope without a message should deserialize.");

		assert_eq!(envelope.message, None);
		assert_eq!(envelope.into_data().expect("Data should be present."), vec![1, 2]);

		let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_str("{\"message\":\"ok\"}")
			.expect("Envelope without data should deserialize.");

		assert!(matches!(
			envelope.into_data().expect_err("Missing data should fail."),
			crate::error::Error::Config(ConfigError::MissingData),
		));
	}
}

//! Session lifecycle signal emitted when a refresh cycle cannot recover the session.

// crates.io
use tokio::sync::watch;
// self
use crate::_prelude::*;

/// Reason attached to a session-ended notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEndReason {
	/// No refresh token was available when an authorization failure arrived.
	MissingRefreshToken,
	/// The refresh endpoint rejected the refresh token or could not be reached.
	RefreshFailed {
		/// Human-readable failure summary.
		reason: String,
	},
}
impl Display for SessionEndReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingRefreshToken => f.write_str("missing refresh token"),
			Self::RefreshFailed { reason } => f.write_str(reason),
		}
	}
}

/// State observed through [`SessionWatch`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
	/// Number of failed refresh cycles since the client was created.
	pub ended_cycles: u64,
	/// Reason for the most recent session end, if any.
	pub last_reason: Option<SessionEndReason>,
}

/// Sender half owned by the coordinator.
///
/// [`SessionSignal::end`] fires exactly once per failed refresh cycle, never once per
/// queued caller, so hosts can redirect to re-authentication without deduplicating.
#[derive(Debug)]
pub(crate) struct SessionSignal(watch::Sender<SessionState>);
impl SessionSignal {
	pub(crate) fn new() -> Self {
		Self(watch::Sender::new(SessionState::default()))
	}

	pub(crate) fn subscribe(&self) -> SessionWatch {
		SessionWatch(self.0.subscribe())
	}

	pub(crate) fn end(&self, reason: SessionEndReason) {
		self.0.send_modify(|state| {
			state.ended_cycles += 1;
			state.last_reason = Some(reason);
		});
	}
}

/// Receiver handle hosts use to observe session-ended events.
#[derive(Clone, Debug)]
pub struct SessionWatch(watch::Receiver<SessionState>);
impl SessionWatch {
	/// Returns the most recently published session state.
	pub fn state(&self) -> SessionState {
		self.0.borrow().clone()
	}

	/// Waits for the next session-ended notification and returns the updated state.
	///
	/// Returns immediately with the current state when the owning coordinator has been
	/// dropped.
	pub async fn ended(&mut self) -> SessionState {
		let _ = self.0.changed().await;

		self.0.borrow_and_update().clone()
	}
}

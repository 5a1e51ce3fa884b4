//! Single-flight credential refresh coordination.
//!
//! [`RefreshCoordinator`] owns the `Idle`/`Refreshing` state machine and the FIFO
//! queue of suspended callers. When several requests hit a 401 near-simultaneously,
//! exactly one refresh call reaches `POST <base>/auth/refresh-token`; every other
//! caller parks on a oneshot channel and is resumed with the new access token (or
//! failed with the shared refresh error) once that call concludes. The session-ended
//! signal fires once per failed cycle, never once per queued caller.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::{
	collections::VecDeque,
	mem,
	sync::atomic::{AtomicUsize, Ordering},
};
// crates.io
use http::{Method, header::AUTHORIZATION};
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	api::AuthTokens,
	classify,
	credential::{CredentialPair, TokenSecret},
	http::{ApiTransport, HttpRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{SessionEndReason, SessionSignal, SessionWatch},
	store::CredentialStore,
};

/// Refresh cycle state. Exactly one instance lives inside the coordinator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh in flight; the next authorization failure starts one.
	#[default]
	Idle,
	/// A refresh call is running; new authorization failures must queue behind it.
	Refreshing,
}

/// Cloneable refresh failure fanned out to every caller of a failed cycle.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token was stored when the cycle started.
	#[error("No refresh token is available; the session has ended.")]
	MissingRefreshToken,
	/// The refresh request could not be constructed.
	#[error("Refresh request could not be constructed: {message}.")]
	Request {
		/// Human-readable construction failure.
		message: String,
	},
	/// The credential store failed while the cycle held the refresh slot.
	#[error("Credential store failed during refresh: {message}.")]
	Store {
		/// Human-readable store failure.
		message: String,
	},
	/// The transport failed before the refresh endpoint responded.
	#[error("Transport failed during refresh: {message}.")]
	Transport {
		/// Human-readable transport failure.
		message: String,
	},
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the refresh token (status {status}): {message}.")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Message extracted from the response body, or a generic summary.
		message: String,
	},
	/// The refresh endpoint returned a body that is not a credential pair.
	#[error("Refresh endpoint returned a malformed credential payload: {message}.")]
	MalformedResponse {
		/// Structured decode failure summary.
		message: String,
	},
}
impl From<RefreshError> for Error {
	fn from(e: RefreshError) -> Self {
		match e {
			RefreshError::MissingRefreshToken => Error::SessionEnded,
			other => Error::RefreshFailed { reason: other.to_string() },
		}
	}
}

/// One caller's suspended retry, consumed exactly once by replay or failure.
struct PendingRequest {
	tx: oneshot::Sender<Result<TokenSecret, RefreshError>>,
}
impl PendingRequest {
	fn resume(self, outcome: Result<TokenSecret, RefreshError>) {
		// The caller may have been cancelled while queued; a dropped receiver simply
		// discards the resolution without perturbing the rest of the drain.
		let _ = self.tx.send(outcome);
	}
}

#[derive(Default)]
struct Flight {
	state: RefreshState,
	queue: VecDeque<PendingRequest>,
}

/// Restores the coordinator when the triggering caller is cancelled mid-cycle.
///
/// The cycle runs inside the trigger's own future, so dropping that future would
/// otherwise leave the state at `Refreshing` forever: queued waiters would park on
/// senders sitting in a queue nobody drains. Disarmed once the cycle reaches its own
/// drain; on a cancelled cycle the state returns to `Idle` and the queue is dropped,
/// which wakes every waiter through its closed channel.
struct CycleGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	armed: bool,
}
impl Drop for CycleGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let mut flight = self.coordinator.flight.lock();

		flight.state = RefreshState::Idle;
		flight.queue.clear();
	}
}

/// Coordinates credential refreshes across concurrent request paths.
///
/// All shared state sits behind a single mutex that is never held across an `.await`:
/// the check-and-transition from `Idle` to `Refreshing` and the enqueue of a waiter
/// while `Refreshing` are atomic with respect to each other, so two concurrent
/// authorization failures can never both start a refresh call.
pub struct RefreshCoordinator {
	transport: Arc<dyn ApiTransport>,
	store: Arc<dyn CredentialStore>,
	refresh_url: Url,
	flight: Mutex<Flight>,
	queue_capacity: AtomicUsize,
	session: SessionSignal,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Default bound on callers parked behind an in-flight refresh.
	pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

	/// Creates a coordinator for the provided transport, store, and refresh endpoint.
	pub fn new(
		transport: Arc<dyn ApiTransport>,
		store: Arc<dyn CredentialStore>,
		refresh_url: Url,
	) -> Self {
		Self {
			transport,
			store,
			refresh_url,
			flight: Mutex::default(),
			queue_capacity: AtomicUsize::new(Self::DEFAULT_QUEUE_CAPACITY),
			session: SessionSignal::new(),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Overrides the pending-queue bound (clamped to at least one waiter).
	pub fn with_queue_capacity(self, capacity: usize) -> Self {
		self.set_queue_capacity(capacity);

		self
	}

	/// Adjusts the pending-queue bound on a live coordinator (clamped to at least one
	/// waiter). Callers already parked are unaffected; the bound applies to arrivals.
	pub fn set_queue_capacity(&self, capacity: usize) {
		self.queue_capacity.store(capacity.max(1), Ordering::Relaxed);
	}

	/// Returns the pending-queue bound currently in effect.
	pub fn queue_capacity(&self) -> usize {
		self.queue_capacity.load(Ordering::Relaxed)
	}

	/// Subscribes to session-ended notifications.
	pub fn subscribe_session(&self) -> SessionWatch {
		self.session.subscribe()
	}

	/// Shared counters describing coordinator activity.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns the current refresh state.
	pub fn state(&self) -> RefreshState {
		self.flight.lock().state
	}

	/// Returns the number of callers currently parked behind the in-flight refresh.
	pub fn pending_callers(&self) -> usize {
		self.flight.lock().queue.len()
	}

	/// Resolves an authorization failure into a fresh access token.
	///
	/// Either starts the single refresh cycle or parks behind the one already in
	/// flight; parked callers resume in strict arrival order after the trigger.
	pub async fn fresh_access_token(&self) -> Result<TokenSecret> {
		let waiter = {
			let mut flight = self.flight.lock();

			match flight.state {
				RefreshState::Refreshing => {
					let capacity = self.queue_capacity();

					if flight.queue.len() >= capacity {
						return Err(Error::RefreshQueueFull { capacity });
					}

					let (tx, rx) = oneshot::channel();

					flight.queue.push_back(PendingRequest { tx });
					self.metrics.record_queued();

					Some(rx)
				},
				RefreshState::Idle => {
					flight.state = RefreshState::Refreshing;

					None
				},
			}
		};

		if let Some(rx) = waiter {
			return match rx.await {
				Ok(Ok(token)) => Ok(token),
				Ok(Err(err)) => Err(err.into()),
				Err(_) => Err(Error::RefreshFailed {
					reason: "refresh cycle was dropped before resolving queued callers".into(),
				}),
			};
		}

		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "fresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.run_cycle()).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Runs one full refresh cycle and settles every waiter that arrived meanwhile.
	async fn run_cycle(&self) -> Result<TokenSecret> {
		let mut guard = CycleGuard { coordinator: self, armed: true };
		let outcome = self.execute_refresh().await;

		if outcome.is_err() {
			// Unrecoverable cycle: the pair is gone before anyone is resumed.
			let _ = self.store.clear().await;
		}

		guard.armed = false;

		let drained = {
			let mut flight = self.flight.lock();

			flight.state = RefreshState::Idle;

			mem::take(&mut flight.queue)
		};

		match &outcome {
			Ok(pair) => {
				self.metrics.record_success();

				for waiter in drained {
					waiter.resume(Ok(pair.access.clone()));
				}
			},
			Err(err) => {
				self.metrics.record_failure();

				for waiter in drained {
					waiter.resume(Err(err.clone()));
				}

				let reason = match err {
					RefreshError::MissingRefreshToken => SessionEndReason::MissingRefreshToken,
					other => SessionEndReason::RefreshFailed { reason: other.to_string() },
				};

				self.session.end(reason);
			},
		}

		outcome.map(|pair| pair.access).map_err(Error::from)
	}

	/// Issues the one refresh call and rotates the stored pair on success.
	async fn execute_refresh(&self) -> Result<CredentialPair, RefreshError> {
		let refresh = self
			.store
			.load()
			.await
			.map_err(|e| RefreshError::Store { message: e.to_string() })?
			.map(|pair| pair.refresh)
			.ok_or(RefreshError::MissingRefreshToken)?;
		let request: HttpRequest = http::Request::builder()
			.method(Method::POST)
			.uri(self.refresh_url.as_str())
			.header(AUTHORIZATION, refresh.bearer())
			.body(Vec::new())
			.map_err(|e| RefreshError::Request { message: e.to_string() })?;
		let response = self
			.transport
			.send(request)
			.await
			.map_err(|e| RefreshError::Transport { message: e.to_string() })?;
		let status = response.status();

		if !status.is_success() {
			let message = classify::extract_message(response.body())
				.unwrap_or_else(|| "refresh token was not accepted".into());

			return Err(RefreshError::Rejected { status: status.as_u16(), message });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let tokens: AuthTokens = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| RefreshError::MalformedResponse { message: e.to_string() })?;
		let pair = CredentialPair::from(tokens);

		self.store
			.save(pair.clone())
			.await
			.map_err(|e| RefreshError::Store { message: e.to_string() })?;

		Ok(pair)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh_url", &self.refresh_url.as_str())
			.field("state", &self.state())
			.field("queue_capacity", &self.queue_capacity())
			.finish()
	}
}

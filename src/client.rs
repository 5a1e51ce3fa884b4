//! Task API client: request authentication, dispatch, and the retry-once loop.
//!
//! [`ApiClient`] attaches the current access token to every outbound request, sends
//! it through the configured transport, and classifies the completed attempt. A 401
//! on a first attempt hands control to the refresh coordinator; the request is then
//! replayed exactly once with the new token. A 401 on the replay surfaces as an
//! application error, which keeps a revoked account from looping through refreshes.

// crates.io
use http::{
	Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	classify::{self, Disposition},
	coordinator::{RefreshCoordinator, RefreshMetrics},
	credential::TokenSecret,
	error::ConfigError,
	http::{ApiTransport, HttpRequest, HttpResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionWatch,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

const REFRESH_PATH: &str = "/auth/refresh-token";

/// Async client for the task-management API.
///
/// The client owns the transport, the credential store, and the refresh coordinator;
/// all typed endpoint methods in [`crate::api`] dispatch through it. Cloning is cheap
/// and every clone shares the same coordinator, so the single-flight guarantee holds
/// across clones.
#[derive(Clone)]
pub struct ApiClient {
	transport: Arc<dyn ApiTransport>,
	store: Arc<dyn CredentialStore>,
	coordinator: Arc<RefreshCoordinator>,
	base_url: Url,
}
impl ApiClient {
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		base_url: Url,
		store: Arc<dyn CredentialStore>,
		transport: Arc<dyn ApiTransport>,
	) -> Result<Self> {
		let refresh_url = endpoint_url(&base_url, REFRESH_PATH)?;
		let coordinator =
			Arc::new(RefreshCoordinator::new(transport.clone(), store.clone(), refresh_url));

		Ok(Self { transport, store, coordinator, base_url })
	}

	/// Creates a client with a freshly-built reqwest transport.
	///
	/// Configure timeouts or TLS settings by building a [`ReqwestTransport`] yourself
	/// and passing it to [`ApiClient::with_transport`].
	#[cfg(feature = "reqwest")]
	pub fn new(base_url: Url, store: Arc<dyn CredentialStore>) -> Result<Self> {
		Self::with_transport(base_url, store, Arc::new(ReqwestTransport::default()))
	}

	/// Overrides the bound on callers parked behind an in-flight refresh.
	///
	/// The coordinator is adjusted in place, so existing session subscriptions and
	/// refresh metrics carry over; every clone of this client sees the new bound.
	pub fn with_queue_capacity(self, capacity: usize) -> Self {
		self.coordinator.set_queue_capacity(capacity);

		self
	}

	/// Subscribes to session-ended notifications.
	pub fn session(&self) -> SessionWatch {
		self.coordinator.subscribe_session()
	}

	/// Counters describing refresh coordinator activity.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}

	/// Credential store shared with the coordinator.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Base URL every endpoint path is joined onto.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Dispatches one API request through the authenticate/classify/replay loop.
	pub(crate) async fn dispatch(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<Vec<u8>>,
	) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch_inner(method, path, query, body)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn dispatch_inner(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<Vec<u8>>,
	) -> Result<HttpResponse> {
		let mut url = endpoint_url(&self.base_url, path)?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
		}

		let mut bearer = self.store.load().await?.map(|pair| pair.access);
		let mut retried = false;

		loop {
			let request = build_request(&method, &url, bearer.as_ref(), body.clone())?;
			// Transport errors are surfaced as-is; only authorization failures are
			// recovered here.
			let disposition = match self.transport.send(request).await {
				Ok(response) => classify::classify(response, retried),
				Err(err) => Disposition::Failed(err.into()),
			};

			if retried {
				let outcome = match &disposition {
					Disposition::Success(_) => FlowOutcome::Success,
					_ => FlowOutcome::Failure,
				};

				obs::record_flow_outcome(FlowKind::Replay, outcome);
			}

			match disposition {
				Disposition::Success(response) => return Ok(response),
				Disposition::AuthFailure => {
					retried = true;
					bearer = Some(self.coordinator.fresh_access_token().await?);
					obs::record_flow_outcome(FlowKind::Replay, FlowOutcome::Attempt);
				},
				Disposition::Failed(err) => return Err(err),
			}
		}
	}

	pub(crate) async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		decode(&self.dispatch(Method::GET, path, query, None).await?)
	}

	pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: Serialize,
		T: DeserializeOwned,
	{
		decode(&self.dispatch(Method::POST, path, &[], Some(encode(body)?)).await?)
	}

	pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: Serialize,
		T: DeserializeOwned,
	{
		decode(&self.dispatch(Method::PUT, path, &[], Some(encode(body)?)).await?)
	}

	pub(crate) async fn delete_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		decode(&self.dispatch(Method::DELETE, path, &[], None).await?)
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

/// Joins an endpoint path onto the base URL, preserving the base's own path segments.
fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
	let mut joined = base.as_str().trim_end_matches('/').to_string();

	joined.push('/');
	joined.push_str(path.trim_start_matches('/'));

	Url::parse(&joined)
		.map_err(|e| ConfigError::InvalidEndpoint { path: path.into(), source: e }.into())
}

fn build_request(
	method: &Method,
	url: &Url,
	bearer: Option<&TokenSecret>,
	body: Option<Vec<u8>>,
) -> Result<HttpRequest> {
	let mut builder = http::Request::builder().method(method.clone()).uri(url.as_str());

	if let Some(token) = bearer {
		builder = builder.header(AUTHORIZATION, token.bearer());
	}
	if body.is_some() {
		builder = builder.header(CONTENT_TYPE, "application/json");
	}

	builder.body(body.unwrap_or_default()).map_err(|e| ConfigError::from(e).into())
}

fn encode<B>(body: &B) -> Result<Vec<u8>>
where
	B: Serialize,
{
	serde_json::to_vec(body).map_err(|e| ConfigError::RequestEncode(e).into())
}

fn decode<T>(response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| ConfigError::ResponseDecode { source: e }.into())
}

#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
// self
use taskdeck_client::{
	_preludet::*,
	api::TaskFilter,
	credential::CredentialPair,
	session::SessionEndReason,
	store::{CredentialStore, MemoryStore},
};

const STALE_ACCESS: &str = "stale-access";
const STALE_REFRESH: &str = "stale-refresh";
const FRESH_ACCESS: &str = "fresh-access";
const FRESH_REFRESH: &str = "fresh-refresh";

fn tasks_envelope() -> &'static str {
	"{\"message\":\"ok\",\"data\":[]}"
}

fn fresh_pair_body() -> String {
	format!("{{\"access_token\":\"{FRESH_ACCESS}\",\"refresh_token\":\"{FRESH_REFRESH}\"}}")
}

async fn seed_stale_pair(store: &MemoryStore) {
	store
		.save(CredentialPair::new(STALE_ACCESS, STALE_REFRESH))
		.await
		.expect("Seeding the stale pair should succeed.");
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh_call() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(&server.base_url());

	seed_stale_pair(&store).await;

	let stale_hits = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/tasks")
				.header("authorization", format!("Bearer {STALE_ACCESS}"));
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"access token expired\"}");
		})
		.await;
	let fresh_hits = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/tasks")
				.header("authorization", format!("Bearer {FRESH_ACCESS}"));
			then.status(200).header("content-type", "application/json").body(tasks_envelope());
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh-token")
				.header("authorization", format!("Bearer {STALE_REFRESH}"));
			// Keep the cycle in flight long enough for every 401 to queue behind it.
			then.status(200)
				.header("content-type", "application/json")
				.body(fresh_pair_body())
				.delay(Duration::from_millis(200));
		})
		.await;
	let filter = TaskFilter::new();
	let (a, b, c, d) = tokio::join!(
		client.tasks(&filter),
		client.tasks(&filter),
		client.tasks(&filter),
		client.tasks(&filter),
	);

	for result in [a, b, c, d] {
		let tasks = result.expect("Every concurrent request should succeed after the refresh.");

		assert!(tasks.is_empty());
	}

	refresh.assert_calls_async(1).await;

	assert!(stale_hits.calls_async().await >= 1);
	assert!(fresh_hits.calls_async().await >= 1);
	assert_eq!(store.current(), Some(CredentialPair::new(FRESH_ACCESS, FRESH_REFRESH)));
	assert_eq!(client.refresh_metrics().attempts(), 1);
	assert_eq!(client.refresh_metrics().successes(), 1);
}

#[tokio::test]
async fn failed_refresh_fails_every_caller_and_ends_the_session_once() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(&server.base_url());

	seed_stale_pair(&store).await;

	let _protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/tasks");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"access token expired\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"refresh token expired\"}")
				.delay(Duration::from_millis(300));
		})
		.await;
	let session = client.session();
	let filter = TaskFilter::new();
	let first = {
		let client = client.clone();
		let filter = filter.clone();

		tokio::spawn(async move { client.tasks(&filter).await })
	};

	// Give the first request time to start the refresh cycle so the second queues
	// behind it instead of starting a cycle of its own.
	tokio::time::sleep(Duration::from_millis(100)).await;

	let second = client.tasks(&filter).await;
	let first = first.await.expect("First request task should not panic.");

	for result in [first, second] {
		let err = result.expect_err("Both requests should fail with the refresh error.");

		assert!(matches!(err, Error::RefreshFailed { .. }), "unexpected error: {err:?}");
		assert!(err.to_string().contains("refresh token expired"));
	}

	refresh.assert_calls_async(1).await;

	assert_eq!(session.state().ended_cycles, 1);
	assert_eq!(store.current(), None);
}

#[tokio::test]
async fn post_refresh_401_surfaces_as_application_error_without_a_second_refresh() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(&server.base_url());

	seed_stale_pair(&store).await;

	let _protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/tasks");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"account disabled\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body(fresh_pair_body());
		})
		.await;
	let err = client
		.tasks(&TaskFilter::new())
		.await
		.expect_err("A 401 on the replay should surface to the caller.");

	match err {
		Error::Api { status, message } => {
			assert_eq!(status, 401);
			assert_eq!(message, "account disabled");
		},
		other => panic!("Expected an application error, got {other:?}."),
	}

	refresh.assert_calls_async(1).await;

	// The successful refresh still rotated the stored pair.
	assert_eq!(store.current(), Some(CredentialPair::new(FRESH_ACCESS, FRESH_REFRESH)));
	assert_eq!(client.session().state().ended_cycles, 0);
}

#[tokio::test]
async fn missing_refresh_token_ends_the_session_without_calling_the_endpoint() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_test_client(&server.base_url());
	let _protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/tasks");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"unauthenticated\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body(fresh_pair_body());
		})
		.await;
	let mut session = client.session();
	let err = client
		.tasks(&TaskFilter::new())
		.await
		.expect_err("Request without any session should fail terminally.");

	assert!(matches!(err, Error::SessionEnded));

	refresh.assert_calls_async(0).await;

	let state = session.ended().await;

	assert_eq!(state.ended_cycles, 1);
	assert_eq!(state.last_reason, Some(SessionEndReason::MissingRefreshToken));
}

#[tokio::test]
async fn queue_capacity_override_keeps_existing_session_subscriptions() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(&server.base_url());

	seed_stale_pair(&store).await;

	let _protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/tasks");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"access token expired\"}");
		})
		.await;
	let _refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"refresh token expired\"}");
		})
		.await;
	// Subscribe first, then adjust the bound; the subscription must survive.
	let mut session = client.session();
	let client = client.with_queue_capacity(8);
	let err = client
		.tasks(&TaskFilter::new())
		.await
		.expect_err("Request should fail through the failed refresh.");

	assert!(matches!(err, Error::RefreshFailed { .. }), "unexpected error: {err:?}");

	let state = session.ended().await;

	assert_eq!(state.ended_cycles, 1);
	assert_eq!(client.refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn refreshed_token_is_attached_to_subsequent_requests() {
	let server = MockServer::start_async().await;
	let (client, store) = build_test_client(&server.base_url());

	seed_stale_pair(&store).await;

	let _stale = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/tasks")
				.header("authorization", format!("Bearer {STALE_ACCESS}"));
			then.status(401).body("");
		})
		.await;
	let fresh_hits = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/tasks")
				.header("authorization", format!("Bearer {FRESH_ACCESS}"));
			then.status(200).header("content-type", "application/json").body(tasks_envelope());
		})
		.await;
	let _refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body(fresh_pair_body());
		})
		.await;
	let filter = TaskFilter::new();

	client.tasks(&filter).await.expect("First request should recover through refresh.");
	client.tasks(&filter).await.expect("Second request should use the new token directly.");

	// One replay plus one direct hit, both with the rotated access token.
	fresh_hits.assert_calls_async(2).await;
}

// crates.io
use httpmock::prelude::*;
use tokio::time::Instant;
// self
use rt_fleet::{
	_preludet::*,
	config::{BatchPacing, EngineConfig},
	flows::Fleet,
	record::NewRecord,
	store::MemoryStore,
};

async fn mock_provider(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("\"refresh_token\":\"rt-bad\"");
			then.status(400).body(r#"{"error":{"code":"invalid_grant","message":"expired"}}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_excludes("rt-bad");
			then.status(200).body(r#"{"access_token":"at-next","refresh_token":"rt-next"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/backend-api/me");
			then.status(200).body(r#"{"email":"ops@example.com"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/backend-api/accounts/check");
			then.status(200).body(r#"{"accounts":{}}"#);
		})
		.await;
}

async fn seed(fleet: &Fleet, biz_id: &str, token: &str, enabled: bool) -> i64 {
	fleet
		.create(NewRecord::new(token).biz_id(biz_id).enabled(enabled))
		.await
		.expect("Seeding a record should succeed.")
		.id
}

#[tokio::test]
async fn batch_reports_every_id_and_isolates_failures() {
	let server = MockServer::start_async().await;
	let (fleet, _) = build_test_fleet(&server.base_url());

	mock_provider(&server).await;

	let first = seed(&fleet, "first", "rt-1", true).await;
	let bad = seed(&fleet, "bad", "rt-bad", true).await;
	let last = seed(&fleet, "last", "rt-3", true).await;
	let report = fleet
		.batch_refresh(&[first, bad, 999, last])
		.await
		.expect("Batch refresh should complete.");

	assert_eq!(report.results.len(), 4);
	assert_eq!(report.succeeded, 2);
	assert_eq!(report.failed, 2);

	let ids: Vec<_> = report.results.iter().map(|item| item.id).collect();

	assert_eq!(ids, [first, bad, 999, last]);
	assert!(report.results[0].success);
	assert_eq!(report.results[0].biz_id.as_deref(), Some("first"));
	assert!(!report.results[1].success);
	assert_eq!(report.results[1].biz_id.as_deref(), Some("bad"));
	assert!(report.results[1].message.contains("invalid_grant"));
	assert!(!report.results[2].success);
	assert_eq!(report.results[2].biz_id, None);
	assert!(report.results[3].success);

	let refreshed = fleet.get(last).await.expect("Refreshed record should load.");

	assert_eq!(refreshed.refresh_token.expose(), "rt-next");
	assert_eq!(refreshed.email, "ops@example.com");

	let failed = fleet.get(bad).await.expect("Failed record should load.");

	assert_eq!(failed.refresh_token.expose(), "rt-bad");
}

#[tokio::test]
async fn refresh_all_only_touches_enabled_records() {
	let server = MockServer::start_async().await;
	let (fleet, _) = build_test_fleet(&server.base_url());

	mock_provider(&server).await;

	let enabled = seed(&fleet, "on", "rt-on", true).await;
	let disabled = seed(&fleet, "off", "rt-off", false).await;
	let report = fleet.refresh_all().await.expect("Refresh-all should complete.");

	assert_eq!(report.results.len(), 1);
	assert_eq!(report.results[0].id, enabled);
	assert_eq!(
		fleet.get(disabled).await.expect("Disabled record should load.").refresh_token.expose(),
		"rt-off"
	);
}

#[tokio::test]
async fn refresh_all_with_nothing_enabled_is_empty() {
	let server = MockServer::start_async().await;
	let (fleet, _) = build_test_fleet(&server.base_url());

	seed(&fleet, "off", "rt-off", false).await;

	let report = fleet.refresh_all().await.expect("Refresh-all should complete.");

	assert_eq!(report.results.len(), 0);
	assert_eq!(report.succeeded + report.failed, 0);
}

fn paced_fleet() -> Fleet {
	let config =
		EngineConfig { pacing: BatchPacing::default(), ..test_config("http://127.0.0.1:9") };

	Fleet::new(Arc::new(MemoryStore::default()), config).expect("Paced fleet should build.")
}

// Missing ids fail without touching the network, so only pacing advances the clock.
#[tokio::test(start_paused = true)]
async fn batch_sleeps_between_attempts_but_not_after_the_last() {
	let fleet = paced_fleet();
	let ids = [101, 102, 103, 104];
	let started = Instant::now();
	let report = fleet.batch_refresh(&ids).await.expect("Batch refresh should complete.");
	let elapsed = started.elapsed().as_secs();

	assert_eq!(report.failed, ids.len());
	assert!((3..=9).contains(&elapsed), "Unexpected pacing for four ids: {elapsed}s.");

	let started = Instant::now();

	fleet.batch_refresh(&[105]).await.expect("Single-id batch should complete.");

	assert_eq!(started.elapsed().as_secs(), 0, "A single-id batch must not sleep.");
}

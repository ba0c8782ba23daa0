// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use rt_fleet::{
	_preludet::*,
	flows::{Fleet, RefreshOptions},
	pool::{ClientIdPool, ProxyPool},
	provider::FALLBACK_CLIENT_ID,
	record::{NewRecord, TokenRecord},
	store::{MemoryStore, Page, RecordFilter, RecordPage, RecordStore, StoreFuture},
};

const OFFLINE: &str = "http://127.0.0.1:9";

/// Memory store whose writes take long enough for other flows to interleave.
#[derive(Default)]
struct SlowWrites {
	inner: MemoryStore,
}
impl RecordStore for SlowWrites {
	fn get_by_id(&self, id: i64) -> StoreFuture<'_, Option<TokenRecord>> {
		self.inner.get_by_id(id)
	}

	fn get_by_biz_id<'a>(&'a self, biz_id: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		self.inner.get_by_biz_id(biz_id)
	}

	fn get_by_token<'a>(
		&'a self,
		refresh_token: &'a str,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		self.inner.get_by_token(refresh_token)
	}

	fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		self.inner.get_by_email(email)
	}

	fn list<'a>(&'a self, filter: &'a RecordFilter, page: Page) -> StoreFuture<'a, RecordPage> {
		self.inner.list(filter, page)
	}

	fn get_by_ids<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<TokenRecord>> {
		self.inner.get_by_ids(ids)
	}

	fn create(&self, draft: NewRecord) -> StoreFuture<'_, TokenRecord> {
		self.inner.create(draft)
	}

	fn update(&self, record: TokenRecord) -> StoreFuture<'_, TokenRecord> {
		Box::pin(async move {
			tokio::time::sleep(StdDuration::from_millis(200)).await;

			self.inner.update(record).await
		})
	}

	fn delete(&self, id: i64) -> StoreFuture<'_, bool> {
		self.inner.delete(id)
	}
}

async fn seed(store: &dyn RecordStore, token: &str, proxy: &str, client_id: &str) -> i64 {
	store
		.create(NewRecord::new(token).proxy(proxy).client_id(client_id))
		.await
		.expect("Seeding a record should succeed.")
		.id
}

async fn load(store: &dyn RecordStore, id: i64) -> TokenRecord {
	store
		.get_by_id(id)
		.await
		.expect("Store lookup should succeed.")
		.expect("Record should exist.")
}

#[tokio::test]
async fn records_outside_the_pools_are_reassigned_once() {
	let (fleet, store) = build_test_fleet(OFFLINE);
	let inside = seed(store.as_ref(), "rt-in", "p1", "c1").await;
	let outside = seed(store.as_ref(), "rt-out", "p3", "c-gone").await;
	let proxies = ProxyPool::new(["p1", "p2"]);
	let client_ids = ClientIdPool::new(["c1", "c2"]);
	let untouched = load(store.as_ref(), inside).await;
	let report =
		fleet.reconcile_pools(&proxies, &client_ids).await.expect("Reconciliation should run.");

	assert_eq!(report.scanned, 2);
	assert_eq!(report.updated, 1);
	assert_eq!(report.failed, 0);
	assert_eq!(load(store.as_ref(), inside).await, untouched);

	let moved = load(store.as_ref(), outside).await;

	assert!(proxies.contains(&moved.proxy), "Unexpected proxy {}.", moved.proxy);
	assert!(client_ids.contains(&moved.client_id), "Unexpected client id {}.", moved.client_id);

	let again =
		fleet.reconcile_pools(&proxies, &client_ids).await.expect("Reconciliation should run.");

	assert_eq!(again.updated, 0);
	assert_eq!(load(store.as_ref(), outside).await, moved);
}

#[tokio::test]
async fn empty_proxy_pool_clears_assigned_proxies() {
	let (fleet, store) = build_test_fleet(OFFLINE);
	let proxied =
		seed(store.as_ref(), "rt-1", "socks5://10.0.0.9:1080", FALLBACK_CLIENT_ID).await;
	let direct = seed(store.as_ref(), "rt-2", "", FALLBACK_CLIENT_ID).await;
	let report = fleet
		.reconcile_pools(&ProxyPool::default(), &ClientIdPool::default())
		.await
		.expect("Reconciliation should run.");

	assert_eq!(report.updated, 1);
	assert!(load(store.as_ref(), proxied).await.proxy.is_empty());
	assert!(load(store.as_ref(), direct).await.proxy.is_empty());
}

#[tokio::test]
async fn empty_client_pool_falls_back_to_the_built_in_identifier() {
	let (fleet, store) = build_test_fleet(OFFLINE);
	let id = seed(store.as_ref(), "rt-1", "", "c-old").await;
	let client_ids =
		ClientIdPool::parse("[]").expect("An empty JSON list should parse as the fallback pool.");

	assert_eq!(client_ids.members(), [FALLBACK_CLIENT_ID.to_owned()]);

	fleet
		.reconcile_pools(&ProxyPool::default(), &client_ids)
		.await
		.expect("Reconciliation should run.");

	assert_eq!(load(store.as_ref(), id).await.client_id, FALLBACK_CLIENT_ID);
}

#[tokio::test]
async fn reconciliation_never_reverts_a_concurrent_rotation() {
	let server = MockServer::start_async().await;
	let store = Arc::new(SlowWrites::default());
	let fleet = Fleet::new(store.clone(), test_config(&server.base_url()))
		.expect("Fleet should build over the slow store.");
	// Listed newest first, so the pass reaches `rotating` after the other write.
	let rotating = seed(store.as_ref(), "rt-1", "", "c-old").await;
	let other = seed(store.as_ref(), "rt-2", "", "c-old").await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("\"refresh_token\":\"rt-1\"");
			then.status(200).body(r#"{"access_token":"at-new","refresh_token":"rt-new"}"#);
		})
		.await;

	let client_ids = ClientIdPool::new(["c-new"]);
	let proxies = ProxyPool::default();
	let (report, refreshed) = tokio::join!(
		fleet.reconcile_pools(&proxies, &client_ids),
		fleet.refresh(rotating, RefreshOptions::exchange_only()),
	);
	let report = report.expect("Reconciliation should run.");
	let refreshed = refreshed.expect("Refresh should succeed.");

	assert_eq!(report.updated, 2);
	assert_eq!(refreshed.refresh_token.expose(), "rt-new");

	let stored = load(store.as_ref(), rotating).await;

	assert_eq!(stored.refresh_token.expose(), "rt-new");
	assert_eq!(stored.previous_refresh_token.as_ref().map(|t| t.expose()), Some("rt-1"));
	assert_eq!(stored.client_id, "c-new");
	assert_eq!(load(store.as_ref(), other).await.client_id, "c-new");
}

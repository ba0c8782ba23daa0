//! Imports a few refresh tokens, assigns them to a proxy pool, and rotates them in one paced
//! batch against a mock identity provider.

// std
use std::collections::BTreeMap;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use rt_fleet::{
	config::{BatchPacing, EngineConfig},
	engine::Engine,
	pool::PROXY_LIST_KEY,
	provider::ProviderEndpoints,
	record::RecordPatch,
	store::{Page, RecordFilter},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let tokens = ["rt-demo-1", "rt-demo-2", "rt-demo-1"].map(String::from);
	let mut token_mocks = Vec::new();

	// The provider rotates every token into a distinct successor.
	for (i, token) in tokens[..2].iter().enumerate() {
		let grant = serde_json::json!({
			"access_token": format!("demo-access-{i}"),
			"refresh_token": format!("{token}-rotated"),
			"expires_in": 864000,
		})
		.to_string();
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/oauth/token")
					.body_includes(format!("\"refresh_token\":\"{token}\""));
				then.status(200).header("content-type", "application/json").body(grant);
			})
			.await;

		token_mocks.push(mock);
	}

	server
		.mock_async(|when, then| {
			when.method(GET).path("/backend-api/me");
			then.status(200).body("{\"email\":\"demo@example.com\",\"name\":\"Demo\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/backend-api/accounts/check");
			then.status(200)
				.body("{\"accounts\":{\"acc\":{\"account\":{\"plan_type\":\"plus\"}}}}");
		})
		.await;

	let config = EngineConfig {
		endpoints: ProviderEndpoints {
			token: Url::parse(&server.url("/oauth/token"))?,
			user_info: Url::parse(&server.url("/backend-api/me"))?,
			account_check: Url::parse(&server.url("/backend-api/accounts/check"))?,
			..Default::default()
		},
		pacing: BatchPacing::between(0, 1),
		..Default::default()
	};
	let engine = Engine::in_memory(config)?;
	let fleet = engine.fleet();
	let imported = fleet.batch_import("demo", &tokens, &[]).await?;

	println!("Imported {} token(s), skipped {}.", imported.succeeded, imported.failed);

	let page = fleet.list(&RecordFilter::default(), Page::all()).await?;

	for record in &page.records {
		fleet.update(record.id, RecordPatch { enabled: Some(true), ..Default::default() }).await?;
	}

	// Direct connections only; the mock server is local.
	engine
		.settings()
		.save_system_configs(BTreeMap::from([(PROXY_LIST_KEY.to_owned(), "[]".to_owned())]))
		.await?;

	let report = fleet.refresh_all().await?;

	for item in &report.results {
		println!(
			"{} ({}): {}",
			item.id,
			item.biz_id.as_deref().unwrap_or("-"),
			if item.success { "rotated" } else { item.message.as_str() }
		);
	}

	for mock in &token_mocks {
		mock.assert_calls_async(1).await;
	}
	engine.shutdown();

	Ok(())
}

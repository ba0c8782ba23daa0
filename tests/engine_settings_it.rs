// self
use rt_fleet::{
	_preludet::*,
	engine::Engine,
	pool::{CLIENT_ID_LIST_KEY, PROXY_LIST_KEY},
	record::NewRecord,
	settings::{AUTO_REFRESH_ENABLED_KEY, AUTO_REFRESH_INTERVAL_KEY},
};

const BASE: &str = "http://127.0.0.1:9";

fn engine(schedule_enabled: bool, refresh_interval_days: u32) -> Engine {
	let config = rt_fleet::config::EngineConfig {
		schedule_enabled,
		refresh_interval_days,
		..test_config(BASE)
	};

	Engine::in_memory(config).expect("In-memory engine should build.")
}

fn configs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
	entries.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

#[tokio::test]
async fn saving_pools_reassigns_records_outside_them() {
	let engine = engine(false, 2);
	let fleet = engine.fleet();
	let record = fleet
		.create(NewRecord::new("rt-1").proxy("p3").client_id("c-old").enabled(false))
		.await
		.expect("Create should succeed.");

	engine
		.settings()
		.save_system_configs(configs(&[
			(PROXY_LIST_KEY, r#"["p1","p2"]"#),
			(CLIENT_ID_LIST_KEY, r#"["c-new"]"#),
		]))
		.await
		.expect("Saving settings should succeed.");

	let moved = fleet.get(record.id).await.expect("Record should load.");

	assert!(["p1", "p2"].contains(&moved.proxy.as_str()), "Unexpected proxy {}.", moved.proxy);
	assert_eq!(moved.client_id, "c-new");
	assert_eq!(
		engine.settings().proxy_list().await.expect("Proxy pool should load.").members(),
		["p1".to_owned(), "p2".to_owned()]
	);
}

#[tokio::test]
async fn saving_auto_refresh_keys_drives_the_scheduler() {
	let engine = engine(false, 2);

	engine
		.settings()
		.save_system_configs(configs(&[
			(AUTO_REFRESH_ENABLED_KEY, "true"),
			(AUTO_REFRESH_INTERVAL_KEY, "4"),
		]))
		.await
		.expect("Saving settings should succeed.");

	assert!(engine.scheduler().is_running());
	assert_eq!(engine.scheduler().interval_days(), 4);

	engine
		.settings()
		.save_system_configs(configs(&[(AUTO_REFRESH_ENABLED_KEY, "false")]))
		.await
		.expect("Saving settings should succeed.");

	assert!(!engine.scheduler().is_running());
	assert_eq!(
		engine.settings().get(AUTO_REFRESH_INTERVAL_KEY).await.expect("Key should load."),
		"4"
	);
}

#[tokio::test]
async fn resume_prefers_stored_settings_when_they_enable_refresh() {
	let engine = engine(true, 9);

	engine.settings().set(AUTO_REFRESH_ENABLED_KEY, "true").await.expect("Set should succeed.");
	engine.settings().set(AUTO_REFRESH_INTERVAL_KEY, "5").await.expect("Set should succeed.");
	engine.resume_schedule().await.expect("Resume should succeed.");

	assert!(engine.scheduler().is_running());
	assert_eq!(engine.scheduler().interval_days(), 5);

	engine.shutdown();

	assert!(!engine.scheduler().is_running());
}

#[tokio::test]
async fn resume_falls_back_to_the_file_configuration() {
	let engine = engine(true, 3);

	engine.settings().set(AUTO_REFRESH_ENABLED_KEY, "false").await.expect("Set should succeed.");
	engine.resume_schedule().await.expect("Resume should succeed.");

	assert!(engine.scheduler().is_running());
	assert_eq!(engine.scheduler().interval_days(), 3);

	engine.shutdown();
}

#[tokio::test]
async fn resume_leaves_the_schedule_off_when_nothing_enables_it() {
	let engine = engine(false, 2);

	engine.resume_schedule().await.expect("Resume should succeed.");

	assert!(!engine.scheduler().is_running());
}

#[tokio::test]
async fn file_backed_engine_keeps_settings_across_reopen() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("fleet.json");

	{
		let engine = Engine::open(test_config(BASE), &path).expect("File engine should open.");

		engine
			.settings()
			.save_system_configs(configs(&[(PROXY_LIST_KEY, r#"["http://10.0.0.1:3128"]"#)]))
			.await
			.expect("Saving settings should succeed.");
		engine
			.fleet()
			.create(NewRecord::new("rt-persist").biz_id("kept"))
			.await
			.expect("Create should succeed.");
	}

	let engine = Engine::open(test_config(BASE), &path).expect("File engine should reopen.");
	let record = engine.fleet().get_by_biz_id("kept").await.expect("Record should survive.");

	assert_eq!(record.refresh_token.expose(), "rt-persist");
	assert_eq!(
		engine.settings().proxy_list().await.expect("Proxy pool should load.").members(),
		["http://10.0.0.1:3128".to_owned()]
	);
}

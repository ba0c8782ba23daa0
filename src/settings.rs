//! Persisted system configuration and the side effects of changing it.
//!
//! Saving settings writes every submitted key in one batch. Afterwards, a changed proxy or
//! client-identifier pool triggers [`Fleet::reconcile_pools`], and changed auto-refresh keys are
//! forwarded to [`RefreshScheduler::update_from_config`]. Both follow-ups are best effort: the
//! settings are already stored when they run, so their errors are logged and swallowed.

// self
use crate::{
	_prelude::*,
	flows::Fleet,
	pool::{
		CLIENT_ID_LIST_KEY, ClientIdPool, PROXY_LIST_KEY, ProxyPool, ReconcileReport,
		parse_string_list,
	},
	provider::FALLBACK_CLIENT_ID,
	scheduler::RefreshScheduler,
	store::ConfigStore,
};

/// Settings key switching the recurring refresh on (`"true"`) or off.
pub const AUTO_REFRESH_ENABLED_KEY: &str = "auto_refresh_enabled";
/// Settings key holding the refresh interval in days.
pub const AUTO_REFRESH_INTERVAL_KEY: &str = "auto_refresh_interval";

/// Values reported for keys that were never stored.
pub const DEFAULT_SYSTEM_CONFIGS: [(&str, &str); 4] = [
	(PROXY_LIST_KEY, "[]"),
	(CLIENT_ID_LIST_KEY, "[]"),
	(AUTO_REFRESH_ENABLED_KEY, "false"),
	(AUTO_REFRESH_INTERVAL_KEY, "60"),
];

/// Reads and writes system settings, reconciling records and the scheduler on change.
#[derive(Clone)]
pub struct SettingsService {
	configs: Arc<dyn ConfigStore>,
	fleet: Arc<Fleet>,
	scheduler: Arc<RefreshScheduler>,
}
impl SettingsService {
	/// Creates a service over the settings store, the fleet it reconciles, and the scheduler.
	pub fn new(
		configs: Arc<dyn ConfigStore>,
		fleet: Arc<Fleet>,
		scheduler: Arc<RefreshScheduler>,
	) -> Self {
		Self { configs, fleet, scheduler }
	}

	/// Every stored setting, with defaults filled in for the well-known keys.
	pub async fn system_configs(&self) -> Result<BTreeMap<String, String>> {
		let mut configs = self.configs.get_all().await?;

		for (key, value) in DEFAULT_SYSTEM_CONFIGS {
			configs.entry(key.to_owned()).or_insert_with(|| value.to_owned());
		}

		Ok(configs)
	}

	/// Validates and stores `submitted`, then runs the follow-ups its changes call for.
	///
	/// Malformed pool JSON is rejected before anything is written. An empty client pool is
	/// stored as the single fallback identifier.
	pub async fn save_system_configs(&self, mut submitted: BTreeMap<String, String>) -> Result<()> {
		if let Some(raw) = submitted.get(PROXY_LIST_KEY) {
			parse_string_list(PROXY_LIST_KEY, raw)?;
		}
		let empty_client_pool = match submitted.get(CLIENT_ID_LIST_KEY) {
			Some(raw) => parse_string_list(CLIENT_ID_LIST_KEY, raw)?.is_empty(),
			None => false,
		};

		if empty_client_pool {
			tracing::warn!("Client-id pool is empty; storing the fallback identifier.");
			submitted.insert(CLIENT_ID_LIST_KEY.to_owned(), fallback_client_pool());
		}

		let before = self.system_configs().await?;

		self.configs.batch_set(submitted.clone()).await?;

		tracing::info!(keys = submitted.len(), "System settings saved.");

		let changed = |key: &str| submitted.get(key).is_some_and(|v| before.get(key) != Some(v));
		let effective = |key: &str| {
			submitted.get(key).or_else(|| before.get(key)).cloned().unwrap_or_default()
		};

		if changed(PROXY_LIST_KEY) || changed(CLIENT_ID_LIST_KEY) {
			tracing::info!(
				proxy_changed = changed(PROXY_LIST_KEY),
				client_id_changed = changed(CLIENT_ID_LIST_KEY),
				"Pools changed; reconciling records."
			);

			if let Err(e) =
				self.reconcile(&effective(PROXY_LIST_KEY), &effective(CLIENT_ID_LIST_KEY)).await
			{
				tracing::error!(error = %e, "Pool reconciliation failed after saving settings.");
			}
		}
		if changed(AUTO_REFRESH_ENABLED_KEY) || changed(AUTO_REFRESH_INTERVAL_KEY) {
			let enabled = effective(AUTO_REFRESH_ENABLED_KEY);
			let interval = effective(AUTO_REFRESH_INTERVAL_KEY);

			if let Err(e) = self.scheduler.update_from_config(&enabled, &interval) {
				tracing::error!(error = %e, "Failed to apply the refresh schedule.");
			}
		}

		Ok(())
	}

	/// Stored proxy pool; an unset value is an empty pool.
	pub async fn proxy_list(&self) -> Result<ProxyPool> {
		let raw = self.configs.get_by_key(PROXY_LIST_KEY).await?.unwrap_or_default();

		Ok(ProxyPool::parse(&raw)?)
	}

	/// Stored client-identifier pool, falling back to the built-in identifier.
	pub async fn client_id_list(&self) -> Result<ClientIdPool> {
		let raw = self.configs.get_by_key(CLIENT_ID_LIST_KEY).await?.unwrap_or_default();

		Ok(ClientIdPool::parse(&raw)?)
	}

	/// Raw stored value of `key`; an unset key reads as empty text.
	pub async fn get(&self, key: &str) -> Result<String> {
		Ok(self.configs.get_by_key(key).await?.unwrap_or_default())
	}

	/// Stores one value without triggering any follow-up.
	pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
		Ok(self.configs.set(key.into(), value.into()).await?)
	}

	async fn reconcile(&self, proxy_raw: &str, client_raw: &str) -> Result<ReconcileReport> {
		let proxies = ProxyPool::parse(proxy_raw)?;
		let client_ids = ClientIdPool::parse(client_raw)?;

		self.fleet.reconcile_pools(&proxies, &client_ids).await
	}
}
impl Debug for SettingsService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SettingsService").field("scheduler", &self.scheduler).finish()
	}
}

fn fallback_client_pool() -> String {
	serde_json::to_string(&[FALLBACK_CLIENT_ID]).unwrap_or_else(|_| "[]".into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::EngineConfig,
		flows::BatchRefreshReport,
		scheduler::{FleetRefresher, RefreshAllFuture},
		store::MemoryStore,
	};

	struct Idle;
	impl FleetRefresher for Idle {
		fn refresh_all(&self) -> RefreshAllFuture<'_> {
			Box::pin(async { Ok(BatchRefreshReport::default()) })
		}
	}

	fn service() -> (SettingsService, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let fleet = Fleet::new(store.clone(), EngineConfig::default())
			.expect("Default configuration should build a fleet.");
		let scheduler = Arc::new(RefreshScheduler::new(Arc::new(Idle), 2));

		(SettingsService::new(store.clone(), Arc::new(fleet), scheduler), store)
	}

	#[tokio::test]
	async fn defaults_fill_unset_keys() {
		let (settings, _) = service();

		settings.set("custom", "1").await.expect("Setting a key should succeed.");

		let configs = settings.system_configs().await.expect("Settings should load.");

		assert_eq!(configs.get("custom").map(String::as_str), Some("1"));
		assert_eq!(configs.get(AUTO_REFRESH_INTERVAL_KEY).map(String::as_str), Some("60"));
		assert_eq!(configs.get(PROXY_LIST_KEY).map(String::as_str), Some("[]"));
	}

	#[tokio::test]
	async fn malformed_pool_is_rejected_before_writing() {
		let (settings, store) = service();
		let submitted = BTreeMap::from([
			(PROXY_LIST_KEY.to_owned(), "not json".to_owned()),
			(AUTO_REFRESH_INTERVAL_KEY.to_owned(), "5".to_owned()),
		]);
		let err = settings
			.save_system_configs(submitted)
			.await
			.expect_err("Malformed pool JSON should be rejected.");

		assert!(matches!(
			err,
			Error::Config(crate::error::ConfigError::InvalidPool { key: PROXY_LIST_KEY, .. })
		));
		assert!(store.get_all().await.expect("Settings should load.").is_empty());
	}

	#[tokio::test]
	async fn empty_client_pool_is_stored_as_the_fallback() {
		let (settings, _) = service();
		let submitted = BTreeMap::from([(CLIENT_ID_LIST_KEY.to_owned(), "[]".to_owned())]);

		settings.save_system_configs(submitted).await.expect("Saving settings should succeed.");

		let stored = settings.get(CLIENT_ID_LIST_KEY).await.expect("Key should load.");

		assert_eq!(stored, format!("[\"{FALLBACK_CLIENT_ID}\"]"));
		assert_eq!(
			settings.client_id_list().await.expect("Pool should parse.").members(),
			[FALLBACK_CLIENT_ID.to_owned()]
		);
	}
}

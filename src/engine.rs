//! Composition root wiring stores, fleet, scheduler, and settings together.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	config::EngineConfig,
	error::ConfigError,
	flows::Fleet,
	scheduler::{FleetRefresher, RefreshScheduler},
	settings::{AUTO_REFRESH_ENABLED_KEY, AUTO_REFRESH_INTERVAL_KEY, SettingsService},
	store::{ConfigStore, FileStore, MemoryStore, RecordStore},
};

/// A fully wired refresh engine.
///
/// Dropping the engine does not stop a running schedule; call [`Engine::shutdown`].
#[derive(Debug)]
pub struct Engine {
	fleet: Arc<Fleet>,
	scheduler: Arc<RefreshScheduler>,
	settings: SettingsService,
}
impl Engine {
	/// Builds an engine over caller-provided stores.
	pub fn new(
		config: EngineConfig,
		records: Arc<dyn RecordStore>,
		configs: Arc<dyn ConfigStore>,
	) -> Result<Self> {
		let interval_days = config.refresh_interval_days;
		let fleet = Arc::new(Fleet::new(records, config)?);
		let refresher: Arc<dyn FleetRefresher> = fleet.clone();
		let scheduler = Arc::new(RefreshScheduler::new(refresher, interval_days));
		let settings = SettingsService::new(configs, fleet.clone(), scheduler.clone());

		Ok(Self { fleet, scheduler, settings })
	}

	/// Builds an engine whose records and settings live in memory.
	pub fn in_memory(config: EngineConfig) -> Result<Self> {
		let store = Arc::new(MemoryStore::default());

		Self::new(config, store.clone(), store)
	}

	/// Builds an engine persisting records and settings to a JSON snapshot at `path`.
	pub fn open(config: EngineConfig, path: impl Into<PathBuf>) -> Result<Self> {
		let store = Arc::new(FileStore::open(path)?);

		Self::new(config, store.clone(), store)
	}

	/// Record operations.
	pub fn fleet(&self) -> &Arc<Fleet> {
		&self.fleet
	}

	/// The recurring refresh timer.
	pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
		&self.scheduler
	}

	/// System settings.
	pub fn settings(&self) -> &SettingsService {
		&self.settings
	}

	/// Applies the boot-time schedule decision.
	///
	/// Stored settings win when they enable the schedule; otherwise the file configuration
	/// decides. When the stored settings cannot be read, the file configuration is used.
	pub async fn resume_schedule(&self) -> Result<(), ConfigError> {
		let config = &self.fleet.config;

		match self.settings.system_configs().await {
			Ok(stored) => {
				let enabled = stored.get(AUTO_REFRESH_ENABLED_KEY).map(String::as_str);

				if enabled == Some("true") {
					let interval = stored
						.get(AUTO_REFRESH_INTERVAL_KEY)
						.map(String::as_str)
						.unwrap_or_default();

					tracing::info!(interval, "Resuming refresh schedule from stored settings.");

					return self.scheduler.update_from_config("true", interval);
				}
			},
			Err(e) => tracing::error!(
				error = %e,
				"Failed to read stored settings; falling back to the file configuration."
			),
		}

		if config.schedule_enabled {
			tracing::info!(
				interval_days = config.refresh_interval_days,
				"Resuming refresh schedule from the file configuration."
			);

			return self.scheduler.start(config.refresh_interval_days);
		}

		tracing::info!("Refresh schedule stays disabled.");

		Ok(())
	}

	/// Stops the schedule; in-flight passes finish on their own.
	pub fn shutdown(&self) {
		self.scheduler.stop();
	}
}

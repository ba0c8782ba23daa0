//! File-level engine configuration.
//!
//! These values are fixed for the lifetime of an [`Engine`](crate::engine::Engine). Operator
//! settings that change at runtime live in the config store and are handled by
//! [`SettingsService`](crate::settings::SettingsService).

// std
use std::{fs, path::Path, time::Duration as StdDuration};
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	provider::{FALLBACK_CLIENT_ID, ProviderEndpoints},
};

/// Refresh interval used when neither file nor store provides a usable one.
pub const DEFAULT_REFRESH_INTERVAL_DAYS: u32 = 2;

/// Engine configuration loaded from JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Provider endpoints.
	pub endpoints: ProviderEndpoints,
	/// Client identifier used when a record has none.
	pub default_client_id: String,
	/// Proxy assigned to new records that do not name one.
	pub default_proxy: String,
	/// Interval used when the schedule is resumed from this file.
	pub refresh_interval_days: u32,
	/// Whether to start the schedule at boot when the store does not enable it.
	pub schedule_enabled: bool,
	/// Timeout for the token exchange, in seconds.
	pub exchange_timeout_secs: u64,
	/// Timeout for each enrichment call, in seconds.
	pub enrichment_timeout_secs: u64,
	/// Delay inserted between batch refreshes.
	pub pacing: BatchPacing,
}
impl EngineConfig {
	/// Parses configuration from JSON text; missing fields keep their defaults.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::SettingsParse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Reads and parses configuration from a JSON file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::SettingsIo {
			path: path.display().to_string(),
			source,
		})?;

		Self::from_json_str(&raw)
	}

	/// Checks cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.refresh_interval_days == 0 {
			return Err(ConfigError::InvalidInterval { days: 0 });
		}

		self.pacing.validate()
	}

	/// Client identifier to fall back on, never empty.
	pub fn effective_client_id(&self) -> &str {
		if self.default_client_id.trim().is_empty() {
			FALLBACK_CLIENT_ID
		} else {
			&self.default_client_id
		}
	}
}
impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			endpoints: ProviderEndpoints::default(),
			default_client_id: FALLBACK_CLIENT_ID.into(),
			default_proxy: String::new(),
			refresh_interval_days: DEFAULT_REFRESH_INTERVAL_DAYS,
			schedule_enabled: false,
			exchange_timeout_secs: 10,
			enrichment_timeout_secs: 30,
			pacing: BatchPacing::default(),
		}
	}
}

/// Inclusive range of whole seconds slept between consecutive batch refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPacing {
	/// Lower bound.
	pub min_secs: u64,
	/// Upper bound.
	pub max_secs: u64,
}
impl BatchPacing {
	/// Disables pacing entirely.
	pub const fn none() -> Self {
		Self { min_secs: 0, max_secs: 0 }
	}

	/// Fixed range constructor.
	pub const fn between(min_secs: u64, max_secs: u64) -> Self {
		Self { min_secs, max_secs }
	}

	/// Rejects inverted ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.min_secs > self.max_secs {
			return Err(ConfigError::InvalidPacing {
				min_secs: self.min_secs,
				max_secs: self.max_secs,
			});
		}

		Ok(())
	}

	/// Draws the next delay uniformly from the range.
	pub fn next_delay(&self) -> StdDuration {
		if self.max_secs == 0 || self.min_secs >= self.max_secs {
			return StdDuration::from_secs(self.min_secs.min(self.max_secs));
		}

		StdDuration::from_secs(rand::rng().random_range(self.min_secs..=self.max_secs))
	}
}
impl Default for BatchPacing {
	fn default() -> Self {
		Self { min_secs: 1, max_secs: 3 }
	}
}

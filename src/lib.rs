//! Refresh-token fleet engine: rotate many provider refresh tokens behind per-record proxies,
//! keep records aligned with operator-configured pools, and drive fleet-wide refresh from a
//! reconfigurable scheduler.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod pool;
pub mod provider;
pub mod record;
pub mod scheduler;
pub mod settings;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::{BatchPacing, EngineConfig},
		flows::Fleet,
		provider::ProviderEndpoints,
		store::{MemoryStore, RecordStore},
	};

	/// Endpoints that route every provider call to a mock server rooted at `base`.
	pub fn mock_endpoints(base: &str) -> ProviderEndpoints {
		let join = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Mock endpoint URL should parse.")
		};

		ProviderEndpoints {
			token: join("/oauth/token"),
			user_info: join("/backend-api/me"),
			account_check: join("/backend-api/accounts/check"),
			redirect_uri: crate::provider::DEFAULT_REDIRECT_URI.into(),
		}
	}

	/// Engine configuration pointed at a mock server with pacing disabled.
	pub fn test_config(base: &str) -> EngineConfig {
		EngineConfig {
			endpoints: mock_endpoints(base),
			pacing: BatchPacing::none(),
			..EngineConfig::default()
		}
	}

	/// Builds a [`Fleet`] backed by a fresh [`MemoryStore`].
	pub fn build_test_fleet(base: &str) -> (Arc<Fleet>, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let records: Arc<dyn RecordStore> = store.clone();
		let fleet = Fleet::new(records, test_config(base))
			.expect("Test fleet should build with the default transport.");

		(Arc::new(fleet), store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tempfile as _};

//! Record-level orchestration: exchange, enrichment, batch refresh, and record management.

pub mod batch;
pub mod enrich;
pub mod records;
pub mod refresh;

pub use batch::*;
pub use records::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	client::ProtocolClient,
	config::EngineConfig,
	record::TokenRecord,
	store::RecordStore,
};

/// Coordinates every per-record operation against one provider.
///
/// The fleet owns the protocol client, the record store, and the per-record guards that keep a
/// manual refresh and a scheduled pass from spending the same refresh token twice.
pub struct Fleet {
	/// Record persistence.
	pub records: Arc<dyn RecordStore>,
	/// Client used for every provider call.
	pub client: ProtocolClient,
	/// Engine configuration the fleet was built with.
	pub config: EngineConfig,
	/// Shared counters for exchange outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}
impl Fleet {
	/// Creates a fleet over the provided record store.
	pub fn new(records: Arc<dyn RecordStore>, config: EngineConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			client: ProtocolClient::from_config(&config),
			records,
			config,
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		})
	}

	/// Guard serializing work on one record.
	pub(crate) fn record_guard(&self, id: i64) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the guard of a deleted record.
	pub(crate) fn forget_guard(&self, id: i64) {
		self.flow_guards.lock().remove(&id);
	}

	/// Loads a record or fails with [`Error::NotFound`].
	pub(crate) async fn load(&self, id: i64) -> Result<TokenRecord> {
		self.records.get_by_id(id).await?.ok_or_else(|| Error::record_not_found(id))
	}
}
impl Debug for Fleet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Fleet")
			.field("client", &self.client)
			.field("config", &self.config)
			.field("guards", &self.flow_guards.lock().len())
			.finish()
	}
}

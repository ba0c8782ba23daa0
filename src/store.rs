//! Storage contracts for token records and system settings, plus the built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use time::Date;
// self
use crate::{
	_prelude::*,
	record::{NewRecord, TokenRecord},
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for token records.
///
/// Lookups that find nothing return `Ok(None)`; only backend failures surface as errors.
pub trait RecordStore
where
	Self: Send + Sync,
{
	/// Fetches a record by primary id.
	fn get_by_id(&self, id: i64) -> StoreFuture<'_, Option<TokenRecord>>;

	/// Fetches a record by business id.
	fn get_by_biz_id<'a>(&'a self, biz_id: &'a str) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Fetches the record currently holding `refresh_token`.
	fn get_by_token<'a>(&'a self, refresh_token: &'a str)
	-> StoreFuture<'a, Option<TokenRecord>>;

	/// Fetches the first record whose email matches exactly.
	fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Lists records matching `filter`, newest id first.
	fn list<'a>(&'a self, filter: &'a RecordFilter, page: Page) -> StoreFuture<'a, RecordPage>;

	/// Fetches every record whose id appears in `ids`; unknown ids are skipped.
	fn get_by_ids<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<TokenRecord>>;

	/// Inserts a new record, assigning its id and timestamps.
	fn create(&self, draft: NewRecord) -> StoreFuture<'_, TokenRecord>;

	/// Replaces the record with the same id, stamping `updated_at`.
	fn update(&self, record: TokenRecord) -> StoreFuture<'_, TokenRecord>;

	/// Hard-deletes a record; returns whether it existed.
	fn delete(&self, id: i64) -> StoreFuture<'_, bool>;
}

/// Key-value persistence for system settings.
pub trait ConfigStore
where
	Self: Send + Sync,
{
	/// Reads one value.
	fn get_by_key<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Reads every stored value.
	fn get_all(&self) -> StoreFuture<'_, BTreeMap<String, String>>;

	/// Upserts one value.
	fn set(&self, key: String, value: String) -> StoreFuture<'_, ()>;

	/// Upserts every entry, or none of them.
	fn batch_set(&self, entries: BTreeMap<String, String>) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`RecordStore`] and [`ConfigStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A uniqueness constraint rejected the write.
	#[error("Constraint violated: {message}.")]
	Constraint {
		/// Which constraint was hit.
		message: String,
	},
}

/// Listing filter; every set field must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
	/// Substring of the business id.
	pub biz_id: Option<String>,
	/// Substring of the tag.
	pub tag: Option<String>,
	/// Substring of the email.
	pub email: Option<String>,
	/// Substring of the account type.
	pub account_type: Option<String>,
	/// Exact enabled flag.
	pub enabled: Option<bool>,
	/// Creation day (UTC).
	pub created_on: Option<Date>,
}
impl RecordFilter {
	/// Filter that only keeps enabled records.
	pub fn enabled_only() -> Self {
		Self { enabled: Some(true), ..Default::default() }
	}

	/// Whether `record` passes the filter.
	pub fn matches(&self, record: &TokenRecord) -> bool {
		fn contains(needle: &Option<String>, haystack: &str) -> bool {
			needle.as_deref().filter(|n| !n.is_empty()).is_none_or(|n| haystack.contains(n))
		}

		contains(&self.biz_id, &record.biz_id)
			&& contains(&self.tag, &record.tag)
			&& contains(&self.email, &record.email)
			&& contains(&self.account_type, &record.account_type)
			&& self.enabled.is_none_or(|e| e == record.enabled)
			&& self.created_on.is_none_or(|d| record.created_at.date() == d)
	}
}

/// One-based page selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
	/// Page number, starting at 1.
	pub number: u32,
	/// Page size; `0` means unbounded.
	pub size: u32,
}
impl Page {
	/// Selects every matching record.
	pub const fn all() -> Self {
		Self { number: 1, size: 0 }
	}

	/// Selects page `number` of `size` records.
	pub const fn new(number: u32, size: u32) -> Self {
		Self { number, size }
	}

	fn window(&self) -> (usize, Option<usize>) {
		if self.size == 0 {
			return (0, None);
		}

		let size = self.size as usize;

		(self.number.saturating_sub(1) as usize * size, Some(size))
	}
}
impl Default for Page {
	fn default() -> Self {
		Self { number: 1, size: 20 }
	}
}

/// Result of [`RecordStore::list`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
	/// Records on the requested page.
	pub records: Vec<TokenRecord>,
	/// Number of records matching the filter across all pages.
	pub total: u64,
}

/// Table contents shared by the bundled backends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
	next_id: i64,
	records: BTreeMap<i64, TokenRecord>,
	configs: BTreeMap<String, String>,
}
impl Tables {
	fn find(&self, predicate: impl Fn(&TokenRecord) -> bool) -> Option<TokenRecord> {
		self.records.values().find(|r| predicate(r)).cloned()
	}

	fn ensure_unique(&self, candidate: &TokenRecord) -> Result<(), StoreError> {
		for other in self.records.values().filter(|r| r.id != candidate.id) {
			if other.biz_id == candidate.biz_id {
				return Err(StoreError::Constraint {
					message: format!("biz_id `{}` is already in use", candidate.biz_id),
				});
			}
			if other.refresh_token == candidate.refresh_token {
				return Err(StoreError::Constraint {
					message: format!(
						"refresh token {} is already tracked",
						candidate.refresh_token.fingerprint()
					),
				});
			}
		}

		Ok(())
	}

	pub(crate) fn get_by_id(&self, id: i64) -> Option<TokenRecord> {
		self.records.get(&id).cloned()
	}

	pub(crate) fn get_by_biz_id(&self, biz_id: &str) -> Option<TokenRecord> {
		self.find(|r| r.biz_id == biz_id)
	}

	pub(crate) fn get_by_token(&self, refresh_token: &str) -> Option<TokenRecord> {
		self.find(|r| r.refresh_token.expose() == refresh_token)
	}

	pub(crate) fn get_by_email(&self, email: &str) -> Option<TokenRecord> {
		self.find(|r| !r.email.is_empty() && r.email == email)
	}

	pub(crate) fn list(&self, filter: &RecordFilter, page: Page) -> RecordPage {
		let matching: Vec<_> = self.records.values().rev().filter(|r| filter.matches(r)).collect();
		let total = matching.len() as u64;
		let (skip, take) = page.window();
		let records = matching
			.into_iter()
			.skip(skip)
			.take(take.unwrap_or(usize::MAX))
			.cloned()
			.collect();

		RecordPage { records, total }
	}

	pub(crate) fn get_by_ids(&self, ids: &[i64]) -> Vec<TokenRecord> {
		ids.iter().filter_map(|id| self.records.get(id)).cloned().collect()
	}

	pub(crate) fn create(
		&mut self,
		draft: NewRecord,
		now: OffsetDateTime,
	) -> Result<TokenRecord, StoreError> {
		let record = draft.into_record(self.next_id + 1, now);

		self.ensure_unique(&record)?;
		self.next_id = record.id;
		self.records.insert(record.id, record.clone());

		Ok(record)
	}

	pub(crate) fn update(
		&mut self,
		mut record: TokenRecord,
		now: OffsetDateTime,
	) -> Result<TokenRecord, StoreError> {
		self.ensure_unique(&record)?;

		record.updated_at = now;
		self.next_id = self.next_id.max(record.id);
		self.records.insert(record.id, record.clone());

		Ok(record)
	}

	pub(crate) fn delete(&mut self, id: i64) -> bool {
		self.records.remove(&id).is_some()
	}

	pub(crate) fn config(&self, key: &str) -> Option<String> {
		self.configs.get(key).cloned()
	}

	pub(crate) fn configs(&self) -> BTreeMap<String, String> {
		self.configs.clone()
	}

	pub(crate) fn set_configs(&mut self, entries: BTreeMap<String, String>) {
		self.configs.extend(entries);
	}
}

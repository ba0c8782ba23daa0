//! Thread-safe in-memory [`RecordStore`] + [`ConfigStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	record::{NewRecord, TokenRecord},
	store::{
		ConfigStore, Page, RecordFilter, RecordPage, RecordStore, StoreError, StoreFuture, Tables,
	},
};

type SharedTables = Arc<RwLock<Tables>>;

/// Storage backend that keeps records and settings in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedTables);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().records.len()
	}

	/// Whether the store holds no records.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn read_now<T>(tables: SharedTables, f: impl FnOnce(&Tables) -> T) -> T {
		f(&tables.read())
	}

	fn write_now<T>(
		tables: SharedTables,
		f: impl FnOnce(&mut Tables, OffsetDateTime) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		f(&mut tables.write(), OffsetDateTime::now_utc())
	}
}
impl RecordStore for MemoryStore {
	fn get_by_id(&self, id: i64) -> StoreFuture<'_, Option<TokenRecord>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.get_by_id(id))) })
	}

	fn get_by_biz_id<'a>(&'a self, biz_id: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.get_by_biz_id(biz_id))) })
	}

	fn get_by_token<'a>(
		&'a self,
		refresh_token: &'a str,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.get_by_token(refresh_token))) })
	}

	fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.get_by_email(email))) })
	}

	fn list<'a>(&'a self, filter: &'a RecordFilter, page: Page) -> StoreFuture<'a, RecordPage> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.list(filter, page))) })
	}

	fn get_by_ids<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<TokenRecord>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.get_by_ids(ids))) })
	}

	fn create(&self, draft: NewRecord) -> StoreFuture<'_, TokenRecord> {
		let tables = self.0.clone();

		Box::pin(async move { Self::write_now(tables, |t, now| t.create(draft, now)) })
	}

	fn update(&self, record: TokenRecord) -> StoreFuture<'_, TokenRecord> {
		let tables = self.0.clone();

		Box::pin(async move { Self::write_now(tables, |t, now| t.update(record, now)) })
	}

	fn delete(&self, id: i64) -> StoreFuture<'_, bool> {
		let tables = self.0.clone();

		Box::pin(async move { Self::write_now(tables, |t, _| Ok(t.delete(id))) })
	}
}
impl ConfigStore for MemoryStore {
	fn get_by_key<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, |t| t.config(key))) })
	}

	fn get_all(&self) -> StoreFuture<'_, BTreeMap<String, String>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(tables, Tables::configs)) })
	}

	fn set(&self, key: String, value: String) -> StoreFuture<'_, ()> {
		self.batch_set(BTreeMap::from([(key, value)]))
	}

	fn batch_set(&self, entries: BTreeMap<String, String>) -> StoreFuture<'_, ()> {
		let tables = self.0.clone();

		Box::pin(async move {
			Self::write_now(tables, |t, _| {
				t.set_configs(entries);

				Ok(())
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn update_stamps_updated_at_and_keeps_created_at() {
		let store = MemoryStore::default();
		let created =
			store.create(NewRecord::new("rt-1")).await.expect("Create should succeed.");
		let mut edited = created.clone();

		edited.memo = "rotated by hand".into();

		let saved = store.update(edited).await.expect("Update should succeed.");

		assert_eq!(saved.created_at, created.created_at);
		assert!(saved.updated_at >= created.updated_at);
		assert_eq!(
			store.get_by_id(created.id).await.expect("Lookup should succeed.").map(|r| r.memo),
			Some("rotated by hand".into())
		);
	}

	#[tokio::test]
	async fn settings_round_trip_through_batch_set() {
		let store = MemoryStore::default();

		store
			.batch_set(BTreeMap::from([
				("proxy_list".into(), "[]".into()),
				("auto_refresh_enabled".into(), "true".into()),
			]))
			.await
			.expect("Batch set should succeed.");
		store.set("proxy_list".into(), "[\"p1\"]".into()).await.expect("Set should succeed.");

		let all = store.get_all().await.expect("Get all should succeed.");

		assert_eq!(all.len(), 2);
		assert_eq!(
			store.get_by_key("proxy_list").await.expect("Lookup should succeed."),
			Some("[\"p1\"]".into())
		);
	}
}

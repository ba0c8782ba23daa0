//! JSON-snapshot [`RecordStore`] + [`ConfigStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::{Error as IoError, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	record::{NewRecord, TokenRecord},
	store::{
		ConfigStore, Page, RecordFilter, RecordPage, RecordStore, StoreError, StoreFuture, Tables,
	},
};

/// Persists records and settings to a JSON file after each mutation.
///
/// Mutations are applied to a scratch copy first, so a failed write leaves both the file and
/// the in-memory view untouched.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Tables>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Tables, StoreError> {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Tables::default()),
			Err(e) => return Err(io_failure("read", path)(e)),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Tables::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Snapshot {} is not a valid store: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		match path.parent().filter(|p| !p.as_os_str().is_empty()) {
			Some(dir) => fs::create_dir_all(dir).map_err(io_failure("create directory", dir)),
			None => Ok(()),
		}
	}

	/// Writes `tables` next to the snapshot, then renames it into place.
	fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec_pretty(tables).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode the store snapshot: {e}"),
		})?;
		let staging = self.path.with_extension("tmp");
		let mut file = File::create(&staging).map_err(io_failure("create", &staging))?;

		file.write_all(&bytes).map_err(io_failure("write", &staging))?;
		file.sync_all().map_err(io_failure("sync", &staging))?;
		drop(file);

		fs::rename(&staging, &self.path).map_err(io_failure("replace", &self.path))
	}

	fn mutate<T>(
		&self,
		f: impl FnOnce(&mut Tables, OffsetDateTime) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut scratch = guard.clone();
		let out = f(&mut scratch, OffsetDateTime::now_utc())?;

		self.persist(&scratch)?;
		*guard = scratch;

		Ok(out)
	}
}
impl RecordStore for FileStore {
	fn get_by_id(&self, id: i64) -> StoreFuture<'_, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get_by_id(id)) })
	}

	fn get_by_biz_id<'a>(&'a self, biz_id: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get_by_biz_id(biz_id)) })
	}

	fn get_by_token<'a>(
		&'a self,
		refresh_token: &'a str,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get_by_token(refresh_token)) })
	}

	fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get_by_email(email)) })
	}

	fn list<'a>(&'a self, filter: &'a RecordFilter, page: Page) -> StoreFuture<'a, RecordPage> {
		Box::pin(async move { Ok(self.inner.read().list(filter, page)) })
	}

	fn get_by_ids<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get_by_ids(ids)) })
	}

	fn create(&self, draft: NewRecord) -> StoreFuture<'_, TokenRecord> {
		Box::pin(async move { self.mutate(|t, now| t.create(draft, now)) })
	}

	fn update(&self, record: TokenRecord) -> StoreFuture<'_, TokenRecord> {
		Box::pin(async move { self.mutate(|t, now| t.update(record, now)) })
	}

	fn delete(&self, id: i64) -> StoreFuture<'_, bool> {
		Box::pin(async move { self.mutate(|t, _| Ok(t.delete(id))) })
	}
}
impl ConfigStore for FileStore {
	fn get_by_key<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().config(key)) })
	}

	fn get_all(&self) -> StoreFuture<'_, BTreeMap<String, String>> {
		Box::pin(async move { Ok(self.inner.read().configs()) })
	}

	fn set(&self, key: String, value: String) -> StoreFuture<'_, ()> {
		self.batch_set(BTreeMap::from([(key, value)]))
	}

	fn batch_set(&self, entries: BTreeMap<String, String>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|t, _| {
				t.set_configs(entries);

				Ok(())
			})
		})
	}
}

fn io_failure(action: &'static str, path: &Path) -> impl FnOnce(IoError) -> StoreError {
	let path = path.display().to_string();

	move |e| StoreError::Backend { message: format!("Failed to {action} {path}: {e}") }
}

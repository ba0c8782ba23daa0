//! Operator-facing record management: create, edit, delete, import, and lookups.

// crates.io
use rand::seq::IndexedRandom;
// self
use crate::{
	_prelude::*,
	flows::Fleet,
	record::{NewRecord, RecordPatch, TokenRecord, TokenSecret, generate_biz_id},
	store::{Page, RecordFilter, RecordPage},
};

/// Tally returned by bulk operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
	/// Entries that were applied.
	pub succeeded: usize,
	/// Entries that were skipped or failed.
	pub failed: usize,
}

impl Fleet {
	/// Creates a record, filling in a generated biz id and the configured defaults.
	///
	/// A duplicate biz id or refresh token is rejected with [`Error::Conflict`].
	pub async fn create(&self, mut draft: NewRecord) -> Result<TokenRecord> {
		let requested = draft.biz_id.take().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let biz_id = match requested {
			Some(biz_id) => {
				if self.records.get_by_biz_id(&biz_id).await?.is_some() {
					return Err(Error::Conflict {
						reason: format!("biz_id `{biz_id}` already exists"),
					});
				}

				biz_id
			},
			None => self.unused_biz_id().await?,
		};

		if self.records.get_by_token(draft.refresh_token.expose()).await?.is_some() {
			return Err(Error::Conflict { reason: "refresh token is already tracked".into() });
		}

		draft.biz_id = Some(biz_id);

		self.fill_defaults(&mut draft);

		let record = self.records.create(draft).await?;

		tracing::info!(
			record_id = record.id,
			biz_id = %record.biz_id,
			token = %record.refresh_token.fingerprint(),
			"Record created."
		);

		Ok(record)
	}

	/// Applies an operator patch; changing the biz id re-checks uniqueness.
	pub async fn update(&self, id: i64, patch: RecordPatch) -> Result<TokenRecord> {
		let guard = self.record_guard(id);
		let _singleflight = guard.lock().await;
		let mut record = self.load(id).await?;
		let renamed = patch
			.biz_id
			.as_deref()
			.map(str::trim)
			.filter(|v| !v.is_empty() && *v != record.biz_id);
		let taken = match renamed {
			Some(biz_id) => self.records.get_by_biz_id(biz_id).await?.is_some(),
			None => false,
		};

		if let (true, Some(biz_id)) = (taken, renamed) {
			return Err(Error::Conflict { reason: format!("biz_id `{biz_id}` is already in use") });
		}

		record.apply_patch(RecordPatch {
			biz_id: patch.biz_id.map(|v| v.trim().to_owned()),
			..patch
		});

		Ok(self.records.update(record).await?)
	}

	/// Hard-deletes a record.
	pub async fn delete(&self, id: i64) -> Result<()> {
		let existed = {
			let guard = self.record_guard(id);
			let _singleflight = guard.lock().await;

			self.records.delete(id).await?
		};

		if !existed {
			return Err(Error::record_not_found(id));
		}

		self.forget_guard(id);

		tracing::info!(record_id = id, "Record deleted.");

		Ok(())
	}

	/// Deletes each id independently and tallies the results.
	pub async fn batch_delete(&self, ids: &[i64]) -> BulkOutcome {
		let mut outcome = BulkOutcome::default();

		for &id in ids {
			match self.delete(id).await {
				Ok(()) => outcome.succeeded += 1,
				Err(e) => {
					outcome.failed += 1;

					tracing::warn!(record_id = id, error = %e, "Batch delete skipped a record.");
				},
			}
		}

		outcome
	}

	/// Imports raw refresh tokens as disabled records under `tag`.
	///
	/// Tokens are trimmed and de-duplicated in input order; tokens already tracked count as
	/// failures. Each new record gets a fresh biz id and a random proxy from `proxies`, or the
	/// configured default proxy when the list is empty.
	pub async fn batch_import(
		&self,
		tag: &str,
		tokens: &[String],
		proxies: &[String],
	) -> Result<BulkOutcome> {
		let mut seen = HashSet::new();
		let unique = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty() && seen.insert(*t));
		let mut outcome = BulkOutcome::default();

		for token in unique {
			if self.records.get_by_token(token).await?.is_some() {
				outcome.failed += 1;

				tracing::warn!(
					token = %TokenSecret::new(token).fingerprint(),
					"Import skipped an already tracked token."
				);

				continue;
			}

			let proxy = proxies.choose(&mut rand::rng()).cloned().unwrap_or_default();
			let mut draft = NewRecord::new(token)
				.biz_id(self.unused_biz_id().await?)
				.proxy(proxy)
				.tag(tag)
				.enabled(false);

			self.fill_defaults(&mut draft);

			match self.records.create(draft).await {
				Ok(record) => {
					outcome.succeeded += 1;

					tracing::info!(
						record_id = record.id,
						biz_id = %record.biz_id,
						"Token imported."
					);
				},
				Err(e) => {
					outcome.failed += 1;

					tracing::error!(error = %e, "Failed to import token.");
				},
			}
		}

		Ok(outcome)
	}

	/// Fetches one record.
	pub async fn get(&self, id: i64) -> Result<TokenRecord> {
		self.load(id).await
	}

	/// Fetches one record by biz id.
	pub async fn get_by_biz_id(&self, biz_id: &str) -> Result<TokenRecord> {
		self.records
			.get_by_biz_id(biz_id)
			.await?
			.ok_or_else(|| Error::NotFound { what: format!("Record `{biz_id}`") })
	}

	/// Fetches the record holding `email`.
	pub async fn get_by_email(&self, email: &str) -> Result<TokenRecord> {
		self.records
			.get_by_email(email)
			.await?
			.ok_or_else(|| Error::NotFound { what: format!("Record for {email}") })
	}

	/// Lists records matching `filter`, newest first.
	pub async fn list(&self, filter: &RecordFilter, page: Page) -> Result<RecordPage> {
		Ok(self.records.list(filter, page).await?)
	}

	fn fill_defaults(&self, draft: &mut NewRecord) {
		if draft.client_id.trim().is_empty() {
			draft.client_id = self.config.effective_client_id().to_owned();
		}
		if draft.proxy.trim().is_empty() {
			draft.proxy = self.config.default_proxy.clone();
		}
	}

	async fn unused_biz_id(&self) -> Result<String> {
		loop {
			let candidate = generate_biz_id();

			if self.records.get_by_biz_id(&candidate).await?.is_none() {
				return Ok(candidate);
			}
		}
	}
}

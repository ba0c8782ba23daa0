//! Standalone enrichment: re-read user or account metadata with the stored access token.

// self
use crate::{
	_prelude::*,
	flows::Fleet,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	record::TokenRecord,
};

#[derive(Clone, Copy, Debug)]
enum Resource {
	UserInfo,
	AccountInfo,
}

impl Fleet {
	/// Refreshes `email`, `user_name`, and the raw user-info payload.
	///
	/// Unlike enrichment inside [`Fleet::refresh`], a failure here is returned and nothing is
	/// persisted.
	pub async fn refresh_user_info(&self, id: i64) -> Result<TokenRecord> {
		self.enrich(id, Resource::UserInfo).await
	}

	/// Refreshes `account_type` and the raw account-check payload.
	pub async fn refresh_account_info(&self, id: i64) -> Result<TokenRecord> {
		self.enrich(id, Resource::AccountInfo).await
	}

	async fn enrich(&self, id: i64, resource: Resource) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Enrich;

		let stage = match resource {
			Resource::UserInfo => "refresh_user_info",
			Resource::AccountInfo => "refresh_account_info",
		};
		let span = FlowSpan::for_record(KIND, stage, id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.record_guard(id);
				let _singleflight = guard.lock().await;
				let mut record = self.load(id).await?;

				if record.access_token_str().is_empty() {
					return Err(Error::MissingAccessToken { id });
				}

				match resource {
					Resource::UserInfo => {
						let info = self.client.fetch_user_info(&record).await?;

						record.apply_user_info(info);
					},
					Resource::AccountInfo => {
						let info = self.client.fetch_account_info(&record).await?;

						record.apply_account_info(info);
					},
				}

				let record = self.records.update(record).await?;

				tracing::info!(
					record_id = id,
					biz_id = %record.biz_id,
					email = %record.email,
					account_type = %record.account_type,
					"Enrichment stored."
				);

				Ok(record)
			})
			.await;

		if let Err(e) = &result {
			tracing::warn!(record_id = id, stage, error = %e, "Enrichment failed.");
		}

		obs::record_result(KIND, &result);

		result
	}
}

//! Paced, sequential batch refresh with per-record failure isolation.

// self
use crate::{
	_prelude::*,
	flows::{Fleet, RefreshOptions},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{Page, RecordFilter},
};

/// Outcome of one record inside a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
	/// Requested record id.
	pub id: i64,
	/// Business id, when the record exists.
	pub biz_id: Option<String>,
	/// Whether the refresh succeeded.
	pub success: bool,
	/// Human-readable result.
	pub message: String,
}

/// Aggregate result of [`Fleet::batch_refresh`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRefreshReport {
	/// Number of successful refreshes.
	pub succeeded: usize,
	/// Number of failed refreshes, missing ids included.
	pub failed: usize,
	/// One entry per requested id, in request order.
	pub results: Vec<BatchItem>,
}

impl Fleet {
	/// Refreshes each id in order with both enrichments, sleeping between attempts.
	///
	/// A failure is recorded against its entry and never stops the batch. The pause is drawn
	/// from [`EngineConfig::pacing`](crate::config::EngineConfig::pacing) and is skipped after
	/// the last entry.
	pub async fn batch_refresh(&self, ids: &[i64]) -> Result<BatchRefreshReport> {
		const KIND: FlowKind = FlowKind::Batch;

		let span = FlowSpan::for_batch(KIND, "batch_refresh", ids.len());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let names: HashMap<i64, String> = self
					.records
					.get_by_ids(ids)
					.await?
					.into_iter()
					.map(|r| (r.id, r.biz_id))
					.collect();
				let mut report = BatchRefreshReport {
					results: Vec::with_capacity(ids.len()),
					..Default::default()
				};

				for (i, &id) in ids.iter().enumerate() {
					let item = match self.refresh(id, RefreshOptions::full()).await {
						Ok(record) => {
							report.succeeded += 1;

							BatchItem {
								id,
								biz_id: Some(record.biz_id),
								success: true,
								message: "Refreshed.".into(),
							}
						},
						Err(e) => {
							report.failed += 1;

							BatchItem {
								id,
								biz_id: names.get(&id).cloned(),
								success: false,
								message: e.to_string(),
							}
						},
					};

					report.results.push(item);

					if i + 1 < ids.len() {
						let delay = self.config.pacing.next_delay();

						if !delay.is_zero() {
							tracing::debug!(delay_secs = delay.as_secs(), "Pacing batch refresh.");
							tokio::time::sleep(delay).await;
						}
					}
				}

				obs::record_batch_items(KIND, report.succeeded, report.failed);
				tracing::info!(
					total = ids.len(),
					succeeded = report.succeeded,
					failed = report.failed,
					"Batch refresh finished."
				);

				Ok(report)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Batch-refreshes every enabled record, newest first.
	pub async fn refresh_all(&self) -> Result<BatchRefreshReport> {
		let filter = RecordFilter::enabled_only();
		let page = self.records.list(&filter, Page::all()).await?;
		let ids: Vec<_> = page.records.iter().map(|r| r.id).collect();

		tracing::info!(count = ids.len(), "Refreshing all enabled records.");

		if ids.is_empty() {
			return Ok(BatchRefreshReport::default());
		}

		self.batch_refresh(&ids).await
	}
}

//! Single-record refresh: exchange, persist, then optional enrichment.
//!
//! [`Fleet::refresh`] takes the record's guard, exchanges the current refresh token, and
//! persists the outcome. A failed exchange only replaces `last_refresh_result`; a successful
//! one rotates both secrets in a single update. Enrichment runs afterwards and never fails
//! the refresh.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshStats};

// self
use crate::{
	_prelude::*,
	client::{ExchangeFailure, ExchangeOutcome},
	flows::Fleet,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	record::TokenRecord,
};

/// Enrichment steps to run after a successful exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOptions {
	/// Fetch `{email, name}` from the user-info endpoint.
	pub user_info: bool,
	/// Fetch the account list and derive the plan.
	pub account_info: bool,
}
impl RefreshOptions {
	/// Exchange plus both enrichments.
	pub const fn full() -> Self {
		Self { user_info: true, account_info: true }
	}

	/// Exchange only.
	pub const fn exchange_only() -> Self {
		Self { user_info: false, account_info: false }
	}
}

impl Fleet {
	/// Exchanges the record's refresh token and persists the outcome.
	pub async fn refresh(&self, id: i64, options: RefreshOptions) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Exchange;

		let span = FlowSpan::for_record(KIND, "refresh", id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.record_guard(id);
				let _singleflight = guard.lock().await;

				self.refresh_locked(id, options).await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn refresh_locked(&self, id: i64, options: RefreshOptions) -> Result<TokenRecord> {
		let mut record = self.load(id).await?;

		self.refresh_metrics.record_attempt();

		tracing::info!(
			record_id = id,
			biz_id = %record.biz_id,
			token = %record.refresh_token.fingerprint(),
			has_proxy = !record.proxy.is_empty(),
			"Exchanging refresh token."
		);

		let outcome = self.client.exchange_token(&record).await.inspect_err(|e| {
			self.refresh_metrics.record_error();

			tracing::warn!(record_id = id, error = %e, "Exchange was not attempted.");
		})?;
		let grant = match outcome {
			ExchangeOutcome::Exchanged(grant) => grant,
			ExchangeOutcome::Failed(failure) => {
				match failure {
					ExchangeFailure::Transport(_) => self.refresh_metrics.record_error(),
					_ => self.refresh_metrics.record_rejection(),
				}

				return Err(self.persist_failure(record, failure).await);
			},
		};
		let superseded = record.refresh_token.fingerprint();

		record.adopt_grant(grant, OffsetDateTime::now_utc());

		let mut record = self.records.update(record).await.inspect_err(|e| {
			self.refresh_metrics.record_error();

			tracing::error!(record_id = id, error = %e, "Failed to persist rotated tokens.");
		})?;

		self.refresh_metrics.record_rotation();

		tracing::info!(
			record_id = id,
			biz_id = %record.biz_id,
			old_token = %superseded,
			new_token = %record.refresh_token.fingerprint(),
			"Refresh token rotated."
		);

		if self.enrich_in_place(&mut record, options).await {
			match self.records.update(record.clone()).await {
				Ok(saved) => record = saved,
				Err(e) => tracing::warn!(
					record_id = id,
					error = %e,
					"Failed to persist enrichment; rotated tokens are already stored."
				),
			}
		}

		Ok(record)
	}

	/// Records a failed exchange on the record and returns the caller-facing error.
	async fn persist_failure(&self, mut record: TokenRecord, failure: ExchangeFailure) -> Error {
		let id = record.id;

		record.record_failure(failure.raw());

		let err = failure.into_error();

		tracing::error!(record_id = id, biz_id = %record.biz_id, error = %err, "Refresh failed.");

		if let Err(e) = self.records.update(record).await {
			tracing::error!(record_id = id, error = %e, "Failed to persist refresh result.");
		}

		err
	}

	/// Runs the requested enrichments against `record`; returns whether anything changed.
	pub(crate) async fn enrich_in_place(
		&self,
		record: &mut TokenRecord,
		options: RefreshOptions,
	) -> bool {
		let mut changed = false;

		if options.user_info {
			match self.client.fetch_user_info(record).await {
				Ok(info) => {
					record.apply_user_info(info);

					changed = true;
				},
				Err(e) => tracing::warn!(
					record_id = record.id,
					biz_id = %record.biz_id,
					error = %e,
					"User-info enrichment failed."
				),
			}
		}
		if options.account_info {
			match self.client.fetch_account_info(record).await {
				Ok(info) => {
					if info.plan_type.is_none() {
						tracing::warn!(record_id = record.id, "Account check reported no plan.");
					}

					record.apply_account_info(info);

					changed = true;
				},
				Err(e) => tracing::warn!(
					record_id = record.id,
					biz_id = %record.biz_id,
					error = %e,
					"Account-check enrichment failed."
				),
			}
		}

		changed
	}
}

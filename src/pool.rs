//! Operator-configured proxy and client-identifier pools, and the pass that keeps every record
//! assigned to a member of each.

// crates.io
use rand::seq::IndexedRandom;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::Fleet,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::FALLBACK_CLIENT_ID,
	record::TokenRecord,
	store::{Page, RecordFilter},
};

/// Settings key holding the proxy pool.
pub const PROXY_LIST_KEY: &str = "proxy_list";
/// Settings key holding the client-identifier pool.
pub const CLIENT_ID_LIST_KEY: &str = "client_id_list";

/// Parses a JSON array of strings stored under `key`; blank text is an empty list.
pub fn parse_string_list(key: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
	if raw.trim().is_empty() {
		return Ok(Vec::new());
	}

	serde_json::from_str(raw).map_err(|source| ConfigError::InvalidPool { key, source })
}

/// Egress proxies records may be assigned to; may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyPool(Vec<String>);
impl ProxyPool {
	/// Builds a pool, dropping blank and duplicate entries.
	pub fn new(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self(normalize(members))
	}

	/// Parses the stored `proxy_list` value.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		parse_string_list(PROXY_LIST_KEY, raw).map(Self::new)
	}

	/// Pool members in configuration order.
	pub fn members(&self) -> &[String] {
		&self.0
	}

	/// Whether the pool has no members.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether `proxy` is a member.
	pub fn contains(&self, proxy: &str) -> bool {
		self.0.iter().any(|m| m == proxy)
	}

	/// Uniformly random member, if any.
	pub fn pick(&self) -> Option<&str> {
		self.0.choose(&mut rand::rng()).map(String::as_str)
	}

	/// Proxy `record` should use under this pool, or `None` when it already complies.
	fn reassignment(&self, record: &TokenRecord) -> Option<String> {
		if self.is_empty() {
			return (!record.proxy.is_empty()).then(String::new);
		}
		if self.contains(&record.proxy) {
			return None;
		}

		self.pick().map(str::to_owned)
	}
}

/// Client identifiers records may present; never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdPool(Vec<String>);
impl ClientIdPool {
	/// Builds a pool, substituting the fallback identifier when nothing usable is provided.
	pub fn new(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
		let members = normalize(members);

		if members.is_empty() { Self::fallback() } else { Self(members) }
	}

	/// Pool that only holds the fallback identifier.
	pub fn fallback() -> Self {
		Self(vec![FALLBACK_CLIENT_ID.into()])
	}

	/// Parses the stored `client_id_list` value.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		parse_string_list(CLIENT_ID_LIST_KEY, raw).map(Self::new)
	}

	/// Pool members in configuration order.
	pub fn members(&self) -> &[String] {
		&self.0
	}

	/// Whether `client_id` is a member.
	pub fn contains(&self, client_id: &str) -> bool {
		self.0.iter().any(|m| m == client_id)
	}

	/// Uniformly random member.
	pub fn pick(&self) -> &str {
		self.0.choose(&mut rand::rng()).map(String::as_str).unwrap_or(FALLBACK_CLIENT_ID)
	}

	fn reassignment(&self, record: &TokenRecord) -> Option<String> {
		(!self.contains(&record.client_id)).then(|| self.pick().to_owned())
	}
}
impl Default for ClientIdPool {
	fn default() -> Self {
		Self::fallback()
	}
}

/// Summary of one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
	/// Records inspected.
	pub scanned: usize,
	/// Records whose proxy or client id changed and were persisted.
	pub updated: usize,
	/// Records whose update failed.
	pub failed: usize,
}

impl Fleet {
	/// Reassigns every record whose proxy or client id falls outside the pools.
	///
	/// Each record is handled on its own under its guard, re-read before it is changed, so a
	/// concurrent refresh is never overwritten with a stale copy. A failed update is logged and
	/// counted, and the pass moves on. Records that already comply are never written, so a
	/// second pass over unchanged pools reports zero updates.
	pub async fn reconcile_pools(
		&self,
		proxies: &ProxyPool,
		client_ids: &ClientIdPool,
	) -> Result<ReconcileReport> {
		const KIND: FlowKind = FlowKind::Reconcile;

		let span = FlowSpan::new(KIND, "reconcile_pools");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let filter = RecordFilter::default();
				let page = self.records.list(&filter, Page::all()).await?;
				let ids: Vec<_> = page.records.iter().map(|r| r.id).collect();
				let mut report = ReconcileReport { scanned: ids.len(), ..Default::default() };

				for id in ids {
					match self.reassign(id, proxies, client_ids).await {
						Ok(true) => report.updated += 1,
						Ok(false) => {},
						Err(e) => {
							report.failed += 1;

							tracing::error!(
								record_id = id,
								error = %e,
								"Failed to persist pool assignment."
							);
						},
					}
				}

				obs::record_batch_items(KIND, report.updated, report.failed);
				tracing::info!(
					scanned = report.scanned,
					updated = report.updated,
					failed = report.failed,
					"Pool reconciliation finished."
				);

				Ok(report)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Applies the pools to the current copy of one record; returns whether it was written.
	async fn reassign(
		&self,
		id: i64,
		proxies: &ProxyPool,
		client_ids: &ClientIdPool,
	) -> Result<bool> {
		let guard = self.record_guard(id);
		let _singleflight = guard.lock().await;
		let Some(mut record) = self.records.get_by_id(id).await? else {
			self.forget_guard(id);

			return Ok(false);
		};
		let proxy = proxies.reassignment(&record);
		let client_id = client_ids.reassignment(&record);

		if proxy.is_none() && client_id.is_none() {
			return Ok(false);
		}
		if let Some(proxy) = proxy {
			record.proxy = proxy;
		}
		if let Some(client_id) = client_id {
			record.client_id = client_id;
		}

		let record = self.records.update(record).await?;

		tracing::debug!(record_id = id, biz_id = %record.biz_id, "Pool assignment updated.");

		Ok(true)
	}
}

fn normalize(members: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
	let mut seen = HashSet::new();

	members
		.into_iter()
		.map(|m| Into::<String>::into(m).trim().to_owned())
		.filter(|m| !m.is_empty() && seen.insert(m.clone()))
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::record::NewRecord;

	fn record(proxy: &str, client_id: &str) -> TokenRecord {
		NewRecord::new("rt")
			.proxy(proxy)
			.client_id(client_id)
			.into_record(1, OffsetDateTime::UNIX_EPOCH)
	}

	#[test]
	fn empty_client_pool_falls_back() {
		assert_eq!(ClientIdPool::parse("[]").expect("Empty list should parse.").members(), [
			FALLBACK_CLIENT_ID
		]);
		assert_eq!(ClientIdPool::new(["  ", ""]), ClientIdPool::fallback());
		assert_eq!(
			ClientIdPool::parse("").expect("Blank text should parse.").pick(),
			FALLBACK_CLIENT_ID
		);
	}

	#[test]
	fn malformed_pool_json_names_the_key() {
		let err = ProxyPool::parse("{\"p\":1}").expect_err("Objects are not pools.");

		assert!(matches!(err, ConfigError::InvalidPool { key: PROXY_LIST_KEY, .. }));
	}

	#[test]
	fn proxy_reassignment_rules() {
		let pool = ProxyPool::new(["p1", "p2"]);

		assert_eq!(pool.reassignment(&record("p1", "")), None);
		assert!(matches!(pool.reassignment(&record("p3", "")).as_deref(), Some("p1" | "p2")));
		assert_eq!(ProxyPool::default().reassignment(&record("p3", "")), Some(String::new()));
		assert_eq!(ProxyPool::default().reassignment(&record("", "")), None);
	}

	#[test]
	fn pools_drop_blanks_and_duplicates() {
		let pool = ProxyPool::new([" p1 ", "p1", "", "p2"]);

		assert_eq!(pool.members(), ["p1", "p2"]);
	}
}

//! Spans and counters shared by every engine flow.
//!
//! Flows open a `rt_fleet.flow` span (fields `flow`, `stage`, and `record_id` or `records` when
//! known) and report one attempt plus one terminal outcome. Builds with the `metrics` feature
//! forward those to `rt_fleet_flow_total{flow, outcome}`; batch-shaped flows additionally feed
//! `rt_fleet_batch_items_total{flow, outcome}` with their per-record tallies.

mod metrics;
mod span;

pub use metrics::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Engine flows that are traced and counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Refresh of one record.
	Exchange,
	/// Standalone user-info or account-check read.
	Enrich,
	/// Paced batch refresh.
	Batch,
	/// Pool reconciliation pass.
	Reconcile,
	/// Timer-driven refresh-all pass.
	Schedule,
}
impl FlowKind {
	/// Label used in span fields and metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Exchange => "exchange",
			Self::Enrich => "enrich",
			Self::Batch => "batch",
			Self::Reconcile => "reconcile",
			Self::Schedule => "schedule",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome label attached to a flow or batch item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow was entered.
	Attempt,
	/// The flow (or item) completed.
	Success,
	/// The flow (or item) failed.
	Failure,
}
impl FlowOutcome {
	/// Terminal outcome of `result`.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}

	/// Label used in metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}

/// Records the terminal outcome of a finished flow.
pub fn record_result<T, E>(kind: FlowKind, result: &Result<T, E>) {
	record_flow_outcome(kind, FlowOutcome::of(result));
}

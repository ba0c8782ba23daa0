// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counts one flow outcome on `rt_fleet_flow_total`; a no-op without the `metrics` feature.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"rt_fleet_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Adds per-record tallies of a batch-shaped flow to `rt_fleet_batch_items_total`.
pub fn record_batch_items(kind: FlowKind, succeeded: usize, failed: usize) {
	#[cfg(feature = "metrics")]
	for (outcome, count) in [(FlowOutcome::Success, succeeded), (FlowOutcome::Failure, failed)] {
		metrics::counter!(
			"rt_fleet_batch_items_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(count as u64);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, succeeded, failed);
}

// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::FlowKind};

/// `rt_fleet.flow` span wrapper.
#[derive(Clone, Debug)]
pub struct FlowSpan(Span);
impl FlowSpan {
	/// Span for a flow that is not tied to one record.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self(tracing::info_span!("rt_fleet.flow", flow = kind.as_str(), stage))
	}

	/// Span for work on a single record.
	pub fn for_record(kind: FlowKind, stage: &'static str, record_id: i64) -> Self {
		Self(tracing::info_span!("rt_fleet.flow", flow = kind.as_str(), stage, record_id))
	}

	/// Span for work over `records` records.
	pub fn for_batch(kind: FlowKind, stage: &'static str, records: usize) -> Self {
		Self(tracing::info_span!("rt_fleet.flow", flow = kind.as_str(), stage, records))
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.0.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::{FlowKind, FlowSpan};

	#[tokio::test]
	async fn batch_span_passes_the_output_through() {
		let span = FlowSpan::for_batch(FlowKind::Batch, "test", 3);
		let total = span.instrument(async { [1, 2, 3].iter().sum::<i32>() }).await;

		assert_eq!(total, 6);
	}
}

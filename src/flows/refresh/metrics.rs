// std
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
// self
use crate::_prelude::*;

/// Copy of the exchange tallies at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
	/// Exchanges started against a loaded record.
	pub attempts: u64,
	/// Exchanges whose rotated pair was persisted.
	pub rotated: u64,
	/// Exchanges the provider answered with an error or an unusable body.
	pub rejected: u64,
	/// Exchanges that never got an answer or whose result could not be stored.
	pub errored: u64,
}

/// Exchange tallies for one fleet, readable without a metrics recorder.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	rotated: AtomicU64,
	rejected: AtomicU64,
	errored: AtomicU64,
}
impl RefreshMetrics {
	/// Current tallies.
	pub fn snapshot(&self) -> RefreshStats {
		RefreshStats {
			attempts: self.attempts.load(Relaxed),
			rotated: self.rotated.load(Relaxed),
			rejected: self.rejected.load(Relaxed),
			errored: self.errored.load(Relaxed),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Relaxed);
	}

	pub(crate) fn record_rotation(&self) {
		self.rotated.fetch_add(1, Relaxed);
	}

	pub(crate) fn record_rejection(&self) {
		self.rejected.fetch_add(1, Relaxed);
	}

	pub(crate) fn record_error(&self) {
		self.errored.fetch_add(1, Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshot_reflects_each_tally() {
		let metrics = RefreshMetrics::default();

		metrics.record_attempt();
		metrics.record_attempt();
		metrics.record_rotation();
		metrics.record_rejection();

		assert_eq!(
			metrics.snapshot(),
			RefreshStats { attempts: 2, rotated: 1, rejected: 1, errored: 0 }
		);
	}
}

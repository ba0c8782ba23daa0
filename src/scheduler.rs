//! Recurring fleet-wide refresh driven by a reconfigurable timer.
//!
//! A [`RefreshScheduler`] owns at most one timer loop. Starting it spawns an immediate
//! refresh-all pass on its own task and a loop that runs another pass every
//! `interval_days × 24h`. Stopping cancels the loop's [`CancellationToken`]; a pass already in
//! flight finishes, later ticks never fire. Transitions take the write lock and queries take
//! the read lock, so configuration changes are decided and applied atomically.
//!
//! Passes from every loop the scheduler ever spawned share one gate. A pass that finds the gate
//! held is skipped, so a restart whose previous pass is still running never refreshes the fleet
//! twice in a row.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	runtime::Handle,
	time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	config::DEFAULT_REFRESH_INTERVAL_DAYS,
	error::ConfigError,
	flows::{BatchRefreshReport, Fleet},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Upper bound applied to timer periods.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Boxed future returned by [`FleetRefresher::refresh_all`].
pub type RefreshAllFuture<'a> =
	Pin<Box<dyn Future<Output = Result<BatchRefreshReport>> + 'a + Send>>;

/// Work the scheduler triggers on every pass.
pub trait FleetRefresher
where
	Self: 'static + Send + Sync,
{
	/// Refreshes every enabled record.
	fn refresh_all(&self) -> RefreshAllFuture<'_>;
}
impl FleetRefresher for Fleet {
	fn refresh_all(&self) -> RefreshAllFuture<'_> {
		Box::pin(Fleet::refresh_all(self))
	}
}

/// Parses the stored interval text; unparsable or non-positive values mean two days.
pub fn parse_interval_days(raw: &str) -> u32 {
	match raw.trim().parse::<i64>() {
		Ok(days) if days > 0 => u32::try_from(days).unwrap_or(MAX_INTERVAL_DAYS),
		_ => {
			tracing::warn!(interval = raw, "Invalid refresh interval; using the default.");

			DEFAULT_REFRESH_INTERVAL_DAYS
		},
	}
}

#[derive(Debug)]
struct SchedulerState {
	timer: Option<CancellationToken>,
	interval_days: u32,
}

/// Controls the recurring refresh-all timer.
pub struct RefreshScheduler {
	refresher: Arc<dyn FleetRefresher>,
	pass_gate: Arc<AsyncMutex<()>>,
	state: RwLock<SchedulerState>,
}
impl RefreshScheduler {
	/// Creates a stopped scheduler remembering `initial_interval_days`.
	pub fn new(refresher: Arc<dyn FleetRefresher>, initial_interval_days: u32) -> Self {
		Self {
			refresher,
			pass_gate: Default::default(),
			state: RwLock::new(SchedulerState {
				timer: None,
				interval_days: initial_interval_days,
			}),
		}
	}

	/// Starts the timer; a no-op when it is already running.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start(&self, interval_days: u32) -> Result<(), ConfigError> {
		let mut state = self.state.write();

		self.start_locked(&mut state, interval_days)
	}

	/// Stops the timer; a no-op when it is not running.
	pub fn stop(&self) {
		let mut state = self.state.write();

		Self::stop_locked(&mut state);
	}

	/// Replaces the running timer with one at `interval_days`; a no-op when stopped.
	pub fn restart(&self, interval_days: u32) -> Result<(), ConfigError> {
		let mut state = self.state.write();

		self.restart_locked(&mut state, interval_days)
	}

	/// Reconciles the timer with stored settings text.
	///
	/// `enabled` must be exactly `"true"` to enable. Enabling while stopped starts, disabling
	/// while running stops, and enabling while running at a different interval restarts.
	pub fn update_from_config(
		&self,
		enabled: &str,
		interval_text: &str,
	) -> Result<(), ConfigError> {
		let enabled = enabled == "true";
		let interval_days = parse_interval_days(interval_text);
		let mut state = self.state.write();
		let running = state.timer.is_some();

		tracing::info!(
			enabled,
			running,
			interval_days,
			previous_interval_days = state.interval_days,
			"Reconciling refresh schedule."
		);

		match (enabled, running) {
			(true, false) => self.start_locked(&mut state, interval_days),
			(false, true) => {
				Self::stop_locked(&mut state);

				Ok(())
			},
			(true, true) if state.interval_days != interval_days =>
				self.restart_locked(&mut state, interval_days),
			_ => Ok(()),
		}
	}

	/// Whether a timer loop is active.
	pub fn is_running(&self) -> bool {
		self.state.read().timer.is_some()
	}

	/// Interval of the active (or last active) timer.
	pub fn interval_days(&self) -> u32 {
		self.state.read().interval_days
	}

	fn start_locked(
		&self,
		state: &mut SchedulerState,
		interval_days: u32,
	) -> Result<(), ConfigError> {
		if state.timer.is_some() {
			tracing::debug!("Refresh schedule is already running.");

			return Ok(());
		}

		let runtime = runtime_for(interval_days)?;

		state.timer = Some(self.spawn_timer(&runtime, interval_days));
		state.interval_days = interval_days;

		tracing::info!(interval_days, "Refresh schedule started.");

		Ok(())
	}

	fn stop_locked(state: &mut SchedulerState) {
		match state.timer.take() {
			Some(cancel) => {
				cancel.cancel();

				tracing::info!("Refresh schedule stopped.");
			},
			None => tracing::debug!("Refresh schedule is not running."),
		}
	}

	fn restart_locked(
		&self,
		state: &mut SchedulerState,
		interval_days: u32,
	) -> Result<(), ConfigError> {
		let Some(previous) = state.timer.as_ref() else {
			tracing::debug!("Refresh schedule is not running; restart skipped.");

			return Ok(());
		};

		let runtime = runtime_for(interval_days)?;

		previous.cancel();

		let previous_interval_days = state.interval_days;

		state.timer = Some(self.spawn_timer(&runtime, interval_days));
		state.interval_days = interval_days;

		tracing::info!(previous_interval_days, interval_days, "Refresh schedule restarted.");

		Ok(())
	}

	fn spawn_timer(&self, runtime: &Handle, interval_days: u32) -> CancellationToken {
		let period =
			StdDuration::from_secs(u64::from(interval_days.min(MAX_INTERVAL_DAYS)) * SECS_PER_DAY);
		let cancel = CancellationToken::new();

		runtime.spawn(run_pass(self.refresher.clone(), self.pass_gate.clone(), "initial"));
		runtime.spawn(tick_loop(
			self.refresher.clone(),
			self.pass_gate.clone(),
			period,
			cancel.clone(),
		));

		cancel
	}
}
impl Debug for RefreshScheduler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("RefreshScheduler")
			.field("running", &state.timer.is_some())
			.field("interval_days", &state.interval_days)
			.finish()
	}
}

/// Validates `interval_days` and resolves the runtime that will host the timer.
fn runtime_for(interval_days: u32) -> Result<Handle, ConfigError> {
	if interval_days == 0 {
		return Err(ConfigError::InvalidInterval { days: interval_days });
	}

	Handle::try_current().map_err(|_| ConfigError::NoRuntime)
}

async fn tick_loop(
	refresher: Arc<dyn FleetRefresher>,
	gate: Arc<AsyncMutex<()>>,
	period: StdDuration,
	cancel: CancellationToken,
) {
	let mut interval = tokio::time::interval_at(Instant::now() + period, period);

	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = cancel.cancelled() => break,
			_ = interval.tick() => {},
		}

		run_pass(refresher.clone(), gate.clone(), "tick").await;
	}

	tracing::debug!("Refresh timer loop exited.");
}

async fn run_pass(
	refresher: Arc<dyn FleetRefresher>,
	gate: Arc<AsyncMutex<()>>,
	trigger: &'static str,
) {
	const KIND: FlowKind = FlowKind::Schedule;

	let Some(_pass) = gate.try_lock() else {
		tracing::info!(trigger, "Previous refresh pass is still running; skipping this one.");

		return;
	};
	let span = FlowSpan::new(KIND, trigger);

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span.instrument(refresher.refresh_all()).await;

	obs::record_result(KIND, &result);

	match result {
		Ok(report) => tracing::info!(
			trigger,
			succeeded = report.succeeded,
			failed = report.failed,
			"Scheduled refresh pass finished."
		),
		Err(e) => tracing::error!(trigger, error = %e, "Scheduled refresh pass failed."),
	}
}

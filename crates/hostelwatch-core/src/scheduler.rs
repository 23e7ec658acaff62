//! The polling loop.
//!
//! A [`Cycle`] runs one poll end to end, strictly in order:
//!
//! ```text
//! sample ──► geofence check ──► evaluate transition ──► track attendance ──► report
//! ```
//!
//! A [`Scheduler`] drives cycles from a single repeating timer on one task.
//! The task owns the cycle while it runs, so two cycles can never touch the
//! containment or mark state at the same time; ticks that fire while a cycle
//! is in flight are skipped. Stopping cancels the timer and drops any cycle
//! still in flight, discarding its late results. A dropped cycle has not
//! committed its containment, so the next cycle recomputes the same
//! transition and reports it. The task hands the cycle back on stop, so a
//! restart with a new interval keeps all state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::attendance::AttendanceSessionTracker;
use crate::geofence::GeofenceClient;
use crate::presence::{ContainmentState, PresenceEvaluator};
use crate::presentation::{CycleOutcome, CycleReport, PresentationSink};
use crate::sampler::RetryingSampler;

/// Errors from controlling the polling loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `start` while already running.
    #[error("polling loop is already running")]
    AlreadyRunning,

    /// A zero interval.
    #[error("polling interval must be greater than zero")]
    InvalidInterval,

    /// The polling task panicked.
    #[error("polling task failed: {0}")]
    TaskFailed(String),

    /// The cycle was lost in an earlier task failure.
    #[error("polling loop is unusable after an earlier failure")]
    Poisoned,
}

/// One end-to-end poll: sample, check, evaluate, track, report.
pub struct Cycle {
    sampler: RetryingSampler,
    geofence: Arc<dyn GeofenceClient>,
    evaluator: PresenceEvaluator,
    tracker: AttendanceSessionTracker,
    sink: Box<dyn PresentationSink>,
    refresh_history: bool,
    sequence: u64,
}

impl Cycle {
    /// Assembles a cycle from its stages.
    #[must_use]
    pub fn new(
        sampler: RetryingSampler,
        geofence: Arc<dyn GeofenceClient>,
        tracker: AttendanceSessionTracker,
        sink: Box<dyn PresentationSink>,
    ) -> Self {
        Self {
            sampler,
            geofence,
            evaluator: PresenceEvaluator::new(),
            tracker,
            sink,
            refresh_history: false,
            sequence: 0,
        }
    }

    /// Also fetch and report the attendance history after each successful cycle.
    #[must_use]
    pub const fn with_history(mut self, refresh_history: bool) -> Self {
        self.refresh_history = refresh_history;
        self
    }

    /// Current containment state.
    #[must_use]
    pub const fn containment(&self) -> ContainmentState {
        self.evaluator.state()
    }

    /// The presence evaluator.
    #[must_use]
    pub const fn evaluator(&self) -> &PresenceEvaluator {
        &self.evaluator
    }

    /// The attendance tracker.
    #[must_use]
    pub const fn tracker(&self) -> &AttendanceSessionTracker {
        &self.tracker
    }

    /// Number of cycles started so far.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Runs one cycle to completion and reports it to the sink.
    pub async fn run(&mut self) -> CycleReport {
        self.sequence += 1;
        let sequence = self.sequence;
        debug!(sequence, "cycle_started");

        let outcome = match self.sampler.poll().await {
            Err(failure) => CycleOutcome::SensorFailed(failure),
            Ok(sample) => match self.geofence.check(&sample).await {
                Err(failure) => {
                    warn!(sequence, kind = failure.code(), error = %failure, "geofence_check_failed");
                    CycleOutcome::GeofenceFailed(failure)
                }
                Ok(result) => {
                    // Containment is committed only after tracking returns; a
                    // cycle dropped mid-tracking leaves it untouched.
                    let pending = self.evaluator.assess(&result);
                    let attendance = self
                        .tracker
                        .on_transition(pending.transition, Utc::now())
                        .await;
                    let evaluation = self.evaluator.evaluate(&result);
                    CycleOutcome::Located {
                        result,
                        transition: evaluation.transition,
                        alert: evaluation.alert,
                        attendance,
                    }
                }
            },
        };

        let report = CycleReport {
            sequence,
            completed_at: Utc::now(),
            containment: self.evaluator.state(),
            outcome,
        };
        self.sink.report(&report);

        if self.refresh_history && !report.is_failure() {
            match self.tracker.backend().history().await {
                Ok(records) => self.sink.history(&records),
                Err(failure) => warn!(sequence, error = %failure, "history_fetch_failed"),
            }
        }

        report
    }
}

enum Slot {
    Idle(Box<Cycle>),
    Running {
        stop: oneshot::Sender<()>,
        handle: JoinHandle<Box<Cycle>>,
        interval: Duration,
    },
    Poisoned,
}

/// Drives a [`Cycle`] on a repeating timer.
pub struct Scheduler {
    slot: Slot,
    state_tx: watch::Sender<ContainmentState>,
}

impl Scheduler {
    /// Creates a stopped scheduler owning `cycle`.
    #[must_use]
    pub fn new(cycle: Cycle) -> Self {
        let (state_tx, _) = watch::channel(cycle.containment());
        Self {
            slot: Slot::Idle(Box::new(cycle)),
            state_tx,
        }
    }

    /// Returns `true` while the polling task is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.slot, Slot::Running { .. })
    }

    /// The active polling interval, if running.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        match &self.slot {
            Slot::Running { interval, .. } => Some(*interval),
            _ => None,
        }
    }

    /// Containment after the most recent completed cycle.
    #[must_use]
    pub fn containment(&self) -> ContainmentState {
        *self.state_tx.borrow()
    }

    /// A receiver notified after every completed cycle.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ContainmentState> {
        self.state_tx.subscribe()
    }

    /// Starts polling every `interval`. The first cycle runs immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if already running, if `interval` is zero, or if an
    /// earlier task failure lost the cycle.
    pub fn start(&mut self, interval: Duration) -> Result<(), SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        match std::mem::replace(&mut self.slot, Slot::Poisoned) {
            Slot::Idle(cycle) => {
                let (stop, stop_rx) = oneshot::channel();
                let handle = tokio::spawn(run_loop(
                    cycle,
                    interval,
                    stop_rx,
                    self.state_tx.clone(),
                ));
                info!(interval_secs = interval.as_secs_f64(), "polling_started");
                self.slot = Slot::Running {
                    stop,
                    handle,
                    interval,
                };
                Ok(())
            }
            running @ Slot::Running { .. } => {
                self.slot = running;
                Err(SchedulerError::AlreadyRunning)
            }
            Slot::Poisoned => Err(SchedulerError::Poisoned),
        }
    }

    /// Stops polling, cancelling the timer and discarding any in-flight cycle.
    ///
    /// Stopping a stopped scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling task panicked.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        match std::mem::replace(&mut self.slot, Slot::Poisoned) {
            Slot::Running { stop, handle, .. } => {
                // The task may already be gone if it panicked; the join reports that.
                let _ = stop.send(());
                match handle.await {
                    Ok(cycle) => {
                        self.slot = Slot::Idle(cycle);
                        info!("polling_stopped");
                        Ok(())
                    }
                    Err(e) => Err(SchedulerError::TaskFailed(e.to_string())),
                }
            }
            Slot::Idle(cycle) => {
                self.slot = Slot::Idle(cycle);
                Ok(())
            }
            Slot::Poisoned => Err(SchedulerError::Poisoned),
        }
    }

    /// Replaces the timer with one running every `interval`.
    ///
    /// Containment and mark state carry over.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::stop`] and [`Scheduler::start`].
    pub async fn restart(&mut self, interval: Duration) -> Result<(), SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        self.stop().await?;
        self.start(interval)
    }

    /// Stops polling and returns the cycle with its accumulated state.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling task panicked.
    pub async fn into_cycle(mut self) -> Result<Cycle, SchedulerError> {
        self.stop().await?;
        match std::mem::replace(&mut self.slot, Slot::Poisoned) {
            Slot::Idle(cycle) => Ok(*cycle),
            _ => Err(SchedulerError::Poisoned),
        }
    }
}

async fn run_loop(
    mut cycle: Box<Cycle>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
    state_tx: watch::Sender<ContainmentState>,
) -> Box<Cycle> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = &mut stop => {
                debug!(sequence = cycle.sequence(), "cycle_discarded");
                break;
            }
            report = cycle.run() => {
                state_tx.send_replace(report.containment);
            }
        }
    }

    // A cycle dropped after its report still committed containment.
    let committed = cycle.containment();
    state_tx.send_if_modified(|state| std::mem::replace(state, committed) != committed);
    cycle
}

//! Attendance session bookkeeping on the tracker side.
//!
//! The backend owns the authoritative sessions (entry/exit timestamps and
//! durations). [`AttendanceSessionTracker`] only decides *when* to signal it:
//!
//! - `ENTERED`: skipped while the local [`MarkState`] is younger than the
//!   mark window; otherwise the backend's "marked today" status is checked,
//!   and the entry is signalled only if the backend has nothing for today.
//! - `EXITED`: the exit is always signalled.
//! - `UNCHANGED` while inside: handled like `ENTERED`. The local mark keeps
//!   this free of network calls once attendance is marked.
//! - `UNCHANGED` while outside: the exit is signalled again only if the last
//!   attempt failed.
//!
//! A failed status check never marks; the next inside evaluation retries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::client::RemoteFailure;
use crate::error::Result;
use crate::presence::{ContainmentState, Transition};
use crate::storage::Storage;
use crate::types::{AttendanceRecord, AttendanceStatus};

/// Default length of the local dedupe window.
pub const DEFAULT_MARK_WINDOW_HOURS: i64 = 24;

/// The remote attendance service.
#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// Whether the device already has an entry recorded today.
    async fn attendance_status(&self) -> std::result::Result<AttendanceStatus, RemoteFailure>;

    /// Ask the backend to open (or confirm) a session.
    async fn signal_entry(&self) -> std::result::Result<(), RemoteFailure>;

    /// Tell the backend the current session may be closed.
    async fn signal_exit(&self) -> std::result::Result<(), RemoteFailure>;

    /// All recorded sessions, newest first.
    async fn history(&self) -> std::result::Result<Vec<AttendanceRecord>, RemoteFailure>;
}

/// Local memory of the last successful entry mark. Persisted across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkState {
    /// When the last entry mark was recorded.
    pub last_marked_at: Option<DateTime<Utc>>,
}

impl MarkState {
    /// Returns `true` when no mark exists or the last one is older than `window`.
    #[must_use]
    pub fn needs_remote_check(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_marked_at
            .map_or(true, |last| now.signed_duration_since(last) > window)
    }
}

/// What the tracker did with a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Nothing to do for this evaluation.
    Idle,

    /// A recent local mark made the remote check unnecessary.
    SuppressedLocally {
        /// The mark that suppressed the check.
        last_marked_at: DateTime<Utc>,
    },

    /// The backend had no entry today; the entry was signalled and marked.
    Marked,

    /// The backend already had an entry today; only the local mark was updated.
    AlreadyMarked,

    /// The status check failed; nothing was marked.
    StatusCheckFailed(RemoteFailure),

    /// The entry signal failed; nothing was marked.
    EntrySignalFailed(RemoteFailure),

    /// The exit was signalled.
    ExitSignalled,

    /// The exit signal failed.
    ExitSignalFailed(RemoteFailure),
}

impl TrackOutcome {
    /// The remote failure carried by this outcome, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            Self::StatusCheckFailed(failure)
            | Self::EntrySignalFailed(failure)
            | Self::ExitSignalFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Reacts to containment transitions by signalling the attendance backend.
pub struct AttendanceSessionTracker {
    backend: Arc<dyn AttendanceBackend>,
    storage: Option<Storage>,
    marks: MarkState,
    window: Duration,
    presence: ContainmentState,
    exit_pending: bool,
}

impl AttendanceSessionTracker {
    /// Creates a tracker whose mark state lives in memory only.
    #[must_use]
    pub fn new(backend: Arc<dyn AttendanceBackend>, window: Duration) -> Self {
        Self {
            backend,
            storage: None,
            marks: MarkState::default(),
            window,
            presence: ContainmentState::Unknown,
            exit_pending: false,
        }
    }

    /// Creates a tracker that loads and persists its mark state in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted mark state exists but cannot be read.
    pub fn with_storage(
        backend: Arc<dyn AttendanceBackend>,
        storage: Storage,
        window: Duration,
    ) -> Result<Self> {
        let marks = storage.load_mark_state()?;
        debug!(
            last_marked_at = ?marks.last_marked_at,
            data_dir = %storage.data_dir().display(),
            "mark_state_loaded"
        );
        Ok(Self {
            backend,
            storage: Some(storage),
            marks,
            window,
            presence: ContainmentState::Unknown,
            exit_pending: false,
        })
    }

    /// The current mark state.
    #[must_use]
    pub const fn marks(&self) -> MarkState {
        self.marks
    }

    /// The dedupe window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// The backend this tracker signals.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn AttendanceBackend> {
        &self.backend
    }

    /// Whether a failed exit signal is waiting to be retried.
    #[must_use]
    pub const fn exit_pending(&self) -> bool {
        self.exit_pending
    }

    /// Handles one transition observed at `now`.
    ///
    /// `Unchanged` applies to the side of the last handled transition. The
    /// side is only recorded once the backend calls return, so a call
    /// dropped mid-flight leaves the tracker as it was.
    pub async fn on_transition(
        &mut self,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> TrackOutcome {
        let side = match transition {
            Transition::Entered => ContainmentState::Inside,
            Transition::Exited => ContainmentState::Outside,
            Transition::Unchanged => self.presence,
        };

        let outcome = match side {
            ContainmentState::Inside => self.on_entered(now).await,
            ContainmentState::Outside
                if transition == Transition::Exited || self.exit_pending =>
            {
                self.on_exited().await
            }
            ContainmentState::Outside | ContainmentState::Unknown => TrackOutcome::Idle,
        };

        match &outcome {
            TrackOutcome::ExitSignalled => self.exit_pending = false,
            TrackOutcome::ExitSignalFailed(_) => self.exit_pending = true,
            _ if side == ContainmentState::Inside => self.exit_pending = false,
            _ => {}
        }
        self.presence = side;
        outcome
    }

    async fn on_entered(&mut self, now: DateTime<Utc>) -> TrackOutcome {
        if let Some(last_marked_at) = self.marks.last_marked_at {
            if !self.marks.needs_remote_check(now, self.window) {
                debug!(%last_marked_at, "attendance_check_suppressed");
                return TrackOutcome::SuppressedLocally { last_marked_at };
            }
        }

        let status = match self.backend.attendance_status().await {
            Ok(status) => status,
            Err(failure) => {
                warn!(error = %failure, "attendance_status_failed");
                return TrackOutcome::StatusCheckFailed(failure);
            }
        };

        if status.marked_today {
            info!("attendance_already_marked");
            self.record_mark(now);
            return TrackOutcome::AlreadyMarked;
        }

        if let Err(failure) = self.backend.signal_entry().await {
            warn!(error = %failure, "attendance_entry_signal_failed");
            return TrackOutcome::EntrySignalFailed(failure);
        }

        info!(marked_at = %now, "attendance_marked");
        self.record_mark(now);
        TrackOutcome::Marked
    }

    async fn on_exited(&self) -> TrackOutcome {
        match self.backend.signal_exit().await {
            Ok(()) => {
                info!("attendance_exit_signalled");
                TrackOutcome::ExitSignalled
            }
            Err(failure) => {
                warn!(error = %failure, "attendance_exit_signal_failed");
                TrackOutcome::ExitSignalFailed(failure)
            }
        }
    }

    fn record_mark(&mut self, now: DateTime<Utc>) {
        self.marks.last_marked_at = Some(now);
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_mark_state(&self.marks) {
                // The in-memory mark still suppresses checks for this process.
                error!(error = %e, "mark_state_save_failed");
            }
        }
    }
}

//! # hostelwatch-core
//!
//! Core logic for the hostelwatch geofence attendance system.
//!
//! A device polls its position on a fixed interval, asks the backend whether
//! that position is inside the hostel geofence, and turns the answer into
//! entry/exit transitions. Entries are marked as attendance at most once per
//! day; exits raise an alert and close the open session.
//!
//! ## Architecture
//!
//! - [`position`] - Position samples and the [`PositionSource`] seam
//! - [`sampler`] - Per-attempt timeouts and bounded retries around a source
//! - [`geofence`] - Coordinates, geofence results and the [`GeofenceClient`] seam
//! - [`presence`] - Containment state and transition detection
//! - [`attendance`] - Once-per-day entry marking and exit signalling
//! - [`scheduler`] - The polling cycle and its start/stop/restart control
//! - [`presentation`] - Cycle reports, display messages and [`PresentationSink`]
//! - [`client`] - HTTP client for the backend
//! - [`ledger`] - Backend-side attendance ledger
//! - `logging` - Subscriber setup shared by the binaries (feature `logging`)
//! - [`config`] - Configuration loading, saving, and validation
//! - [`storage`] - Persistent storage using JSON files
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Wire types and OpenAPI schemas shared with the backend

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod attendance;
pub mod client;
pub mod config;
pub mod error;
pub mod geofence;
pub mod ledger;
#[cfg(feature = "logging")]
pub mod logging;
pub mod position;
pub mod presence;
pub mod presentation;
pub mod sampler;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use attendance::{AttendanceBackend, AttendanceSessionTracker, MarkState, TrackOutcome};
pub use client::{BackendClient, RemoteFailure, DEVICE_ID_HEADER};
pub use config::{
    Config, ConfigError, ConfigResult, PositionConfig, SamplerConfig, ServerConfig,
    StorageConfig, TrackerConfig,
};
pub use error::{Result, WatchError};
pub use geofence::{Coordinates, GeofenceClient, GeofenceResult};
pub use ledger::AttendanceLedger;
pub use position::{
    PositionRequest, PositionSample, PositionSource, SensorFailure, StaticPositionSource,
};
pub use presence::{ContainmentState, Evaluation, PresenceEvaluator, Transition};
pub use presentation::{CycleOutcome, CycleReport, LogSink, PresentationSink};
pub use sampler::{RetryPolicy, RetryingSampler};
pub use scheduler::{Cycle, Scheduler, SchedulerError};
pub use storage::{default_data_dir, Storage, StorageError};
pub use types::{
    AttendanceRecord, AttendanceStatus, CheckLocationResponse, HealthResponse, SessionResponse,
};

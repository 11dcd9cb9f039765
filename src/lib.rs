//! Synheart Proctor - On-device integrity monitoring for proctored sessions
//!
//! Proctor turns per-frame face-landmark results and host focus notifications
//! into a debounced, timestamped violation log, and renders that log as a
//! plain-text integrity report when the session ends:
//! landmarks → direction classification → debouncing → event log → report.
//!
//! ## Modules
//!
//! - **Live sessions**: [`SessionController`] driven by a vision pipeline and a
//!   focus monitor supplied by the host
//! - **Replay**: feed a recorded `proctor.input_event.v1` stream through the
//!   same controller on a synthetic clock

pub mod classifier;
pub mod clock;
pub mod config;
pub mod controller;
pub mod debouncer;
pub mod error;
pub mod event_log;
pub mod replay;
pub mod report;
pub mod schema;
pub mod session;
pub mod sink;
pub mod sources;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::DirectionClassifier;
pub use clock::{Clock, ReplayClock, SystemClock};
pub use config::{LandmarkIndices, ProctorConfig};
pub use controller::SessionController;
pub use error::ProctorError;
pub use replay::{replay_ndjson, replay_to_report, ReplaySession};
pub use report::{render_text, ReportEncoder, ReportSummary};
pub use sink::{FileReportSink, ReportSink, SaveReceipt};
pub use sources::{FocusMonitor, StatusListener, VisionPipeline};
pub use types::{
    FocusEvent, FrameResult, GazeDirection, Landmark, LandmarkFrame, LiveStatus, LogEntry,
    SessionState, ViolationCategory,
};

// Schema exports
pub use schema::{InputEvent, InputEventAdapter, SCHEMA_VERSION};

/// Proctor version embedded in report summaries
pub const PROCTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report summaries
pub const PRODUCER_NAME: &str = "synheart-proctor";

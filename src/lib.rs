//! Firewatch alert kernel
//!
//! Watches one video stream at a time (a recorded file or a live camera),
//! runs a detector on every frame, and exposes a single debounced boolean:
//! "is there an active fire/smoke alert right now".
//!
//! # Alert rules
//!
//! A frame is positive when any detection has a monitored label (`fire`,
//! `smoke`, case-insensitive) at or above the confidence threshold (0.55).
//! Two positive frames within 2.5 s raise the alert; it stays up for 25 s
//! after the last positive frame and then clears with an empty window.
//!
//! # Module Structure
//!
//! - `frame`: RawFrame and the FrameSource seam
//! - `ingest`: recorded-file and webcam sources (plus `stub://` scenes)
//! - `detect`: detector backends and DetectionEvent
//! - `alert`: detection window, state machine, shared flag, AlertEngine
//! - `session`: one processing thread per stream, join-before-reset switching
//! - `api`: local HTTP surface (`/get_alert`, session control)
//! - `config`: daemon configuration from file and environment
//! - `trace`: JSON-lines detection traces and offline replay

pub mod alert;
pub mod api;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod trace;

pub use alert::{
    AlertEngine, AlertPolicy, AlertReader, AlertState, AlertStatus, AlertTransition, Evaluation,
};
pub use detect::{
    BackendRegistry, CpuBackend, DetectionEvent, DetectorBackend, FrameResult, ScriptedBackend,
    SharedBackend,
};
pub use frame::{FrameSource, RawFrame, SourceStats};
pub use ingest::{
    open_source, CaptureSettings, FileConfig, FileSource, SourceSpec, WebcamConfig, WebcamSource,
};
pub use session::{SessionManager, SessionState, SessionStatus};
pub use trace::{read_trace, replay, ReplayReport, TraceRecord};

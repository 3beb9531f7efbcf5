//! Detector backends and the detection data model.
//!
//! The alert engine never looks at pixels. It only sees `DetectionEvent`s
//! produced by whichever `DetectorBackend` the session was started with.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{CpuBackend, ScriptedBackend};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{DetectionEvent, FrameResult};

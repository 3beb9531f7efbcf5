use anyhow::Result;

use crate::detect::result::DetectionEvent;

/// Detector backend trait.
///
/// A backend turns one RGB24 frame into zero or more classified detections.
/// Backends are driven by exactly one processing thread at a time, so `detect`
/// takes `&mut self` and may keep per-stream state between calls.
pub trait DetectorBackend: Send {
    /// Backend identifier, used as the registry key.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// The pixel slice is only valid for the duration of the call.
    /// An empty result means nothing was found; it is not an error.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<DetectionEvent>>;

    /// Optional warm-up hook, called once before the first session uses the backend.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

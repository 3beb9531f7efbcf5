use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionEvent;

/// Backend that replays a fixed list of per-frame detections.
///
/// Call `n` returns the `n`th entry; once the script is exhausted every call
/// returns no detections. Used by tests and by trace-driven tooling.
pub struct ScriptedBackend {
    script: VecDeque<Vec<DetectionEvent>>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<DetectionEvent>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<DetectionEvent>> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

use serde::{Deserialize, Serialize};

/// One classified object reported by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Class name as reported by the model (e.g. "fire", "Smoke").
    pub label: String,
    /// Detector confidence, expected in 0..=1.
    pub confidence: f32,
}

impl DetectionEvent {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Confidence is finite and inside 0..=1.
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Per-frame outcome after filtering detections against the alert policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameResult {
    pub is_positive: bool,
}

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionEvent;

/// Fraction of flame-coloured pixels below which nothing is reported.
const DEFAULT_MIN_RATIO: f32 = 0.02;

/// Flame-coloured ratio that maps to full confidence.
const SATURATION_RATIO: f32 = 0.2;

/// Highest confidence the heuristic will ever claim.
const MAX_CONFIDENCE: f32 = 0.99;

/// CPU backend for fire detection by flame-colour pixel ratio.
///
/// This is not a trained model. It exists so the pipeline can run end to end on
/// machines without an ONNX runtime, and so synthetic scenes produce detections.
pub struct CpuBackend {
    min_ratio: f32,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            min_ratio: DEFAULT_MIN_RATIO,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<DetectionEvent>> {
        let ratio = flame_ratio(pixels);
        if ratio < self.min_ratio || ratio == 0.0 {
            return Ok(Vec::new());
        }
        let confidence = (ratio / SATURATION_RATIO).min(MAX_CONFIDENCE);
        Ok(vec![DetectionEvent::new("fire", confidence)])
    }
}

fn flame_ratio(pixels: &[u8]) -> f32 {
    let mut total = 0u64;
    let mut flame = 0u64;
    for rgb in pixels.chunks_exact(3) {
        total += 1;
        if is_flame_coloured(rgb[0], rgb[1], rgb[2]) {
            flame += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    flame as f32 / total as f32
}

/// Bright red/orange/yellow with little blue.
pub(crate) fn is_flame_coloured(r: u8, g: u8, b: u8) -> bool {
    r >= 200 && (60..=200).contains(&g) && b <= 90
}

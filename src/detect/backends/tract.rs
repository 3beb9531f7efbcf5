#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionEvent;

/// Scores below this floor are dropped before they reach the alert policy.
/// The policy applies its own (higher) threshold.
const DEFAULT_MIN_SCORE: f32 = 0.25;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single `[1, 3, H, W]` float input and a `[1, 4 + classes, anchors]`
/// output (box rows first, then one score row per class). Frames of any size
/// are resampled to the model input with nearest-neighbour sampling.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
    class_names: Vec<String>,
    min_score: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        if class_names.is_empty() {
            return Err(anyhow!("tract backend needs at least one class name"));
        }
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{}, classes={:?})",
            model_path.display(),
            width,
            height,
            class_names
        );

        Ok(Self {
            model,
            width,
            height,
            class_names,
            min_score: DEFAULT_MIN_SCORE,
        })
    }

    /// Override the default score floor.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if expected_len == 0 || pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let src_w = width as usize;
        let src_h = height as usize;
        let dst_w = self.width as usize;
        let dst_h = self.height as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sy = (y * src_h / dst_h).min(src_h - 1);
                let sx = (x * src_w / dst_w).min(src_w - 1);
                let idx = (sy * src_w + sx) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<DetectionEvent>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = scores.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let mut best: Option<(usize, f32)> = None;
            for class in 0..classes {
                let score = scores[[0, 4 + class, anchor]];
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((class, score));
                }
            }
            let Some((class, score)) = best else {
                continue;
            };
            if !score.is_finite() || score < self.min_score {
                continue;
            }
            let label = self
                .class_names
                .get(class)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class));
            detections.push(DetectionEvent::new(label, score.min(1.0)));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<DetectionEvent>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.width as usize) * (self.height as usize) * 3];
        let (width, height) = (self.width, self.height);
        self.detect(&blank, width, height).map(|_| ())
    }
}

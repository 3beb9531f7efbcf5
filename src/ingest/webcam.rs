//! Live camera frame source.
//!
//! `WebcamSource` captures from a local camera for one session:
//! - V4L2 device nodes such as `/dev/video0` (feature: ingest-v4l2)
//! - `stub://` devices produce an endless, paced synthetic stream
//!
//! Live streams never end on their own; the session is torn down instead.

use anyhow::{anyhow, Result};

use super::synthetic::{SceneDefaults, SyntheticScene, SyntheticSource, STUB_SCHEME};
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceV4l2Source;
use crate::frame::{FrameSource, RawFrame, SourceStats};

/// Configuration for a webcam source.
#[derive(Clone, Debug)]
pub struct WebcamConfig {
    /// Device path (e.g., "/dev/video0") or a `stub://` scene.
    pub device: String,
    /// Requested frame rate.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Webcam frame source.
pub struct WebcamSource {
    backend: WebcamBackend,
}

enum WebcamBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceV4l2Source),
}

impl WebcamSource {
    pub fn new(config: WebcamConfig) -> Result<Self> {
        if config.device.trim().is_empty() {
            return Err(anyhow!("webcam device must not be empty"));
        }
        if config.device.starts_with(STUB_SCHEME) {
            let scene = SyntheticScene::parse(
                &config.device,
                SceneDefaults {
                    frames: None,
                    fps: config.target_fps.max(1),
                    pace: true,
                    width: config.width,
                    height: config.height,
                },
            )?;
            Ok(Self {
                backend: WebcamBackend::Synthetic(SyntheticSource::new(&config.device, scene)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: WebcamBackend::Device(DeviceV4l2Source::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow!("webcam capture requires the ingest-v4l2 feature"))
            }
        }
    }
}

impl FrameSource for WebcamSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.next_frame().map(Some),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            WebcamBackend::Synthetic(source) => source.describe(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.describe(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            WebcamBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.stats(),
        }
    }
}

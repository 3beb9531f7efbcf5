//! Frame ingestion sources.
//!
//! This module provides the two kinds of stream a session can watch:
//! - Recorded video files (`FileSource`, FFmpeg behind ingest-file-ffmpeg)
//! - Live cameras (`WebcamSource`, V4L2 behind ingest-v4l2)
//!
//! Both accept `stub://` locations that render synthetic scenes, so the whole
//! pipeline can run without media libraries or hardware.
//!
//! Sources stamp every frame on the session clock and hand it off; they never
//! store frames.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;
pub mod webcam;

use anyhow::{anyhow, Result};
use serde::Serialize;

pub use file::{FileConfig, FileSource};
pub use webcam::{WebcamConfig, WebcamSource};

use crate::frame::FrameSource;

/// Largest accepted frame side, in pixels.
pub const MAX_FRAME_SIDE: u32 = 8192;

/// Byte length of a packed RGB24 frame, rejecting empty or oversized sizes.
pub fn rgb_frame_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    if width > MAX_FRAME_SIDE || height > MAX_FRAME_SIDE {
        return Err(anyhow!(
            "frame size {}x{} exceeds the {} pixel limit per side",
            width,
            height,
            MAX_FRAME_SIDE
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| anyhow!("frame size {}x{} overflows", width, height))
}

/// Frame rate and size requested from sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// What a session should watch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    File { path: String },
    Webcam { device: String },
}

impl SourceSpec {
    /// Parse a user-supplied source.
    ///
    /// - `webcam` uses `default_device`
    /// - `webcam:<device>` names a device (or a `stub://` scene)
    /// - `file:<path>` or a bare path is a recorded video
    pub fn parse(value: &str, default_device: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if value == "webcam" {
            return Ok(SourceSpec::Webcam {
                device: default_device.to_string(),
            });
        }
        if let Some(device) = value.strip_prefix("webcam:") {
            return Ok(SourceSpec::Webcam {
                device: device.to_string(),
            });
        }
        let path = value.strip_prefix("file:").unwrap_or(value);
        Ok(SourceSpec::File {
            path: path.to_string(),
        })
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::File { path } => write!(f, "file:{}", path),
            SourceSpec::Webcam { device } => write!(f, "webcam:{}", device),
        }
    }
}

/// Build an unconnected source for `spec`.
pub fn open_source(spec: &SourceSpec, capture: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    match spec {
        SourceSpec::File { path } => Ok(Box::new(FileSource::new(FileConfig {
            path: path.clone(),
            target_fps: capture.target_fps,
            width: capture.width,
            height: capture.height,
        })?)),
        SourceSpec::Webcam { device } => Ok(Box::new(WebcamSource::new(WebcamConfig {
            device: device.clone(),
            target_fps: capture.target_fps,
            width: capture.width,
            height: capture.height,
        })?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_specs() -> Result<()> {
        assert_eq!(
            SourceSpec::parse("webcam", "/dev/video2")?,
            SourceSpec::Webcam {
                device: "/dev/video2".to_string()
            }
        );
        assert_eq!(
            SourceSpec::parse("webcam:stub://cam", "/dev/video0")?,
            SourceSpec::Webcam {
                device: "stub://cam".to_string()
            }
        );
        assert_eq!(
            SourceSpec::parse("file:/data/clip.mp4", "/dev/video0")?,
            SourceSpec::File {
                path: "/data/clip.mp4".to_string()
            }
        );
        assert_eq!(
            SourceSpec::parse(" /data/clip.mp4 ", "/dev/video0")?.to_string(),
            "file:/data/clip.mp4"
        );
        assert!(SourceSpec::parse("  ", "/dev/video0").is_err());
        Ok(())
    }

    #[test]
    fn open_source_builds_stub_sources() -> Result<()> {
        let capture = CaptureSettings {
            target_fps: 10,
            width: 4,
            height: 3,
        };
        let mut source = open_source(
            &SourceSpec::File {
                path: "stub://clip?frames=2".to_string(),
            },
            &capture,
        )?;
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn frame_len_caps_each_side() {
        assert_eq!(rgb_frame_len(4, 3).unwrap(), 36);
        assert_eq!(
            rgb_frame_len(MAX_FRAME_SIDE, MAX_FRAME_SIDE).unwrap(),
            8192 * 8192 * 3
        );
        assert!(rgb_frame_len(0, 3).is_err());
        assert!(rgb_frame_len(MAX_FRAME_SIDE + 1, 1).is_err());
        assert!(rgb_frame_len(300_000, 300_000).is_err());
    }

    #[test]
    fn oversized_stub_source_is_rejected() {
        let capture = CaptureSettings::default();
        let spec = SourceSpec::File {
            path: "stub://x?frames=2&width=300000&height=300000".to_string(),
        };
        assert!(open_source(&spec, &capture).is_err());
    }
}

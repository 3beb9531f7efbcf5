//! Recorded-video frame source.
//!
//! `FileSource` decodes a local video file for one session:
//! - local paths only (no URL schemes)
//! - `.mp4` containers, decoded through FFmpeg (feature: ingest-file-ffmpeg)
//! - `stub://` paths render a finite synthetic clip instead
//!
//! The stream ends when the file does; a new session reopens the file.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{SceneDefaults, SyntheticScene, SyntheticSource, STUB_SCHEME};
use crate::frame::{FrameSource, RawFrame, SourceStats};

/// Frames in a synthetic clip that does not say otherwise.
const DEFAULT_STUB_FRAMES: u64 = 300;

const SUPPORTED_EXTENSIONS: &[&str] = &["mp4"];

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/var/lib/firewatch/uploads/clip.mp4").
    pub path: String,
    /// Nominal frame rate, used for synthetic clips.
    pub target_fps: u32,
    /// Frame width for synthetic clips.
    pub width: u32,
    /// Frame height for synthetic clips.
    pub height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        validate_file_path(&config.path)?;
        if config.path.starts_with(STUB_SCHEME) {
            let scene = SyntheticScene::parse(
                &config.path,
                SceneDefaults {
                    frames: Some(DEFAULT_STUB_FRAMES),
                    fps: config.target_fps.max(1),
                    pace: false,
                    width: config.width,
                    height: config.height,
                },
            )?;
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(&config.path, scene)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Synthetic(source) => source.describe(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.describe(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Reject remote URLs, empty paths and unsupported containers.
pub(crate) fn validate_file_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(anyhow!("file path must not be empty"));
    }
    if path.starts_with(STUB_SCHEME) {
        return Ok(());
    }
    if path.contains("://") {
        return Err(anyhow!(
            "file ingestion only supports local paths (no URL schemes)"
        ));
    }
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(anyhow!(
            "unsupported video file '{}': expected an MP4 file",
            path
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_and_non_mp4_paths() {
        assert!(validate_file_path("").is_err());
        assert!(validate_file_path("http://cam/clip.mp4").is_err());
        assert!(validate_file_path("/tmp/clip.avi").is_err());
        assert!(validate_file_path("/tmp/clip").is_err());
        assert!(validate_file_path("/tmp/clip.mp4").is_ok());
        assert!(validate_file_path("/tmp/CLIP.MP4").is_ok());
        assert!(validate_file_path("stub://clip").is_ok());
    }

    #[test]
    fn stub_file_is_a_finite_clip() -> Result<()> {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip?frames=5".to_string(),
            width: 8,
            height: 6,
            ..FileConfig::default()
        })?;
        source.connect()?;

        let mut frames = 0;
        while let Some(frame) = source.next_frame()? {
            assert_eq!((frame.width, frame.height), (8, 6));
            frames += 1;
        }
        assert_eq!(frames, 5);
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn real_files_need_ffmpeg_feature() {
        assert!(FileSource::new(FileConfig {
            path: "/tmp/clip.mp4".to_string(),
            ..FileConfig::default()
        })
        .is_err());
    }
}

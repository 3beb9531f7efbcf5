//! Frames and the frame-source seam.
//!
//! - `RawFrame`: one decoded RGB24 frame stamped on the session clock.
//! - `FrameSource`: anything that yields frames until the stream ends.
//!
//! Frames are handed to the detector and dropped; nothing here keeps them.

use anyhow::Result;

/// Decoded frame. Pixels are RGB24, row-major, `width * height * 3` bytes.
pub struct RawFrame {
    pixels: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Zero-based position in the session's stream.
    pub index: u64,

    /// Seconds since the source connected. Non-decreasing within a session.
    pub captured_at: f64,
}

impl RawFrame {
    pub(crate) fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64, captured_at: f64) -> Self {
        Self {
            pixels,
            width,
            height,
            index,
            captured_at,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel buffer length matches the advertised dimensions.
    pub fn is_well_formed(&self) -> bool {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
            .is_some_and(|expected| expected > 0 && expected == self.pixels.len())
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// A lazy, possibly endless, sequence of frames.
///
/// Recorded video ends with `Ok(None)`. Live capture never ends on its own.
/// A source is single-use: restarting means opening a new one for a new session.
pub trait FrameSource: Send {
    /// Open the underlying device or file.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Human-readable description for logs and status.
    fn describe(&self) -> String;

    fn stats(&self) -> SourceStats;
}

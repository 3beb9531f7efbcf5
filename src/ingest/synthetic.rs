//! Synthetic scenes for `stub://` sources.
//!
//! A scene URL looks like `stub://kitchen?frames=120&fps=10&fire=20-45,80-90&pace=0`:
//! - `frames`: clip length (omitted = endless)
//! - `fps`: frame rate of the session clock
//! - `fire`: inclusive frame ranges painted with flame-coloured pixels
//! - `pace`: `1` sleeps between frames to mimic a live camera
//! - `width` / `height`: frame size
//!
//! Timestamps are `index / fps`, so runs are deterministic regardless of pacing.

use anyhow::{anyhow, Context, Result};
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use crate::frame::{FrameSource, RawFrame, SourceStats};
use crate::ingest::rgb_frame_len;

pub(crate) const STUB_SCHEME: &str = "stub://";

const BACKGROUND: [u8; 3] = [40, 60, 110];

/// Values used when the scene URL leaves a parameter out.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SceneDefaults {
    pub frames: Option<u64>,
    pub fps: u32,
    pub pace: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SyntheticScene {
    pub name: String,
    pub frames: Option<u64>,
    pub fps: u32,
    pub fire: Vec<RangeInclusive<u64>>,
    pub pace: bool,
    pub width: u32,
    pub height: u32,
}

impl SyntheticScene {
    pub(crate) fn parse(url: &str, defaults: SceneDefaults) -> Result<Self> {
        let rest = url
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("synthetic scene must start with {}", STUB_SCHEME))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, query),
            None => (rest, ""),
        };

        let mut scene = SyntheticScene {
            name: name.to_string(),
            frames: defaults.frames,
            fps: defaults.fps,
            fire: Vec::new(),
            pace: defaults.pace,
            width: defaults.width,
            height: defaults.height,
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("scene parameter '{}' has no value", pair))?;
            match key {
                "frames" => scene.frames = Some(parse_num(key, value)?),
                "fps" => scene.fps = parse_num(key, value)?,
                "width" => scene.width = parse_num(key, value)?,
                "height" => scene.height = parse_num(key, value)?,
                "pace" => scene.pace = matches!(value, "1" | "true" | "yes"),
                "fire" => scene.fire = parse_ranges(value)?,
                other => return Err(anyhow!("unknown scene parameter '{}'", other)),
            }
        }

        if scene.fps == 0 {
            return Err(anyhow!("scene fps must be >= 1"));
        }
        rgb_frame_len(scene.width, scene.height)
            .with_context(|| format!("invalid size for scene {}", url))?;
        Ok(scene)
    }

    pub(crate) fn is_burning(&self, index: u64) -> bool {
        self.fire.iter().any(|range| range.contains(&index))
    }

    fn timestamp(&self, index: u64) -> f64 {
        index as f64 / self.fps as f64
    }

    fn render(&self, index: u64) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let burning = self.is_burning(index);
        // Flames fill the bottom third of the frame.
        let flame_from_row = height - height / 3;
        let flicker = (index % 40) as u8;

        let mut pixels = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            let rgb = if burning && row >= flame_from_row {
                [240, 120 + flicker, 20]
            } else {
                BACKGROUND
            };
            for _ in 0..width {
                pixels.extend_from_slice(&rgb);
            }
        }
        pixels
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("scene parameter '{}' must be a number (got '{}')", key, value))
}

fn parse_ranges(value: &str) -> Result<Vec<RangeInclusive<u64>>> {
    value
        .split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (start, end),
                None => (part, part),
            };
            let start: u64 = start
                .parse()
                .with_context(|| format!("invalid fire range '{}'", part))?;
            let end: u64 = end
                .parse()
                .with_context(|| format!("invalid fire range '{}'", part))?;
            if end < start {
                return Err(anyhow!("fire range '{}' ends before it starts", part));
            }
            Ok(start..=end)
        })
        .collect()
}

/// Frame source that renders a `SyntheticScene`.
pub(crate) struct SyntheticSource {
    scene: SyntheticScene,
    location: String,
    frame_count: u64,
    connected_at: Option<Instant>,
}

impl SyntheticSource {
    pub(crate) fn new(location: &str, scene: SyntheticScene) -> Self {
        Self {
            scene,
            location: location.to_string(),
            frame_count: 0,
            connected_at: None,
        }
    }

    fn wait_for_slot(&self, index: u64) {
        let Some(connected_at) = self.connected_at else {
            return;
        };
        let due = connected_at + Duration::from_secs_f64(self.scene.timestamp(index));
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("synthetic source connected: {}", self.location);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.connected_at.is_none() {
            return Err(anyhow!("synthetic source {} not connected", self.location));
        }
        let index = self.frame_count;
        if self.scene.frames.is_some_and(|frames| index >= frames) {
            return Ok(None);
        }
        if self.scene.pace {
            self.wait_for_slot(index);
        }
        self.frame_count += 1;

        Ok(Some(RawFrame::new(
            self.scene.render(index),
            self.scene.width,
            self.scene.height,
            index,
            self.scene.timestamp(index),
        )))
    }

    fn describe(&self) -> String {
        format!("{} (synthetic)", self.location)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.location.clone(),
        }
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::alert::AlertPolicy;
use crate::ingest::{rgb_frame_len, CaptureSettings};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8799";
const DEFAULT_DETECTOR: &str = "cpu";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_MODEL_CLASSES: &[&str] = &["fire", "smoke"];
const DEFAULT_MODEL_MIN_SCORE: f32 = 0.25;
const DEFAULT_WEBCAM_DEVICE: &str = "/dev/video0";

pub const DETECTOR_CPU: &str = "cpu";
pub const DETECTOR_TRACT: &str = "tract";

#[derive(Debug, Deserialize, Default)]
struct DaemonConfigFile {
    api: Option<ApiConfigFile>,
    detector: Option<DetectorConfigFile>,
    capture: Option<CaptureConfigFile>,
    alert: Option<AlertConfigFile>,
    startup_source: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    token_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    class_names: Option<Vec<String>>,
    min_score: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    webcam_device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    confidence_threshold: Option<f32>,
    labels: Option<Vec<String>>,
    window_secs: Option<f64>,
    min_detections: Option<usize>,
    hold_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub api_addr: String,
    pub api_token_path: Option<PathBuf>,
    pub detector: DetectorSettings,
    pub capture: CaptureSettings,
    pub webcam_device: String,
    /// Source watched at startup (same syntax as `SourceSpec::parse`).
    pub startup_source: Option<String>,
    pub policy: AlertPolicy,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Registry name of the default backend.
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub class_names: Vec<String>,
    pub min_score: f32,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FIREWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DaemonConfigFile) -> Self {
        let api = file.api.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let defaults = AlertPolicy::default();
        let capture_defaults = CaptureSettings::default();

        Self {
            api_addr: api.addr.unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            api_token_path: api.token_path,
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                model_path: detector.model_path,
                input_width: detector.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
                input_height: detector.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
                class_names: detector.class_names.unwrap_or_else(|| {
                    DEFAULT_MODEL_CLASSES.iter().map(|c| c.to_string()).collect()
                }),
                min_score: detector.min_score.unwrap_or(DEFAULT_MODEL_MIN_SCORE),
            },
            capture: CaptureSettings {
                target_fps: capture.target_fps.unwrap_or(capture_defaults.target_fps),
                width: capture.width.unwrap_or(capture_defaults.width),
                height: capture.height.unwrap_or(capture_defaults.height),
            },
            webcam_device: capture
                .webcam_device
                .unwrap_or_else(|| DEFAULT_WEBCAM_DEVICE.to_string()),
            startup_source: file.startup_source,
            policy: AlertPolicy {
                confidence_threshold: alert
                    .confidence_threshold
                    .unwrap_or(defaults.confidence_threshold),
                labels: alert.labels.unwrap_or(defaults.labels),
                window_secs: alert.window_secs.unwrap_or(defaults.window_secs),
                min_detections: alert.min_detections.unwrap_or(defaults.min_detections),
                hold_secs: alert.hold_secs.unwrap_or(defaults.hold_secs),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env("FIREWATCH_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(path) = non_empty_env("FIREWATCH_API_TOKEN_PATH") {
            self.api_token_path = Some(PathBuf::from(path));
        }
        if let Some(backend) = non_empty_env("FIREWATCH_DETECTOR") {
            self.detector.backend = backend;
        }
        if let Some(path) = non_empty_env("FIREWATCH_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(source) = non_empty_env("FIREWATCH_STARTUP_SOURCE") {
            self.startup_source = Some(source);
        }
        if let Some(device) = non_empty_env("FIREWATCH_WEBCAM_DEVICE") {
            self.webcam_device = device;
        }
        if let Some(threshold) = non_empty_env("FIREWATCH_CONFIDENCE_THRESHOLD") {
            self.policy.confidence_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("FIREWATCH_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Some(labels) = non_empty_env("FIREWATCH_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.policy.labels = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.api_addr
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("api addr must be host:port (got {})", self.api_addr))?;

        self.policy.labels = self
            .policy
            .labels
            .iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        self.policy.validate()?;

        if self.capture.target_fps == 0 {
            return Err(anyhow!("capture target_fps must be greater than zero"));
        }
        rgb_frame_len(self.capture.width, self.capture.height)
            .map_err(|e| anyhow!("invalid capture size: {}", e))?;
        if self.webcam_device.trim().is_empty() {
            return Err(anyhow!("webcam device must not be empty"));
        }

        self.detector.backend = self.detector.backend.trim().to_lowercase();
        match self.detector.backend.as_str() {
            DETECTOR_CPU => {}
            DETECTOR_TRACT => {
                if self.detector.model_path.is_none() {
                    return Err(anyhow!("the tract detector requires a model_path"));
                }
                if self.detector.class_names.is_empty() {
                    return Err(anyhow!("the tract detector requires class_names"));
                }
                rgb_frame_len(self.detector.input_width, self.detector.input_height)
                    .map_err(|e| anyhow!("invalid model input size: {}", e))?;
            }
            other => return Err(anyhow!("unknown detector backend: {}", other)),
        }
        if !(0.0..=1.0).contains(&self.detector.min_score) {
            return Err(anyhow!("detector min_score must be within 0..=1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DaemonConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: DaemonConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_alert_constants() {
        let mut cfg = DaemonConfig::from_file(DaemonConfigFile::default());
        cfg.validate().unwrap();
        assert_eq!(cfg.api_addr, DEFAULT_API_ADDR);
        assert_eq!(cfg.detector.backend, DETECTOR_CPU);
        assert_eq!(cfg.policy, AlertPolicy::default());
        assert_eq!(cfg.capture, CaptureSettings::default());
        assert!(cfg.startup_source.is_none());
    }

    #[test]
    fn tract_requires_model_path() {
        let mut cfg = DaemonConfig::from_file(DaemonConfigFile {
            detector: Some(DetectorConfigFile {
                backend: Some("Tract".to_string()),
                ..DetectorConfigFile::default()
            }),
            ..DaemonConfigFile::default()
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("model_path"));
    }

    #[test]
    fn rejects_blank_label_sets_and_bad_addr() {
        let mut cfg = DaemonConfig::from_file(DaemonConfigFile::default());
        cfg.policy.labels = vec![" ".to_string()];
        assert!(cfg.validate().is_err());

        let mut cfg = DaemonConfig::from_file(DaemonConfigFile::default());
        cfg.api_addr = "localhost".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_or_oversized_capture() {
        let mut cfg = DaemonConfig::from_file(DaemonConfigFile {
            capture: Some(CaptureConfigFile {
                width: Some(300_000),
                height: Some(300_000),
                ..CaptureConfigFile::default()
            }),
            ..DaemonConfigFile::default()
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capture size"));

        let mut cfg = DaemonConfig::from_file(DaemonConfigFile::default());
        cfg.capture.height = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DaemonConfig::from_file(DaemonConfigFile::default());
        cfg.capture.width = 8192;
        cfg.capture.height = 8192;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn split_csv_trims_entries() {
        assert_eq!(split_csv(" fire, ,Smoke "), vec!["fire", "Smoke"]);
    }
}

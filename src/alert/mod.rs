//! Debounced fire/smoke alerting.
//!
//! - `DetectionWindow`: trailing positive-frame timestamps.
//! - `AlertStateMachine`: inactive/active hysteresis over the window.
//! - `AlertFlag` / `AlertReader`: the one boolean observers may see.
//! - `AlertEngine`: classification + evaluation + flag store, once per frame.
//!
//! Nothing here performs I/O or fails; bad inputs degrade to "not positive".

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{DetectionEvent, FrameResult};

mod flag;
mod machine;
mod window;

pub use flag::{AlertFlag, AlertReader, AlertStatus};
pub use machine::{AlertState, AlertStateMachine, AlertTransition};
pub use window::DetectionWindow;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.55;
pub const DEFAULT_LABELS: &[&str] = &["fire", "smoke"];
pub const DEFAULT_WINDOW_SECS: f64 = 2.5;
pub const DEFAULT_MIN_DETECTIONS: usize = 2;
pub const DEFAULT_HOLD_SECS: f64 = 25.0;

/// Which detections count, and how the alert debounces them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Detections below this confidence are ignored (inclusive bound).
    pub confidence_threshold: f32,
    /// Monitored labels, matched case-insensitively.
    pub labels: Vec<String>,
    /// Debounce window in seconds.
    pub window_secs: f64,
    /// Positive frames required inside the window to raise.
    pub min_detections: usize,
    /// Seconds an alert stays up after the last qualifying detection.
    pub hold_secs: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            window_secs: DEFAULT_WINDOW_SECS,
            min_detections: DEFAULT_MIN_DETECTIONS,
            hold_secs: DEFAULT_HOLD_SECS,
        }
    }
}

impl AlertPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1 (got {})",
                self.confidence_threshold
            ));
        }
        if self.labels.iter().all(|label| label.trim().is_empty()) {
            return Err(anyhow!("at least one monitored label is required"));
        }
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(anyhow!("window must be a positive number of seconds"));
        }
        if self.min_detections == 0 {
            return Err(anyhow!("min_detections must be at least 1"));
        }
        if !self.hold_secs.is_finite() || self.hold_secs <= 0.0 {
            return Err(anyhow!("hold must be a positive number of seconds"));
        }
        Ok(())
    }

    pub fn is_monitored(&self, label: &str) -> bool {
        self.labels
            .iter()
            .any(|monitored| monitored.eq_ignore_ascii_case(label))
    }

    /// A frame is positive when any detection has a monitored label and
    /// `confidence >= threshold`. Malformed confidences never qualify.
    pub fn classify(&self, detections: &[DetectionEvent]) -> FrameResult {
        let is_positive = detections.iter().any(|detection| {
            detection.has_valid_confidence()
                && detection.confidence >= self.confidence_threshold
                && self.is_monitored(&detection.label)
        });
        FrameResult { is_positive }
    }

    pub(crate) fn state_machine(&self) -> AlertStateMachine {
        AlertStateMachine::new(self.window_secs, self.min_detections, self.hold_secs)
    }
}

/// Result of processing one frame.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Evaluation {
    /// Timestamp actually used (after monotonic clamping).
    pub now: f64,
    pub frame: FrameResult,
    pub transition: AlertTransition,
    pub state: AlertState,
    pub window_count: usize,
}

/// Per-session alert pipeline: owns the window/state and the flag writer.
pub struct AlertEngine {
    policy: AlertPolicy,
    machine: AlertStateMachine,
    flag: AlertFlag,
}

impl AlertEngine {
    /// Engine with its own private flag.
    pub fn new(policy: AlertPolicy) -> Self {
        Self::with_flag(policy, AlertFlag::new())
    }

    pub(crate) fn with_flag(policy: AlertPolicy, flag: AlertFlag) -> Self {
        let machine = policy.state_machine();
        Self {
            policy,
            machine,
            flag,
        }
    }

    pub fn state(&self) -> AlertState {
        self.machine.state()
    }

    pub fn window_count(&self) -> usize {
        self.machine.window_count()
    }

    pub fn reader(&self) -> AlertReader {
        self.flag.reader()
    }

    pub fn get_alert_status(&self) -> AlertStatus {
        AlertStatus {
            active: self.machine.is_active(),
        }
    }

    /// Classify this frame's detections, evaluate the state machine and publish.
    pub fn process(&mut self, now: f64, detections: &[DetectionEvent]) -> Evaluation {
        let frame = self.policy.classify(detections);
        self.evaluate(now, frame)
    }

    /// Evaluate an already classified frame.
    pub fn evaluate(&mut self, now: f64, frame: FrameResult) -> Evaluation {
        let transition = self.machine.evaluate(now, frame.is_positive);
        self.flag.store(self.machine.is_active());
        Evaluation {
            now: self.machine.last_now().unwrap_or(now),
            frame,
            transition,
            state: self.machine.state(),
            window_count: self.machine.window_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(confidence: f32) -> Vec<DetectionEvent> {
        vec![DetectionEvent::new("fire", confidence)]
    }

    #[test]
    fn default_policy_matches_fixed_constants() {
        let policy = AlertPolicy::default();
        assert_eq!(policy.confidence_threshold, 0.55);
        assert_eq!(policy.labels, vec!["fire", "smoke"]);
        assert_eq!(policy.window_secs, 2.5);
        assert_eq!(policy.min_detections, 2);
        assert_eq!(policy.hold_secs, 25.0);
        policy.validate().unwrap();
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = AlertPolicy::default();
        assert!(!policy.classify(&fire(0.549)).is_positive);
        assert!(policy.classify(&fire(0.55)).is_positive);
    }

    #[test]
    fn labels_match_case_insensitively() {
        let policy = AlertPolicy::default();
        for label in ["fire", "Fire", "FIRE", "Smoke", "sMoKe"] {
            let detections = vec![DetectionEvent::new(label, 0.9)];
            assert!(policy.classify(&detections).is_positive, "{}", label);
        }
        let person = vec![DetectionEvent::new("person", 0.99)];
        assert!(!policy.classify(&person).is_positive);
    }

    #[test]
    fn empty_and_malformed_frames_are_negative() {
        let policy = AlertPolicy::default();
        assert!(!policy.classify(&[]).is_positive);
        assert!(!policy.classify(&fire(f32::NAN)).is_positive);
        assert!(!policy.classify(&fire(1.5)).is_positive);
    }

    #[test]
    fn any_qualifying_detection_makes_the_frame_positive() {
        let policy = AlertPolicy::default();
        let detections = vec![
            DetectionEvent::new("person", 0.95),
            DetectionEvent::new("smoke", 0.3),
            DetectionEvent::new("Smoke", 0.6),
        ];
        assert!(policy.classify(&detections).is_positive);
    }

    #[test]
    fn validate_rejects_bad_policies() {
        let mut policy = AlertPolicy::default();
        policy.confidence_threshold = 1.2;
        assert!(policy.validate().is_err());

        let mut policy = AlertPolicy::default();
        policy.labels = vec![" ".to_string()];
        assert!(policy.validate().is_err());

        let mut policy = AlertPolicy::default();
        policy.min_detections = 0;
        assert!(policy.validate().is_err());

        let mut policy = AlertPolicy::default();
        policy.hold_secs = 0.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn engine_publishes_to_readers() {
        let mut engine = AlertEngine::new(AlertPolicy::default());
        let reader = engine.reader();

        engine.process(0.0, &fire(0.9));
        assert!(!reader.is_active());

        let eval = engine.process(1.0, &fire(0.9));
        assert_eq!(eval.transition, AlertTransition::Raised);
        assert!(reader.is_active());
        assert_eq!(engine.get_alert_status(), reader.get_alert_status());
    }
}

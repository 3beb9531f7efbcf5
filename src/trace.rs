//! Detection traces and offline replay.
//!
//! A trace is JSON lines, one processed frame per line:
//!
//! ```text
//! # camera 3, 2024-06-01
//! {"t": 0.0, "detections": [{"label": "fire", "confidence": 0.9}]}
//! {"t": 0.1, "detections": []}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Replaying a trace runs
//! the same `AlertEngine` a live session uses, so alert timing can be checked
//! against recorded detector output without video.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::alert::{AlertEngine, AlertPolicy, AlertStatus, AlertTransition};
use crate::detect::DetectionEvent;

/// One frame's worth of detector output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Session clock, seconds.
    pub t: f64,
    #[serde(default)]
    pub detections: Vec<DetectionEvent>,
}

/// A state change observed while replaying.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionRecord {
    /// 1-based position of the frame in the trace.
    pub frame: usize,
    pub t: f64,
    pub transition: AlertTransition,
    pub expires_at: f64,
    pub window_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub positive_frames: usize,
    pub transitions: Vec<TransitionRecord>,
    pub final_status: AlertStatus,
}

/// Parse a JSON-lines trace.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read trace line {}", line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid trace record on line {}", line_no))?;
        if !record.t.is_finite() {
            return Err(anyhow!("trace line {}: t must be finite", line_no));
        }
        records.push(record);
    }
    Ok(records)
}

/// Run `records` through a fresh engine. `Extended` transitions are reported
/// alongside raise/clear; `Unchanged` frames are not.
pub fn replay(records: &[TraceRecord], policy: &AlertPolicy) -> Result<ReplayReport> {
    policy.validate()?;
    let mut engine = AlertEngine::new(policy.clone());
    let mut positive_frames = 0;
    let mut transitions = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let evaluation = engine.process(record.t, &record.detections);
        if evaluation.frame.is_positive {
            positive_frames += 1;
        }
        if evaluation.transition != AlertTransition::Unchanged {
            transitions.push(TransitionRecord {
                frame: idx + 1,
                t: evaluation.now,
                transition: evaluation.transition,
                expires_at: evaluation.state.expires_at,
                window_count: evaluation.window_count,
            });
        }
    }

    Ok(ReplayReport {
        frames: records.len(),
        positive_frames,
        transitions,
        final_status: engine.get_alert_status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"
# two hits a second apart, then silence
{"t": 0.0, "detections": [{"label": "fire", "confidence": 0.9}]}
{"t": 1.0, "detections": [{"label": "Smoke", "confidence": 0.7}]}
{"t": 10.0, "detections": [{"label": "fire", "confidence": 0.6}]}

{"t": 34.0}
{"t": 35.5, "detections": [{"label": "person", "confidence": 0.99}]}
"#;

    #[test]
    fn reads_records_and_skips_comments() -> Result<()> {
        let records = read_trace(TRACE.as_bytes())?;
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].detections[0].label, "fire");
        assert!(records[3].detections.is_empty());
        Ok(())
    }

    #[test]
    fn errors_name_the_line() {
        let err = read_trace("{\"t\": 0.0}\n\nnot json\n".as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn replay_reports_raise_extend_clear() -> Result<()> {
        let records = read_trace(TRACE.as_bytes())?;
        let report = replay(&records, &AlertPolicy::default())?;

        assert_eq!(report.frames, 5);
        assert_eq!(report.positive_frames, 3);
        let kinds: Vec<_> = report.transitions.iter().map(|t| t.transition).collect();
        assert_eq!(
            kinds,
            vec![
                AlertTransition::Raised,
                AlertTransition::Extended,
                AlertTransition::Cleared
            ]
        );
        assert_eq!(report.transitions[0].frame, 2);
        assert_eq!(report.transitions[0].expires_at, 26.0);
        assert_eq!(report.transitions[1].expires_at, 35.0);
        assert_eq!(report.transitions[2].t, 35.5);
        assert!(!report.final_status.active);
        Ok(())
    }

    #[test]
    fn replay_rejects_invalid_policy() {
        let policy = AlertPolicy {
            min_detections: 0,
            ..AlertPolicy::default()
        };
        assert!(replay(&[], &policy).is_err());
    }
}

use serde::Serialize;

use super::window::DetectionWindow;

/// Alert flag plus the instant it lapses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AlertState {
    pub active: bool,
    /// Seconds on the session clock; `-inf` until the first activation.
    pub expires_at: f64,
}

impl AlertState {
    pub fn inactive() -> Self {
        Self {
            active: false,
            expires_at: f64::NEG_INFINITY,
        }
    }
}

impl Default for AlertState {
    fn default() -> Self {
        Self::inactive()
    }
}

/// What a single evaluation did to the alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    Unchanged,
    /// Inactive -> Active.
    Raised,
    /// Active -> Active with a later expiry.
    Extended,
    /// Active -> Inactive; the window was cleared.
    Cleared,
}

/// Two-state hysteresis machine driven once per processed frame.
///
/// Evaluation order per frame:
/// 1. positive frames are recorded, then the window is pruned (every frame);
/// 2. `min_detections` entries in the window activate and set `expires_at = now + hold`;
/// 3. a positive frame while active refreshes `expires_at = now + hold`;
/// 4. an active alert with `now > expires_at` clears and empties the window.
#[derive(Clone, Debug)]
pub struct AlertStateMachine {
    window: DetectionWindow,
    state: AlertState,
    min_detections: usize,
    hold_secs: f64,
    last_now: Option<f64>,
}

impl AlertStateMachine {
    pub fn new(window_secs: f64, min_detections: usize, hold_secs: f64) -> Self {
        Self {
            window: DetectionWindow::new(window_secs),
            state: AlertState::inactive(),
            min_detections,
            hold_secs,
            last_now: None,
        }
    }

    pub fn evaluate(&mut self, now: f64, is_positive: bool) -> AlertTransition {
        let now = self.monotonic(now);
        let before = self.state;

        if is_positive {
            self.window.record(now);
        }
        self.window.prune(now);

        if self.window.count() >= self.min_detections {
            self.state.active = true;
            self.state.expires_at = now + self.hold_secs;
        }

        if self.state.active && is_positive {
            self.state.expires_at = now + self.hold_secs;
        }

        if self.state.active && now > self.state.expires_at {
            self.state.active = false;
            self.window.clear();
        }

        match (before.active, self.state.active) {
            (false, true) => AlertTransition::Raised,
            (true, false) => AlertTransition::Cleared,
            (true, true) if self.state.expires_at > before.expires_at => AlertTransition::Extended,
            _ => AlertTransition::Unchanged,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn window_count(&self) -> usize {
        self.window.count()
    }

    /// Timestamp used by the most recent evaluation.
    pub fn last_now(&self) -> Option<f64> {
        self.last_now
    }

    // Time never runs backwards inside a session: a regressing or non-finite
    // clock reading is pinned to the last accepted one.
    fn monotonic(&mut self, now: f64) -> f64 {
        let now = match self.last_now {
            Some(last) if !now.is_finite() || now < last => {
                log::debug!("clock reading {} rejected, holding at {}", now, last);
                last
            }
            None if !now.is_finite() => 0.0,
            _ => now,
        };
        self.last_now = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> AlertStateMachine {
        AlertStateMachine::new(2.5, 2, 25.0)
    }

    #[test]
    fn two_positives_inside_window_raise() {
        let mut m = machine();
        assert_eq!(m.evaluate(0.0, true), AlertTransition::Unchanged);
        assert_eq!(m.evaluate(1.0, true), AlertTransition::Raised);
        assert_eq!(m.window_count(), 2);
        assert_eq!(m.state().expires_at, 26.0);
    }

    #[test]
    fn positives_further_apart_than_window_do_not_raise() {
        let mut m = machine();
        m.evaluate(0.0, true);
        assert_eq!(m.evaluate(2.6, true), AlertTransition::Unchanged);
        assert!(!m.is_active());
        assert_eq!(m.window_count(), 1);
    }

    #[test]
    fn negatives_after_burst_extend_until_window_drains() {
        let mut m = machine();
        m.evaluate(0.0, true);
        m.evaluate(1.0, true);
        // Still two entries within 2.5s of t=2.0: rule 2 refreshes.
        assert_eq!(m.evaluate(2.0, false), AlertTransition::Extended);
        assert_eq!(m.state().expires_at, 27.0);
        // t=3.0 drops the t=0.0 entry; no refresh.
        assert_eq!(m.evaluate(3.0, false), AlertTransition::Unchanged);
        assert_eq!(m.state().expires_at, 27.0);
        assert_eq!(m.window_count(), 1);
    }

    #[test]
    fn expiry_clears_and_empties_window() {
        let mut m = machine();
        m.evaluate(0.0, true);
        m.evaluate(1.0, true);
        assert_eq!(m.evaluate(26.0, false), AlertTransition::Unchanged);
        assert!(m.is_active());
        assert_eq!(m.evaluate(26.1, false), AlertTransition::Cleared);
        assert!(!m.is_active());
        assert_eq!(m.window_count(), 0);
    }

    #[test]
    fn regressing_clock_is_held() {
        let mut m = machine();
        m.evaluate(5.0, true);
        m.evaluate(4.0, true);
        assert_eq!(m.last_now(), Some(5.0));
        assert!(m.is_active());
        assert_eq!(m.state().expires_at, 30.0);

        m.evaluate(f64::NAN, false);
        assert_eq!(m.last_now(), Some(5.0));
    }

    #[test]
    fn infinite_reading_does_not_pin_the_clock() {
        let mut m = machine();
        m.evaluate(0.0, true);
        m.evaluate(1.0, true);
        assert!(m.is_active());

        assert_eq!(m.evaluate(f64::INFINITY, false), AlertTransition::Unchanged);
        assert_eq!(m.last_now(), Some(1.0));
        assert_eq!(m.evaluate(1000.0, false), AlertTransition::Cleared);
        assert_eq!(m.last_now(), Some(1000.0));
        assert!(!m.is_active());

        let mut m = machine();
        m.evaluate(f64::INFINITY, true);
        assert_eq!(m.last_now(), Some(0.0));
    }
}

use std::collections::VecDeque;

/// Trailing record of positive-frame timestamps (seconds).
///
/// Entries are appended in non-decreasing order, so pruning only ever pops
/// from the front.
#[derive(Clone, Debug)]
pub struct DetectionWindow {
    entries: VecDeque<f64>,
    horizon_secs: f64,
}

impl DetectionWindow {
    pub fn new(horizon_secs: f64) -> Self {
        Self {
            entries: VecDeque::new(),
            horizon_secs,
        }
    }

    /// Append a positive-frame timestamp.
    pub fn record(&mut self, now: f64) {
        self.entries.push_back(now);
    }

    /// Drop every entry with `now - entry > horizon`.
    pub fn prune(&mut self, now: f64) {
        while let Some(&oldest) = self.entries.front() {
            if now - oldest > self.horizon_secs {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Entries currently retained. Only meaningful right after `prune`.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest retained timestamp.
    pub fn oldest(&self) -> Option<f64> {
        self.entries.front().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_keeps_entries_on_the_horizon() {
        let mut window = DetectionWindow::new(2.5);
        window.record(0.0);
        window.record(1.0);
        window.prune(2.5);
        assert_eq!(window.count(), 2);

        window.prune(2.6);
        assert_eq!(window.count(), 1);
        assert_eq!(window.oldest(), Some(1.0));
    }

    #[test]
    fn prune_never_reports_stale_support() {
        let mut window = DetectionWindow::new(2.5);
        let mut now = 0.0;
        for step in 0..200 {
            now += 0.1 + (step % 7) as f64 * 0.15;
            if step % 3 != 0 {
                window.record(now);
            }
            window.prune(now);
            if let Some(oldest) = window.oldest() {
                assert!(now - oldest <= 2.5, "stale entry {} at {}", oldest, now);
            }
        }
    }

    #[test]
    fn clear_discards_everything() {
        let mut window = DetectionWindow::new(2.5);
        window.record(3.0);
        window.record(3.5);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.count(), 0);
    }
}

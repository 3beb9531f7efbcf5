use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Snapshot returned to observers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub active: bool,
}

/// Write side of the shared alert flag.
///
/// Not `Clone`: the only additional writer handle is created inside the crate,
/// for the one processing path that owns the current session.
#[derive(Debug, Default)]
pub struct AlertFlag {
    active: Arc<AtomicBool>,
}

impl AlertFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn share_writer(&self) -> AlertFlag {
        AlertFlag {
            active: self.active.clone(),
        }
    }

    pub(crate) fn store(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.store(false);
    }

    pub fn reader(&self) -> AlertReader {
        AlertReader {
            active: self.active.clone(),
        }
    }
}

/// Read-only, cloneable view of the alert flag.
///
/// Every read is one atomic load; it never blocks on the processing path.
#[derive(Clone, Debug)]
pub struct AlertReader {
    active: Arc<AtomicBool>,
}

impl AlertReader {
    pub fn get_alert_status(&self) -> AlertStatus {
        AlertStatus {
            active: self.is_active(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_observe_writer_stores() {
        let flag = AlertFlag::new();
        let reader = flag.reader();
        assert_eq!(reader.get_alert_status(), AlertStatus { active: false });

        flag.share_writer().store(true);
        assert!(reader.is_active());
        assert!(reader.clone().is_active());

        flag.reset();
        assert!(!reader.is_active());
    }

    #[test]
    fn status_serializes_as_active_field() {
        let json = serde_json::to_string(&AlertStatus { active: true }).unwrap();
        assert_eq!(json, r#"{"active":true}"#);
    }
}

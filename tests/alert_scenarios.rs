use firewatch::{AlertEngine, AlertPolicy, AlertTransition, DetectionEvent};

fn fire(confidence: f32) -> Vec<DetectionEvent> {
    vec![DetectionEvent::new("fire", confidence)]
}

fn engine() -> AlertEngine {
    AlertEngine::new(AlertPolicy::default())
}

#[test]
fn two_positives_within_window_raise_the_alert() {
    let mut engine = engine();
    let first = engine.process(0.0, &fire(0.9));
    assert_eq!(first.transition, AlertTransition::Unchanged);
    assert!(!engine.get_alert_status().active);

    let second = engine.process(1.0, &fire(0.9));
    assert_eq!(second.transition, AlertTransition::Raised);
    assert!(engine.get_alert_status().active);
    assert_eq!(engine.state().expires_at, 26.0);
}

#[test]
fn single_positive_stays_inactive() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    for step in 1..50 {
        engine.process(step as f64 * 0.1, &[]);
    }
    assert!(!engine.get_alert_status().active);
}

#[test]
fn positive_while_active_extends_expiry() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    engine.process(1.0, &fire(0.9));
    assert_eq!(engine.state().expires_at, 26.0);

    let evaluation = engine.process(10.0, &fire(0.9));
    assert_eq!(evaluation.transition, AlertTransition::Extended);
    assert_eq!(engine.state().expires_at, 35.0);
    assert!(engine.get_alert_status().active);
}

#[test]
fn alert_expires_and_window_is_cleared() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    engine.process(1.0, &fire(0.9));

    let at_expiry = engine.process(26.0, &[]);
    assert_eq!(at_expiry.transition, AlertTransition::Unchanged);
    assert!(engine.get_alert_status().active);

    let after = engine.process(26.1, &[]);
    assert_eq!(after.transition, AlertTransition::Cleared);
    assert!(!engine.get_alert_status().active);
    assert_eq!(engine.window_count(), 0);
}

#[test]
fn alert_holds_until_expiry_with_no_further_positives() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    engine.process(1.0, &fire(0.9));

    let mut t = 1.0;
    while t < 26.0 {
        engine.process(t, &[]);
        assert!(engine.get_alert_status().active, "dropped early at t={}", t);
        t += 0.25;
    }
}

#[test]
fn confidence_threshold_is_inclusive() {
    let policy = AlertPolicy::default();
    assert!(!policy.classify(&fire(0.549)).is_positive);
    assert!(policy.classify(&fire(0.55)).is_positive);
}

#[test]
fn labels_match_case_insensitively() {
    let policy = AlertPolicy::default();
    for label in ["fire", "Fire", "FIRE", "smoke", "Smoke"] {
        assert!(
            policy
                .classify(&[DetectionEvent::new(label, 0.9)])
                .is_positive,
            "{} should be monitored",
            label
        );
    }
    assert!(!policy
        .classify(&[DetectionEvent::new("person", 0.99)])
        .is_positive);
}

#[test]
fn status_reads_are_idempotent() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    engine.process(0.5, &fire(0.9));
    let reader = engine.reader();
    let first = reader.get_alert_status();
    for _ in 0..10 {
        assert_eq!(reader.get_alert_status(), first);
        assert_eq!(engine.get_alert_status(), first);
    }
}

#[test]
fn positives_spread_wider_than_window_never_raise() {
    let mut engine = engine();
    for step in 0..20 {
        let evaluation = engine.process(step as f64 * 3.0, &fire(0.95));
        assert_ne!(evaluation.transition, AlertTransition::Raised);
    }
    assert!(!engine.get_alert_status().active);
}

#[test]
fn backwards_timestamps_do_not_shorten_the_hold() {
    let mut engine = engine();
    engine.process(10.0, &fire(0.9));
    engine.process(11.0, &fire(0.9));
    assert_eq!(engine.state().expires_at, 36.0);

    let evaluation = engine.process(5.0, &[]);
    assert_eq!(evaluation.now, 11.0);
    assert!(engine.get_alert_status().active);
    assert_eq!(engine.state().expires_at, 36.0);
}

#[test]
fn infinite_timestamp_does_not_keep_the_alert_up() {
    let mut engine = engine();
    engine.process(0.0, &fire(0.9));
    engine.process(1.0, &fire(0.9));
    assert!(engine.get_alert_status().active);

    let evaluation = engine.process(f64::INFINITY, &[]);
    assert_eq!(evaluation.now, 1.0);

    let evaluation = engine.process(1000.0, &[]);
    assert_eq!(evaluation.now, 1000.0);
    assert_eq!(evaluation.transition, AlertTransition::Cleared);
    assert!(!engine.get_alert_status().active);
}

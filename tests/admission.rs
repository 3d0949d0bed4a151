mod common;

use common::test_helpers::{auth_governor, policy};
use request_governor::{Admission, Category, CategoryStatus, GovernorConfig, ManualClock, RateGovernor};
use std::time::Duration;

fn auth() -> Category {
    Category::new("auth")
}

#[test]
fn two_per_second_auth_scenario() {
    let (governor, clock) = auth_governor(2, 1000, 500);

    let decisions: Vec<Admission> = (0..3).map(|_| governor.check_admission(&auth())).collect();
    assert_eq!(
        decisions,
        vec![
            Admission::Allowed,
            Admission::Allowed,
            Admission::Denied { retry_after: Duration::from_millis(500) },
        ]
    );

    clock.set(600);
    assert_eq!(governor.check_admission(&auth()), Admission::Allowed);
}

#[test]
fn exactly_max_requests_fit_in_a_window() {
    for max in [1u32, 5, 17] {
        let (governor, clock) = auth_governor(max, 10_000, 100);
        for i in 0..max {
            clock.set(u64::from(i));
            assert!(governor.check_admission(&auth()).is_allowed(), "request {i} of {max}");
        }
        assert!(!governor.check_admission(&auth()).is_allowed());
    }
}

#[test]
fn window_resets_after_its_duration() {
    let (governor, clock) = auth_governor(3, 1000, 0);
    for _ in 0..3 {
        assert!(governor.check_admission(&auth()).is_allowed());
    }
    clock.set(1000);
    for _ in 0..3 {
        assert!(governor.check_admission(&auth()).is_allowed());
    }
}

#[test]
fn cooldown_denials_never_grow() {
    let (governor, clock) = auth_governor(1, 1000, 700);
    assert!(governor.check_admission(&auth()).is_allowed());

    let mut last = Duration::MAX;
    for t in (0..700).step_by(50) {
        clock.set(t);
        let wait = governor.check_admission(&auth()).retry_after().expect("still cooling down");
        assert!(wait <= last);
        assert!(wait > Duration::ZERO);
        last = wait;
    }

    clock.set(700);
    assert!(governor.check_admission(&auth()).is_allowed());
}

#[test]
fn server_rejection_outlasts_local_budget() {
    let (governor, clock) = auth_governor(50, 1000, 10);
    assert!(governor.check_admission(&auth()).is_allowed());

    governor.record_server_rejection(&auth(), Duration::from_millis(3000));
    for t in [0, 999, 1000, 2999] {
        clock.set(t);
        assert!(!governor.check_admission(&auth()).is_allowed(), "t={t}");
    }
    clock.set(3000);
    assert!(governor.check_admission(&auth()).is_allowed());
}

#[test]
fn server_rejection_creates_state_for_unseen_category() {
    let (governor, _clock) = auth_governor(5, 1000, 0);
    let reports = Category::new("reports");
    governor.record_server_rejection(&reports, Duration::from_millis(250));

    assert_eq!(
        governor.check_admission(&reports),
        Admission::Denied { retry_after: Duration::from_millis(250) }
    );
    let status = governor.status_of(&reports);
    assert!(status.blocked);
    assert_eq!(status.remaining, 0);
    // unknown categories run under the default policy
    assert_eq!(status.total, 100);
}

#[test]
fn status_snapshot_is_read_only() {
    let (governor, clock) = auth_governor(4, 1000, 200);
    governor.check_admission(&auth());
    clock.set(100);

    let first = governor.status();
    let second = governor.status();
    assert_eq!(first, second);
    assert_eq!(
        first.get(&auth()),
        Some(&CategoryStatus {
            remaining: 3,
            total: 4,
            reset_in: Duration::from_millis(900),
            blocked: false,
        })
    );
    // the status query consumed no budget
    for _ in 0..3 {
        assert!(governor.check_admission(&auth()).is_allowed());
    }
}

#[test]
fn status_lists_configured_categories_before_first_use() {
    let governor = RateGovernor::new(GovernorConfig::default())
        .expect("default config")
        .with_clock(ManualClock::new());
    let status = governor.status();

    for name in ["auth", "ai-inference", "bulk-data", "background-jobs", "default"] {
        let entry = status.get(&Category::new(name)).expect(name);
        assert_eq!(entry.remaining, entry.total);
        assert!(!entry.blocked);
    }
}

#[test]
fn status_serializes_for_diagnostics() {
    let (governor, _clock) = auth_governor(2, 1000, 500);
    governor.check_admission(&auth());
    governor.check_admission(&auth());
    governor.check_admission(&auth());

    let json = serde_json::to_value(governor.status()).expect("serializable");
    assert_eq!(
        json["auth"],
        serde_json::json!({"remaining": 0, "total": 2, "resetInMs": 500, "blocked": true})
    );
}

#[test]
fn reset_clears_a_single_category() {
    let config = GovernorConfig::empty()
        .with_policy("auth", policy(1, 1000, 1000))
        .with_policy("bulk-data", policy(1, 1000, 1000));
    let governor = RateGovernor::new(config).unwrap().with_clock(ManualClock::new());
    let bulk = Category::new("bulk-data");

    for category in [auth(), bulk.clone()] {
        governor.check_admission(&category);
        assert!(!governor.check_admission(&category).is_allowed());
    }

    governor.reset(&auth());
    assert!(governor.check_admission(&auth()).is_allowed());
    assert!(!governor.check_admission(&bulk).is_allowed());

    governor.reset_all();
    assert!(governor.check_admission(&bulk).is_allowed());
}

#[test]
fn concurrent_checks_never_over_admit() {
    let (governor, _clock) = auth_governor(25, 60_000, 1000);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let governor = governor.clone();
            std::thread::spawn(move || {
                (0..20).filter(|_| governor.check_admission(&Category::new("auth")).is_allowed()).count()
            })
        })
        .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 25);
}

use request_governor::{Category, ConfigError, GovernorConfig, RateGovernor};
use std::time::Duration;

const CONFIG: &str = r#"{
    "policies": {
        "auth": {"max_requests": 5, "window_ms": 60000, "cooldown_ms": 30000},
        "reports": {"max_requests": 2, "window_ms": 1000}
    },
    "rules": [
        {"pattern": "/Reports/", "category": "reports"},
        {"pattern": "/login", "category": "auth"}
    ],
    "server_default_cooldown_ms": 8000
}"#;

#[test]
fn loads_a_full_table_from_json() {
    let config = GovernorConfig::from_json_str(CONFIG).expect("valid config");
    let governor = RateGovernor::new(config).expect("governor");

    assert_eq!(governor.resolve("https://x.test/reports/daily"), Category::new("reports"));
    assert_eq!(governor.resolve("https://x.test/LOGIN"), Category::new("auth"));
    assert_eq!(governor.resolve("https://x.test/upload"), Category::default());

    let reports = governor.config().policy_for(&Category::new("reports"));
    assert_eq!(reports.max_requests(), 2);
    assert_eq!(reports.cooldown(), Duration::from_millis(1000));
    assert_eq!(governor.config().server_default_cooldown, Duration::from_millis(8000));
}

#[test]
fn config_serializes_back_to_the_same_table() {
    let config = GovernorConfig::from_json_str(CONFIG).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(GovernorConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn malformed_documents_are_rejected() {
    for doc in [
        r#"{"policies": {"auth": {"max_requests": 1, "window_ms": 0}}}"#,
        r#"{"rules": [{"pattern": "", "category": "auth"}]}"#,
        r#"{"policies": "nope"}"#,
    ] {
        assert!(GovernorConfig::from_json_str(doc).is_err(), "{doc}");
    }
    assert!(matches!(
        GovernorConfig::from_json_str(r#"{"rules": [{"pattern": "", "category": "auth"}]}"#),
        Err(ConfigError::EmptyPattern { .. })
    ));
}

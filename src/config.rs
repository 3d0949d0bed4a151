//! Static limit configuration.
//!
//! A [`GovernorConfig`] is handed to the governor at construction and never changes afterwards.
//! It carries the per-category [`LimitPolicy`] table, the fallback policy used for categories
//! without an entry, the classification rules, and the cooldown applied when a server rejects a
//! request without advertising `Retry-After`.
//!
//! Durations are expressed in milliseconds in serialized form:
//!
//! ```rust
//! use request_governor::GovernorConfig;
//!
//! let cfg = GovernorConfig::from_json_str(r#"{
//!     "policies": {
//!         "auth": { "max_requests": 2, "window_ms": 1000, "cooldown_ms": 500 }
//!     },
//!     "rules": [ { "pattern": "/auth", "category": "auth" } ]
//! }"#).unwrap();
//! assert_eq!(cfg.policy_for(&"auth".into()).max_requests(), 2);
//! ```

use crate::category::{builtin_rules, Category, CategoryResolver, CategoryRule};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cooldown used when a policy leaves it unspecified.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Cooldown applied after a server 429 that carries no usable `Retry-After`.
pub const DEFAULT_SERVER_COOLDOWN: Duration = Duration::from_millis(5000);

/// Per-category admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct LimitPolicy {
    max_requests: u32,
    window: Duration,
    cooldown: Duration,
}

impl LimitPolicy {
    /// Validated constructor: `max_requests > 0`, `window > 0`.
    pub fn new(max_requests: u32, window: Duration, cooldown: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self { max_requests, window, cooldown })
    }

    /// Same as [`LimitPolicy::new`] with the default cooldown.
    pub fn per_window(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
        Self::new(max_requests, window, DEFAULT_COOLDOWN)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub(crate) fn window_millis(&self) -> u64 {
        duration_millis(self.window)
    }

    pub(crate) fn cooldown_millis(&self) -> u64 {
        duration_millis(self.cooldown)
    }

    // Infallible shorthand for the built-in table; arguments are non-zero literals.
    const fn fixed(max_requests: u32, window_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_millis(window_ms),
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self::fixed(100, 60_000, 1_000)
    }
}

#[derive(Serialize, Deserialize)]
struct RawPolicy {
    max_requests: u32,
    window_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cooldown_ms: Option<u64>,
}

impl TryFrom<RawPolicy> for LimitPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let cooldown = raw.cooldown_ms.map(Duration::from_millis).unwrap_or(DEFAULT_COOLDOWN);
        LimitPolicy::new(raw.max_requests, Duration::from_millis(raw.window_ms), cooldown)
    }
}

impl From<LimitPolicy> for RawPolicy {
    fn from(p: LimitPolicy) -> Self {
        RawPolicy {
            max_requests: p.max_requests,
            window_ms: duration_millis(p.window),
            cooldown_ms: Some(duration_millis(p.cooldown)),
        }
    }
}

/// Complete governor configuration, immutable for the life of the governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Per-category policies.
    pub policies: BTreeMap<Category, LimitPolicy>,
    /// Classification rules in priority order.
    pub rules: Vec<CategoryRule>,
    /// Policy for any category missing from `policies`.
    pub default_policy: LimitPolicy,
    /// Cooldown used when a server 429 lacks `Retry-After`.
    #[serde(rename = "server_default_cooldown_ms", with = "millis")]
    pub server_default_cooldown: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        let policies = [
            (Category::AUTH, LimitPolicy::fixed(10, 60_000, 30_000)),
            (Category::AI_INFERENCE, LimitPolicy::fixed(20, 60_000, 10_000)),
            (Category::BULK_DATA, LimitPolicy::fixed(30, 60_000, 5_000)),
            (Category::BACKGROUND_JOBS, LimitPolicy::fixed(60, 60_000, 2_000)),
            (Category::DEFAULT, LimitPolicy::default()),
        ]
        .into_iter()
        .map(|(name, policy)| (Category::new(name), policy))
        .collect();

        Self {
            policies,
            rules: builtin_rules(),
            default_policy: LimitPolicy::default(),
            server_default_cooldown: DEFAULT_SERVER_COOLDOWN,
        }
    }
}

impl GovernorConfig {
    /// Empty table: every request falls into `default` under `default_policy`.
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
            rules: Vec::new(),
            default_policy: LimitPolicy::default(),
            server_default_cooldown: DEFAULT_SERVER_COOLDOWN,
        }
    }

    /// Parse and validate a JSON document. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Add or replace the policy for `category`.
    pub fn with_policy(mut self, category: impl Into<Category>, policy: LimitPolicy) -> Self {
        self.policies.insert(category.into(), policy);
        self
    }

    /// Append a classification rule (lowest priority so far).
    pub fn with_rule(mut self, pattern: impl Into<String>, category: impl Into<Category>) -> Self {
        self.rules.push(CategoryRule::new(pattern, category));
        self
    }

    pub fn with_default_policy(mut self, policy: LimitPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_server_default_cooldown(mut self, cooldown: Duration) -> Self {
        self.server_default_cooldown = cooldown;
        self
    }

    /// Policy for `category`, falling back to the `default` entry, then `default_policy`.
    pub fn policy_for(&self, category: &Category) -> &LimitPolicy {
        self.policies
            .get(category)
            .or_else(|| self.policies.get(Category::DEFAULT))
            .unwrap_or(&self.default_policy)
    }

    /// Check invariants that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.is_empty()) {
            return Err(ConfigError::EmptyPattern { category: rule.category.to_string() });
        }
        for policy in self.policies.values().chain(std::iter::once(&self.default_policy)) {
            LimitPolicy::new(policy.max_requests, policy.window, policy.cooldown)?;
        }
        Ok(())
    }

    pub(crate) fn resolver(&self) -> CategoryResolver {
        CategoryResolver::new(self.rules.iter().cloned())
    }
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(super::duration_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cooldown_defaults_to_one_second() {
        let cfg = GovernorConfig::from_json_str(
            r#"{"policies": {"auth": {"max_requests": 3, "window_ms": 1000}}}"#,
        )
        .unwrap();
        let policy = cfg.policy_for(&Category::new("auth"));
        assert_eq!(policy.max_requests(), 3);
        assert_eq!(policy.cooldown(), DEFAULT_COOLDOWN);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = GovernorConfig::from_json_str(
            r#"{"policies": {"auth": {"max_requests": 0, "window_ms": 1000}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        assert!(matches!(
            LimitPolicy::new(1, Duration::ZERO, Duration::ZERO),
            Err(ConfigError::ZeroWindow)
        ));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let cfg = GovernorConfig::empty().with_rule("", "auth");
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyPattern { .. })));
    }

    #[test]
    fn unknown_category_uses_default_entry() {
        let custom = LimitPolicy::new(7, Duration::from_secs(1), Duration::ZERO).unwrap();
        let cfg = GovernorConfig::empty().with_policy(Category::DEFAULT, custom);
        assert_eq!(cfg.policy_for(&Category::new("reports")).max_requests(), 7);

        let bare = GovernorConfig::empty();
        assert_eq!(*bare.policy_for(&Category::new("reports")), LimitPolicy::default());
    }

    #[test]
    fn server_default_cooldown_is_configurable() {
        let cfg = GovernorConfig::from_json_str(r#"{"server_default_cooldown_ms": 1200}"#).unwrap();
        assert_eq!(cfg.server_default_cooldown, Duration::from_millis(1200));
        assert!(!cfg.rules.is_empty(), "missing sections keep defaults");
    }

    #[test]
    fn default_table_covers_builtin_categories() {
        let cfg = GovernorConfig::default();
        let resolver = cfg.resolver();
        for rule in resolver.rules() {
            assert!(cfg.policies.contains_key(&rule.category), "no policy for {}", rule.category);
        }
    }
}

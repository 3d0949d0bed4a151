//! Traffic categories and the resolver that assigns one to every outbound request.
//!
//! Resolution is an ordered list of substring rules matched against the target address
//! (case-insensitive). The first rule that matches wins; an address no rule matches lands in
//! [`Category::DEFAULT`], so every request is classified.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Immutable traffic class key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Category(Arc<str>);

impl Category {
    pub const DEFAULT: &'static str = "default";
    pub const AUTH: &'static str = "auth";
    pub const BULK_DATA: &'static str = "bulk-data";
    pub const AI_INFERENCE: &'static str = "ai-inference";
    pub const BACKGROUND_JOBS: &'static str = "background-jobs";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The fallback category.
    pub fn default_category() -> Self {
        Self::new(Self::DEFAULT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        &*self.0 == Self::DEFAULT
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::default_category()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0.to_string()
    }
}

impl Borrow<str> for Category {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One `(pattern, category)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: Category,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<Category>) -> Self {
        Self { pattern: pattern.into(), category: category.into() }
    }
}

/// Ordered, first-match-wins mapping from target address to [`Category`].
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    // patterns are stored lowercased
    rules: Vec<CategoryRule>,
}

impl CategoryResolver {
    /// Build from rules in priority order.
    pub fn new(rules: impl IntoIterator<Item = CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| CategoryRule { pattern: r.pattern.to_ascii_lowercase(), category: r.category })
            .collect();
        Self { rules }
    }

    /// Built-in rule set.
    pub fn builtin() -> Self {
        Self::new(builtin_rules())
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Classify `target`. Pure and deterministic.
    pub fn resolve(&self, target: &str) -> Category {
        let target = target.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|rule| target.contains(rule.pattern.as_str()))
            .map(|rule| rule.category.clone())
            .unwrap_or_default()
    }
}

/// Default classification rules, highest priority first.
pub fn builtin_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("/auth", Category::AUTH),
        CategoryRule::new("/login", Category::AUTH),
        CategoryRule::new("/token", Category::AUTH),
        CategoryRule::new("/ai/", Category::AI_INFERENCE),
        CategoryRule::new("/chat", Category::AI_INFERENCE),
        CategoryRule::new("/completions", Category::AI_INFERENCE),
        CategoryRule::new("/upload", Category::BULK_DATA),
        CategoryRule::new("/export", Category::BULK_DATA),
        CategoryRule::new("/bulk", Category::BULK_DATA),
        CategoryRule::new("/sync", Category::BULK_DATA),
        CategoryRule::new("/jobs", Category::BACKGROUND_JOBS),
        CategoryRule::new("/tasks", Category::BACKGROUND_JOBS),
        CategoryRule::new("/worker", Category::BACKGROUND_JOBS),
    ]
}

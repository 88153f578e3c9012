//! Idempotency matchers over failure diagnostics

use regex::Regex;

/// Pattern for matching diagnostic text (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern.as_str()),
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

/// Named policy that reclassifies a failure as success.
///
/// A matcher with no patterns never matches.
#[derive(Debug, Clone)]
pub struct IdempotencyMatcher {
    name: &'static str,
    patterns: Vec<ConditionPattern>,
}

impl IdempotencyMatcher {
    pub fn new(name: &'static str, patterns: Vec<ConditionPattern>) -> Self {
        Self { name, patterns }
    }

    /// Every failure is fatal
    pub fn none() -> Self {
        Self::new("none", Vec::new())
    }

    /// Creating a resource that is already present
    pub fn already_exists() -> Self {
        Self::new(
            "already-exists",
            vec![ConditionPattern::Simple("already exists".to_string())],
        )
    }

    /// Deleting a resource that is already gone
    pub fn not_found() -> Self {
        Self::new(
            "not-found",
            vec![
                ConditionPattern::Simple("not found".to_string()),
                ConditionPattern::Simple("NotFound".to_string()),
            ],
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, diagnostic: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(diagnostic))
    }
}

impl Default for IdempotencyMatcher {
    fn default() -> Self {
        Self::none()
    }
}

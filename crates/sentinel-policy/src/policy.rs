//! Access policy definitions.
//!
//! A policy is an ordered list of rules. Each rule carries conditions that
//! must all hold for the rule to apply. Declaration order is the evaluation
//! order: the first matching rule determines the outcome.

use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::time_window::TimeWindow;

/// Profile pattern matching every profile.
pub const WILDCARD: &str = "*";

// ============================================================================
// Effect
// ============================================================================

/// The effect of a policy rule: allow or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Deny access (safe default).
    #[default]
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Conditions a request must satisfy for a rule to match.
///
/// Every present condition must hold (AND). An empty `profiles` or `users`
/// list places no constraint on that attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Profile patterns: exact names or `"*"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Exact usernames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Time-of-week window the request time must fall in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
}

impl Conditions {
    /// Conditions that match only the given profiles.
    pub fn for_profiles<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restricts the conditions to the given users (builder pattern).
    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the conditions to a time window (builder pattern).
    pub fn with_time(mut self, window: TimeWindow) -> Self {
        self.time = Some(window);
        self
    }

    /// True when no condition constrains anything beyond "any profile".
    pub fn is_unconditional(&self) -> bool {
        matches_any_profile(&self.profiles) && self.users.is_empty() && self.time.is_none()
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A single access rule within a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable name for audit logging.
    pub name: String,
    /// The effect when this rule matches.
    pub effect: Effect,
    /// All conditions must be true for this rule to match.
    #[serde(default)]
    pub conditions: Conditions,
    /// Optional explanation surfaced in decisions and audit entries.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, effect: Effect, conditions: Conditions) -> Self {
        Self {
            name: name.into(),
            effect,
            conditions,
            reason: String::new(),
        }
    }

    /// Attaches a reason (builder pattern).
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

// ============================================================================
// Policy
// ============================================================================

/// An ordered access policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Document schema version.
    pub version: String,
    /// The rules, evaluated in declaration order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Policy {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            rules: Vec::new(),
        }
    }

    /// Appends a rule (builder pattern).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Checks structural validity.
    ///
    /// - `version` is non-empty
    /// - at least one rule exists
    /// - rule names are non-empty and unique
    /// - every time window parses
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::Invalid("version is required".into()));
        }
        if self.rules.is_empty() {
            return Err(PolicyError::Invalid("at least one rule is required".into()));
        }

        let mut seen = HashSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            validate_rule_name(&rule.name, index, &mut seen)?;
            if let Some(window) = &rule.conditions.time {
                window.validate().map_err(|e| {
                    PolicyError::Invalid(format!("rule '{}': {e}", rule.name))
                })?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Rejects empty and duplicate rule names.
pub(crate) fn validate_rule_name<'a>(
    name: &'a str,
    index: usize,
    seen: &mut HashSet<&'a str>,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PolicyError::Invalid(format!("rule {index}: name is required")));
    }
    if !seen.insert(name) {
        return Err(PolicyError::Invalid(format!("duplicate rule name '{name}'")));
    }
    Ok(())
}

/// True if the pattern list matches `profile`.
///
/// An empty list or a `"*"` entry matches everything; other entries are
/// compared exactly.
pub(crate) fn profile_matches(patterns: &[String], profile: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p == WILDCARD || p == profile)
}

/// True if the pattern list matches every profile.
pub(crate) fn matches_any_profile(patterns: &[String]) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p == WILDCARD)
}

/// True if the user list admits `user` (empty list admits everyone).
pub(crate) fn user_matches(users: &[String], user: &str) -> bool {
    users.is_empty() || users.iter().any(|u| u == user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> Rule {
        Rule::new(name, Effect::Allow, Conditions::for_profiles(["dev"]))
    }

    #[test]
    fn test_effect_defaults_to_deny() {
        assert_eq!(Effect::default(), Effect::Deny);
        assert_eq!(Effect::Allow.to_string(), "allow");
    }

    #[test]
    fn test_validate_accepts_well_formed_policy() {
        let policy = Policy::new("1").with_rule(rule("a")).with_rule(rule("b"));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_version() {
        let policy = Policy::new(" ").with_rule(rule("a"));
        assert!(matches!(policy.validate(), Err(PolicyError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_rules() {
        assert!(Policy::new("1").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let policy = Policy::new("1").with_rule(rule("a")).with_rule(rule("a"));
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate rule name"));
    }

    #[test]
    fn test_profile_matching() {
        assert!(profile_matches(&[], "prod"));
        assert!(profile_matches(&["*".into()], "prod"));
        assert!(profile_matches(&["dev".into(), "prod".into()], "prod"));
        assert!(!profile_matches(&["dev".into()], "prod"));
        // Patterns are exact, not prefix
        assert!(!profile_matches(&["prod".into()], "production"));
    }

    #[test]
    fn test_unconditional() {
        assert!(Conditions::default().is_unconditional());
        assert!(Conditions::for_profiles(["*"]).is_unconditional());
        assert!(!Conditions::for_profiles(["prod"]).is_unconditional());
        assert!(!Conditions::for_profiles(["*"]).with_users(["alice"]).is_unconditional());
    }
}

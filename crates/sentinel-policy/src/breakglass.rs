//! Break-glass policy: who may invoke emergency access, for which profiles,
//! reasons, and how long.

use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::policy::{profile_matches, validate_rule_name};
use crate::time_window::TimeWindow;

/// Why emergency access was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonCode {
    /// Production incident response.
    Incident,
    /// Urgent unplanned maintenance.
    Maintenance,
    /// Security event response.
    Security,
    /// Disaster recovery.
    Recovery,
    /// Anything else; justification must carry the detail.
    Other,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 5] = [
        Self::Incident,
        Self::Maintenance,
        Self::Security,
        Self::Recovery,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Maintenance => "maintenance",
            Self::Security => "security",
            Self::Recovery => "recovery",
            Self::Other => "other",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownReasonCode(s.to_string()))
    }
}

/// One break-glass authorization rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakGlassPolicyRule {
    pub name: String,
    /// Profile patterns (exact or `"*"`); empty matches all profiles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Users allowed to invoke break-glass. Must be non-empty.
    pub users: Vec<String>,
    /// Permitted reason codes; empty permits all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_reason_codes: Vec<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
    /// Cap on event duration under this rule.
    #[serde(
        rename = "max_duration_secs",
        default,
        with = "sentinel_types::option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration: Option<TimeDelta>,
}

/// Ordered list of break-glass rules; the first rule covering a profile applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakGlassPolicy {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<BreakGlassPolicyRule>,
}

impl BreakGlassPolicy {
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
            if rule.users.is_empty() {
                return Err(PolicyError::Invalid(format!(
                    "rule '{}': at least one user is required",
                    rule.name
                )));
            }
            if let Some(window) = &rule.time {
                window.validate()?;
            }
            if rule.max_duration.is_some_and(|d| d <= TimeDelta::zero()) {
                return Err(PolicyError::Invalid(format!(
                    "rule '{}': max_duration must be positive",
                    rule.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the first rule covering `profile`.
    pub fn rule_for(&self, profile: &str) -> Option<&BreakGlassPolicyRule> {
        self.rules
            .iter()
            .find(|rule| profile_matches(&rule.profiles, profile))
    }
}

/// Checks whether `user` may invoke break-glass on `profile` for `reason`
/// at `now`.
///
/// Returns the authorizing rule, or `None` if the first rule covering the
/// profile does not admit the user, reason, or time.
pub fn can_invoke_break_glass<'a>(
    policy: &'a BreakGlassPolicy,
    user: &str,
    profile: &str,
    reason: ReasonCode,
    now: DateTime<Utc>,
) -> Option<&'a BreakGlassPolicyRule> {
    let rule = policy.rule_for(profile)?;

    if !rule.users.iter().any(|u| u == user) {
        return None;
    }
    if !rule.allowed_reason_codes.is_empty() && !rule.allowed_reason_codes.contains(&reason) {
        return None;
    }
    if rule.time.as_ref().is_some_and(|w| !w.contains(now)) {
        return None;
    }
    Some(rule)
}

//! Approval policy: who may approve access requests, and which requests
//! are approved automatically at creation time.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::policy::{profile_matches, validate_rule_name};
use crate::time_window::TimeWindow;

/// Constraints under which a pending request is approved without a human.
///
/// Every present constraint must hold. An empty `users` list admits any
/// requester, so validation insists on at least one other constraint in
/// that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoApproveCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
    #[serde(
        rename = "max_duration_secs",
        default,
        with = "sentinel_types::option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration: Option<TimeDelta>,
}

impl AutoApproveCondition {
    fn validate(&self) -> Result<()> {
        if self.users.is_empty() && self.time.is_none() && self.max_duration.is_none() {
            return Err(PolicyError::Invalid(
                "auto_approve must constrain users, time, or max_duration".into(),
            ));
        }
        if let Some(window) = &self.time {
            window.validate()?;
        }
        if self.max_duration.is_some_and(|d| d <= TimeDelta::zero()) {
            return Err(PolicyError::Invalid(
                "auto_approve max_duration must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One approval rule, scoped to a set of profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub name: String,
    /// Profile patterns (exact or `"*"`); empty matches all profiles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Users permitted to approve requests under this rule.
    pub approvers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve: Option<AutoApproveCondition>,
}

/// Ordered list of approval rules; the first rule covering a profile applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<ApprovalRule>,
}

impl ApprovalPolicy {
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
            if rule.approvers.is_empty() {
                return Err(PolicyError::Invalid(format!(
                    "rule '{}': at least one approver is required",
                    rule.name
                )));
            }
            if let Some(auto) = &rule.auto_approve {
                auto.validate()
                    .map_err(|e| PolicyError::Invalid(format!("rule '{}': {e}", rule.name)))?;
            }
        }
        Ok(())
    }
}

/// Returns the first approval rule covering `profile`.
pub fn find_approval_rule<'a>(policy: &'a ApprovalPolicy, profile: &str) -> Option<&'a ApprovalRule> {
    policy
        .rules
        .iter()
        .find(|rule| profile_matches(&rule.profiles, profile))
}

/// Returns true if `approver` is listed as an approver on `rule`.
pub fn can_approve(rule: &ApprovalRule, approver: &str) -> bool {
    rule.approvers.iter().any(|a| a == approver)
}

/// Decides whether a pending request qualifies for automatic approval.
///
/// Returns false when the rule has no auto-approve block, when `username`
/// is not a permitted user, when `now` falls outside the permitted window,
/// or when `duration` exceeds the permitted maximum.
pub fn should_auto_approve(
    rule: &ApprovalRule,
    username: &str,
    now: DateTime<Utc>,
    duration: TimeDelta,
) -> bool {
    let Some(auto) = &rule.auto_approve else {
        return false;
    };

    if !auto.users.is_empty() && !auto.users.iter().any(|u| u == username) {
        return false;
    }
    if let Some(window) = &auto.time {
        if !window.contains(now) {
            return false;
        }
    }
    if let Some(max) = auto.max_duration {
        if duration > max {
            return false;
        }
    }
    true
}

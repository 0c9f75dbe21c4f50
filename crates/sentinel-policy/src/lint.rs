//! Advisory policy linting.
//!
//! Lint findings are warnings only. They never fail loading, never change
//! evaluation, and never block credential issuance.

use std::collections::HashSet;
use std::fmt::Display;

use serde::Serialize;

use crate::policy::{Conditions, Effect, Policy, WILDCARD, matches_any_profile};

/// Kind of structural smell found in a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LintCode {
    /// An Allow rule precedes a Deny rule covering overlapping profiles, so
    /// the Deny never applies to the overlap.
    AllowBeforeDeny,
    /// An earlier rule matches every request, so this rule can never match.
    UnreachableRule,
    /// The same profile pattern appears twice in one rule.
    DuplicateProfile,
}

impl Display for LintCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AllowBeforeDeny => "allow-before-deny",
            Self::UnreachableRule => "unreachable-rule",
            Self::DuplicateProfile => "duplicate-profile",
        })
    }
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintWarning {
    pub code: LintCode,
    /// Index of the rule the warning is about.
    pub rule_index: usize,
    pub rule_name: String,
    pub message: String,
}

/// Runs every lint over `policy`, returning findings in rule order.
pub fn lint(policy: &Policy) -> Vec<LintWarning> {
    let mut warnings = Vec::new();

    for (index, rule) in policy.rules.iter().enumerate() {
        let mut seen = HashSet::new();
        for profile in &rule.conditions.profiles {
            if !seen.insert(profile.as_str()) {
                warnings.push(LintWarning {
                    code: LintCode::DuplicateProfile,
                    rule_index: index,
                    rule_name: rule.name.clone(),
                    message: format!("profile '{profile}' is listed more than once"),
                });
            }
        }

        let earlier = &policy.rules[..index];

        if let Some((shadow_index, shadow)) = earlier
            .iter()
            .enumerate()
            .find(|(_, r)| r.conditions.is_unconditional())
        {
            warnings.push(LintWarning {
                code: LintCode::UnreachableRule,
                rule_index: index,
                rule_name: rule.name.clone(),
                message: format!(
                    "rule '{}' (index {shadow_index}) matches every request; this rule is never reached",
                    shadow.name
                ),
            });
            continue;
        }

        if rule.effect == Effect::Deny {
            for (allow_index, allow) in earlier.iter().enumerate() {
                if allow.effect == Effect::Allow && overlaps(&allow.conditions, &rule.conditions) {
                    warnings.push(LintWarning {
                        code: LintCode::AllowBeforeDeny,
                        rule_index: index,
                        rule_name: rule.name.clone(),
                        message: format!(
                            "allow rule '{}' (index {allow_index}) precedes this deny rule for overlapping profiles",
                            allow.name
                        ),
                    });
                }
            }
        }
    }

    warnings
}

/// True if some request could satisfy both condition sets' profile and
/// user constraints. Time windows are ignored (conservative).
fn overlaps(a: &Conditions, b: &Conditions) -> bool {
    sets_overlap(&a.profiles, &b.profiles, matches_any_profile)
        && sets_overlap(&a.users, &b.users, <[String]>::is_empty)
}

fn sets_overlap(a: &[String], b: &[String], is_universal: fn(&[String]) -> bool) -> bool {
    if is_universal(a) || is_universal(b) {
        return true;
    }
    a.iter().any(|x| x != WILDCARD && b.contains(x))
}

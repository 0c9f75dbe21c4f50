//! Access policy evaluation engine.
//!
//! Evaluates a credential request against a policy by scanning rules in
//! declaration order. The first matching rule wins. If no rule matches, or
//! there is no policy or no request to evaluate, the result is Deny.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{Conditions, Effect, Policy, Rule, profile_matches, user_matches};

// ============================================================================
// Request
// ============================================================================

/// The input to policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Requesting user.
    pub user: String,
    /// Target credential profile.
    pub profile: String,
    /// When the request was made; drives time-window conditions.
    pub time: DateTime<Utc>,
}

impl Request {
    pub fn new(user: impl Into<String>, profile: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            profile: profile.into(),
            time,
        }
    }
}

// ============================================================================
// Decision
// ============================================================================

/// The result of evaluating a request against a policy.
///
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is allowed or denied.
    pub effect: Effect,
    /// The name of the rule that matched, or `None` for the default deny.
    pub matched_rule: Option<String>,
    /// Index of the matching rule, or `None` for the default deny.
    pub rule_index: Option<usize>,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
}

impl Decision {
    /// The fail-closed decision used when nothing matched.
    pub fn default_deny(reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Deny,
            matched_rule: None,
            rule_index: None,
            reason: reason.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// Matched rule name, or `""` for the default deny.
    pub fn rule_name(&self) -> &str {
        self.matched_rule.as_deref().unwrap_or("")
    }

    /// Rule index in the audit log's convention: `-1` means no rule matched.
    pub fn rule_index_i64(&self) -> i64 {
        self.rule_index
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(-1)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates a credential request against a policy.
///
/// # Postcondition
///
/// Always returns a `Decision`. `None` inputs and empty policies return
/// `{Deny, None, None}`; never Allow.
pub fn evaluate(policy: Option<&Policy>, request: Option<&Request>) -> Decision {
    let (Some(policy), Some(request)) = (policy, request) else {
        return Decision::default_deny("no policy or request to evaluate");
    };

    for (index, rule) in policy.rules.iter().enumerate() {
        if rule_matches(rule, request) {
            let reason = if rule.reason.is_empty() {
                format!("matched rule '{}' (index {index})", rule.name)
            } else {
                rule.reason.clone()
            };
            return Decision {
                effect: rule.effect,
                matched_rule: Some(rule.name.clone()),
                rule_index: Some(index),
                reason,
            };
        }
    }

    Decision::default_deny("no rule matched; default deny")
}

/// Returns true if every condition of `rule` holds for `request`.
pub fn rule_matches(rule: &Rule, request: &Request) -> bool {
    conditions_match(&rule.conditions, request)
}

fn conditions_match(conditions: &Conditions, request: &Request) -> bool {
    profile_matches(&conditions.profiles, &request.profile)
        && user_matches(&conditions.users, &request.user)
        && conditions
            .time
            .as_ref()
            .is_none_or(|window| window.contains(request.time))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_window::TimeWindow;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn wednesday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap()
    }

    fn saturday_night() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 11, 22, 0, 0).unwrap()
    }

    fn request(user: &str, profile: &str) -> Request {
        Request::new(user, profile, wednesday_morning())
    }

    fn allow(name: &str, profiles: &[&str]) -> Rule {
        Rule::new(
            name,
            Effect::Allow,
            Conditions::for_profiles(profiles.iter().copied()),
        )
    }

    fn deny(name: &str, profiles: &[&str]) -> Rule {
        Rule::new(
            name,
            Effect::Deny,
            Conditions::for_profiles(profiles.iter().copied()),
        )
    }

    fn assert_default_deny(decision: &Decision) {
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.rule_name(), "");
        assert_eq!(decision.rule_index_i64(), -1);
    }

    #[test]
    fn test_none_policy_denies() {
        assert_default_deny(&evaluate(None, Some(&request("alice", "dev"))));
    }

    #[test]
    fn test_none_request_denies() {
        let policy = Policy::new("1").with_rule(allow("all", &["*"]));
        assert_default_deny(&evaluate(Some(&policy), None));
    }

    #[test]
    fn test_none_both_denies() {
        assert_default_deny(&evaluate(None, None));
    }

    #[test]
    fn test_empty_policy_denies() {
        let policy = Policy::new("1");
        assert_default_deny(&evaluate(Some(&policy), Some(&request("alice", "dev"))));
    }

    #[test]
    fn test_no_match_denies() {
        let policy = Policy::new("1").with_rule(allow("dev-only", &["dev"]));
        assert_default_deny(&evaluate(Some(&policy), Some(&request("alice", "prod"))));
    }

    #[test]
    fn test_exact_profile_match() {
        let policy = Policy::new("1").with_rule(allow("dev-only", &["dev"]));
        let decision = evaluate(Some(&policy), Some(&request("alice", "dev")));
        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.matched_rule.as_deref(), Some("dev-only"));
        assert_eq!(decision.rule_index, Some(0));
    }

    #[test]
    fn test_wildcard_profile_match() {
        let policy = Policy::new("1").with_rule(allow("any", &["*"]));
        let decision = evaluate(Some(&policy), Some(&request("alice", "anything")));
        assert!(decision.is_allow());
    }

    #[test]
    fn test_first_match_wins() {
        // Rules 0 and 2 both match; rule 0 must win.
        let policy = Policy::new("1")
            .with_rule(deny("deny-prod", &["production"]))
            .with_rule(allow("allow-dev", &["dev"]))
            .with_rule(allow("allow-all", &["*"]));

        let decision = evaluate(Some(&policy), Some(&request("alice", "production")));
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.matched_rule.as_deref(), Some("deny-prod"));
        assert_eq!(decision.rule_index, Some(0));
    }

    #[test]
    fn test_declaration_order_not_effect_order() {
        // An earlier Allow beats a later Deny for the same profile.
        let policy = Policy::new("1")
            .with_rule(allow("allow-prod", &["production"]))
            .with_rule(deny("deny-prod", &["production"]));

        let decision = evaluate(Some(&policy), Some(&request("alice", "production")));
        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.rule_index, Some(0));
    }

    #[test]
    fn test_user_condition() {
        let policy = Policy::new("1").with_rule(Rule::new(
            "alice-prod",
            Effect::Allow,
            Conditions::for_profiles(["production"]).with_users(["alice"]),
        ));

        assert!(evaluate(Some(&policy), Some(&request("alice", "production"))).is_allow());
        assert_default_deny(&evaluate(Some(&policy), Some(&request("bob", "production"))));
    }

    #[test]
    fn test_time_condition() {
        let policy = Policy::new("1").with_rule(Rule::new(
            "business-hours",
            Effect::Allow,
            Conditions::for_profiles(["*"]).with_time(TimeWindow::business_hours()),
        ));

        let inside = Request::new("alice", "dev", wednesday_morning());
        let outside = Request::new("alice", "dev", saturday_night());
        assert!(evaluate(Some(&policy), Some(&inside)).is_allow());
        assert_default_deny(&evaluate(Some(&policy), Some(&outside)));
    }

    #[test]
    fn test_rule_reason_is_surfaced() {
        let policy = Policy::new("1")
            .with_rule(deny("deny-prod", &["production"]).with_reason("production requires approval"));
        let decision = evaluate(Some(&policy), Some(&request("alice", "production")));
        assert_eq!(decision.reason, "production requires approval");
    }

    fn arb_rule() -> impl Strategy<Value = Rule> {
        (
            "[a-z]{3,8}",
            prop::bool::ANY,
            prop::collection::vec(prop::sample::select(vec!["dev", "prod", "stage", "*"]), 0..3),
            prop::collection::vec(prop::sample::select(vec!["alice", "bob"]), 0..2),
        )
            .prop_map(|(name, allow, profiles, users)| {
                let effect = if allow { Effect::Allow } else { Effect::Deny };
                Rule::new(name, effect, Conditions::for_profiles(profiles).with_users(users))
            })
    }

    proptest! {
        /// Property: evaluation is pure (same inputs, same decision)
        #[test]
        fn prop_evaluate_is_deterministic(
            rules in prop::collection::vec(arb_rule(), 0..8),
            user in prop::sample::select(vec!["alice", "bob", "carol"]),
            profile in prop::sample::select(vec!["dev", "prod", "stage", "other"]),
        ) {
            let policy = Policy { version: "1".into(), rules };
            let req = request(user, profile);
            let first = evaluate(Some(&policy), Some(&req));
            for _ in 0..3 {
                prop_assert_eq!(&evaluate(Some(&policy), Some(&req)), &first);
            }
        }

        /// Property: the decision names the lowest-index matching rule
        #[test]
        fn prop_first_matching_rule_wins(
            rules in prop::collection::vec(arb_rule(), 0..8),
            user in prop::sample::select(vec!["alice", "bob", "carol"]),
            profile in prop::sample::select(vec!["dev", "prod", "stage", "other"]),
        ) {
            let policy = Policy { version: "1".into(), rules };
            let req = request(user, profile);
            let decision = evaluate(Some(&policy), Some(&req));

            let expected = policy.rules.iter().position(|r| rule_matches(r, &req));
            prop_assert_eq!(decision.rule_index, expected);
            match expected {
                Some(i) => prop_assert_eq!(decision.effect, policy.rules[i].effect),
                None => prop_assert_eq!(decision.effect, Effect::Deny),
            }
        }
    }
}

//! # sentinel-policy: Declarative access policy for Sentinel
//!
//! Decides whether a user may obtain credentials for a named profile.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Credential Request                          │
//! │  (user + profile + request time)             │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Evaluator                                   │
//! │  ├─ Scan rules in declaration order          │
//! │  ├─ Match profiles, users, time window       │
//! │  └─ First match wins, else default Deny      │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Effect (Allow/Deny)                       │
//! │  - Matched rule name and index               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is pure: no I/O, no clock reads, no shared state. An absent
//! policy, an empty policy, or an absent request all produce a Deny.
//!
//! Besides the access policy this crate also owns the approval policy
//! (who may approve, when requests auto-approve) and the break-glass policy
//! (who may invoke emergency access and for which reasons).
//!
//! ## Examples
//!
//! ```
//! use chrono::Utc;
//! use sentinel_policy::{evaluate, parse_policy, Effect, Request};
//!
//! let policy = parse_policy(r#"
//! version: "1"
//! rules:
//!   - name: deny-production
//!     effect: deny
//!     conditions:
//!       profiles: [production]
//!   - name: allow-everything-else
//!     effect: allow
//!     conditions:
//!       profiles: ["*"]
//! "#).unwrap();
//!
//! let request = Request::new("alice", "staging", Utc::now());
//! let decision = evaluate(Some(&policy), Some(&request));
//! assert_eq!(decision.effect, Effect::Allow);
//! assert_eq!(decision.rule_index, Some(1));
//! ```

pub mod approval;
pub mod breakglass;
mod error;
pub mod evaluator;
pub mod lint;
pub mod loader;
pub mod policy;
pub mod time_window;

pub use approval::{
    ApprovalPolicy, ApprovalRule, AutoApproveCondition, can_approve, find_approval_rule,
    should_auto_approve,
};
pub use breakglass::{BreakGlassPolicy, BreakGlassPolicyRule, ReasonCode, can_invoke_break_glass};
pub use error::{PolicyError, Result};
pub use evaluator::{Decision, Request, evaluate};
pub use lint::{LintCode, LintWarning, lint};
pub use loader::{
    load_approval_policy_file, load_break_glass_policy_file, load_policy_file,
    parse_approval_policy, parse_break_glass_policy, parse_policy,
};
pub use policy::{Conditions, Effect, Policy, Rule};
pub use time_window::{HourRange, TimeWindow, Weekday};

//! # sentinel-decision: Final authorization decisions for Sentinel
//!
//! Combines the policy engine with the override mechanisms that can turn a
//! policy denial into an allow.
//!
//! ```text
//! DecisionRequest
//!   │
//!   ▼
//! evaluate(policy) ── Allow ──────────────────────────┐
//!   │ Deny                                            │
//!   ▼                                                 │
//! OverrideResolver[0]  approval    ── found ──────────┤
//!   │ absent / lookup error                           │
//!   ▼                                                 │
//! OverrideResolver[1]  break-glass ── found ──────────┤
//!   │ absent / lookup error                           │
//!   ▼                                                 ▼
//! Deny                                        FinalDecision
//!                                                     │
//!                              DecisionAuditLog.append(entry)
//! ```
//!
//! Resolvers run strictly in order and the first grant stops the scan, so a
//! live approval means the break-glass store is never queried. A failed
//! lookup counts as "no override" and is reported in
//! [`FinalDecision::lookup_errors`]; it can never turn a Deny into an Allow.

mod decider;
mod error;
mod resolver;

pub use decider::{AuthorizationDecider, DecisionRequest, FinalDecision};
pub use error::DecisionError;
pub use resolver::{
    ApprovalOverride, BreakGlassOverride, DEFAULT_LOOKUP_LIMIT, OverrideGrant, OverrideKind,
    OverrideResolver,
};

#[cfg(test)]
mod tests;

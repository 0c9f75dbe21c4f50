//! The authorization decider.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_audit::{DecisionAuditLog, DecisionLogEntry, DriftChecker};
use sentinel_breakglass::BreakGlassStore;
use sentinel_policy::{Decision, Effect, Policy, Request, evaluate};
use sentinel_request::RequestStore;
use sentinel_types::{EventId, RequestId};
use tracing::{debug, info, warn};

use crate::error::DecisionError;
use crate::resolver::{
    ApprovalOverride, BreakGlassOverride, OverrideGrant, OverrideKind, OverrideResolver,
};

// ============================================================================
// Input
// ============================================================================

/// A credential request as seen by the decider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    pub user: String,
    pub profile: String,
    /// Evaluation time; also the instant overrides must be live at.
    pub time: DateTime<Utc>,
    /// Session length asked for, already capped by the caller.
    pub requested_duration: TimeDelta,
    /// Caller-side correlation ID, copied into the audit entry.
    pub request_id: Option<String>,
    pub source_identity: Option<String>,
    /// Target role; enables the drift check when a checker is configured.
    pub role_arn: Option<String>,
}

impl DecisionRequest {
    pub fn new(
        user: impl Into<String>,
        profile: impl Into<String>,
        time: DateTime<Utc>,
        requested_duration: TimeDelta,
    ) -> Self {
        Self {
            user: user.into(),
            profile: profile.into(),
            time,
            requested_duration,
            request_id: None,
            source_identity: None,
            role_arn: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_source_identity(mut self, source_identity: impl Into<String>) -> Self {
        self.source_identity = Some(source_identity.into());
        self
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// The policy engine's view of this request.
    pub fn policy_request(&self) -> Request {
        Request::new(self.user.clone(), self.profile.clone(), self.time)
    }
}

// ============================================================================
// Output
// ============================================================================

/// The outcome of [`AuthorizationDecider::decide`].
#[derive(Debug)]
pub struct FinalDecision {
    /// Allow if policy allowed or an override applied.
    pub effect: Effect,
    /// What the policy engine said, before overrides.
    pub policy_decision: Decision,
    /// The override that allowed a policy denial, if any.
    pub grant: Option<OverrideGrant>,
    /// Session length to issue; zero on Deny.
    pub effective_duration: TimeDelta,
    /// Lookups that failed and were treated as "no override".
    pub lookup_errors: Vec<DecisionError>,
    /// The record handed to the audit log.
    pub log_entry: DecisionLogEntry,
}

impl FinalDecision {
    pub fn is_allow(&self) -> bool {
        self.effect == Effect::Allow
    }

    pub fn override_kind(&self) -> Option<OverrideKind> {
        self.grant.as_ref().map(OverrideGrant::kind)
    }

    pub fn approved_request_id(&self) -> Option<&RequestId> {
        match &self.grant {
            Some(OverrideGrant::Approval { request_id, .. }) => Some(request_id),
            _ => None,
        }
    }

    pub fn break_glass_event_id(&self) -> Option<&EventId> {
        match &self.grant {
            Some(OverrideGrant::BreakGlass { event_id, .. }) => Some(event_id),
            _ => None,
        }
    }
}

// ============================================================================
// Decider
// ============================================================================

/// Evaluates policy, then consults override resolvers in order.
pub struct AuthorizationDecider {
    resolvers: Vec<Arc<dyn OverrideResolver>>,
    audit: DecisionAuditLog,
    drift_checker: Option<Arc<dyn DriftChecker>>,
    policy_path: String,
}

impl AuthorizationDecider {
    /// Creates a decider with an explicit, ordered resolver list.
    pub fn new(resolvers: Vec<Arc<dyn OverrideResolver>>) -> Self {
        Self {
            resolvers,
            audit: DecisionAuditLog::disabled(),
            drift_checker: None,
            policy_path: String::new(),
        }
    }

    /// Approval first, then break-glass.
    pub fn standard(
        request_store: Arc<dyn RequestStore>,
        break_glass_store: Arc<dyn BreakGlassStore>,
    ) -> Self {
        let resolvers: Vec<Arc<dyn OverrideResolver>> = vec![
            Arc::new(ApprovalOverride::new(request_store)),
            Arc::new(BreakGlassOverride::new(break_glass_store)),
        ];
        Self::new(resolvers)
    }

    pub fn with_audit_log(mut self, audit: DecisionAuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_drift_checker(mut self, checker: Arc<dyn DriftChecker>) -> Self {
        self.drift_checker = Some(checker);
        self
    }

    /// Path recorded as `policy_path` in every audit entry.
    pub fn with_policy_path(mut self, path: impl Into<String>) -> Self {
        self.policy_path = path.into();
        self
    }

    /// Decides `request` against `policy`.
    ///
    /// Always produces a decision. Lookup failures never allow; they are
    /// logged and returned in [`FinalDecision::lookup_errors`]. The audit
    /// append and the drift check cannot change the outcome.
    pub async fn decide(&self, policy: Option<&Policy>, request: &DecisionRequest) -> FinalDecision {
        let policy_decision = evaluate(policy, Some(&request.policy_request()));

        let mut lookup_errors = Vec::new();
        let grant = if policy_decision.is_allow() {
            None
        } else {
            self.resolve_override(request, &mut lookup_errors).await
        };

        let effect = if policy_decision.is_allow() || grant.is_some() {
            Effect::Allow
        } else {
            Effect::Deny
        };
        let effective_duration = match (&grant, effect) {
            (_, Effect::Deny) => TimeDelta::zero(),
            (Some(grant), Effect::Allow) => grant.effective_duration(request.requested_duration),
            (None, Effect::Allow) => request.requested_duration,
        };

        let log_entry = self
            .build_entry(request, &policy_decision, effect, grant.as_ref(), effective_duration)
            .await;
        self.audit.append(&log_entry);

        info!(
            user = %request.user,
            profile = %request.profile,
            effect = %effect,
            rule = %policy_decision.rule_name(),
            via = ?grant.as_ref().map(OverrideGrant::kind),
            duration_secs = effective_duration.num_seconds(),
            lookup_errors = lookup_errors.len(),
            "credential decision"
        );

        FinalDecision {
            effect,
            policy_decision,
            grant,
            effective_duration,
            lookup_errors,
            log_entry,
        }
    }

    async fn resolve_override(
        &self,
        request: &DecisionRequest,
        errors: &mut Vec<DecisionError>,
    ) -> Option<OverrideGrant> {
        for resolver in &self.resolvers {
            let kind = resolver.kind();
            match resolver.resolve(request).await {
                Ok(Some(grant)) => return Some(grant),
                Ok(None) => {
                    debug!(user = %request.user, profile = %request.profile, %kind, "no override");
                }
                Err(source) => {
                    warn!(
                        user = %request.user,
                        profile = %request.profile,
                        %kind,
                        error = %source,
                        "override lookup failed, treating as absent"
                    );
                    errors.push(DecisionError::Lookup { kind, source });
                }
            }
        }
        None
    }

    async fn build_entry(
        &self,
        request: &DecisionRequest,
        decision: &Decision,
        effect: Effect,
        grant: Option<&OverrideGrant>,
        duration: TimeDelta,
    ) -> DecisionLogEntry {
        let mut entry = DecisionLogEntry::new(&request.policy_request(), decision, &self.policy_path)
            .with_effect(effect);

        if let Some(id) = &request.request_id {
            entry = entry.with_request_id(id.clone());
        }
        if let Some(identity) = &request.source_identity {
            entry = entry.with_source_identity(identity.clone());
        }
        if effect == Effect::Allow {
            entry = entry.with_session_duration(duration);
        }
        match grant {
            Some(OverrideGrant::Approval { request_id, .. }) => {
                entry = entry.with_approved_request(request_id.clone());
            }
            Some(OverrideGrant::BreakGlass { event_id, .. }) => {
                entry = entry.with_break_glass_event(event_id.clone());
            }
            None => {}
        }

        if let Some(role_arn) = &request.role_arn {
            entry = entry.with_role_arn(role_arn.clone());
            if let Some(checker) = &self.drift_checker {
                entry = match checker.check_role(role_arn).await {
                    Ok(result) => entry.with_drift(&result),
                    Err(e) => {
                        warn!(role_arn = %role_arn, error = %e, "drift check failed");
                        entry.with_drift_error(&e)
                    }
                };
            }
        }
        entry
    }
}

impl std::fmt::Debug for AuthorizationDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationDecider")
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.kind()).collect::<Vec<_>>(),
            )
            .field("audit", &self.audit)
            .field("drift_checker", &self.drift_checker.is_some())
            .field("policy_path", &self.policy_path)
            .finish()
    }
}

//! The `Broker`: one handle over decisions, workflows, and sessions.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_audit::{
    ApprovalEvent, ApprovalLogEntry, BreakGlassLogEntry, BreakGlassLogEvent, DecisionAuditLog,
    BackgroundLogger, DriftChecker, FanoutLogger, JsonLinesLogger, Logger, TracingLogger,
};
use sentinel_breakglass::{
    BreakGlassError, BreakGlassEvent, BreakGlassStore, MemoryBreakGlassStore, RateLimitPolicy,
    ReasonCode, check_rate_limit,
};
use sentinel_config::{ConfigError, LoggingConfig, SentinelConfig};
use sentinel_decision::{
    ApprovalOverride, AuthorizationDecider, BreakGlassOverride, DecisionRequest, FinalDecision,
    OverrideResolver,
};
use sentinel_policy::{
    ApprovalPolicy, BreakGlassPolicy, Policy, can_approve, can_invoke_break_glass,
    find_approval_rule,
};
use sentinel_request::{
    MemoryRequestStore, Request, RequestError, RequestLimits, RequestStatus, RequestStore,
    submit_request,
};
use sentinel_session::{
    MemorySessionStore, RevokeInput, ServerSession, SessionManager, SessionStore,
};
use sentinel_types::{EventId, RequestId};
use tracing::info;

use crate::error::Result;

// ============================================================================
// Stores
// ============================================================================

/// Persistence backends the broker runs against.
#[derive(Clone)]
pub struct BrokerStores {
    pub requests: Arc<dyn RequestStore>,
    pub break_glass: Arc<dyn BreakGlassStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl BrokerStores {
    /// Process-local stores. Nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            requests: Arc::new(MemoryRequestStore::new()),
            break_glass: Arc::new(MemoryBreakGlassStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }
}

impl std::fmt::Debug for BrokerStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerStores").finish_non_exhaustive()
    }
}

// ============================================================================
// Config conversion
// ============================================================================

fn secs(value: u64, name: &str) -> std::result::Result<TimeDelta, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| ConfigError::Validation(format!("{name} is out of range: {value}s")))
}

fn request_limits(config: &SentinelConfig) -> std::result::Result<RequestLimits, ConfigError> {
    Ok(RequestLimits {
        max_duration: secs(config.approval.max_duration_secs, "approval.max_duration_secs")?,
        default_duration: secs(
            config.approval.default_duration_secs,
            "approval.default_duration_secs",
        )?,
        request_ttl: secs(config.approval.request_ttl_secs, "approval.request_ttl_secs")?,
    })
}

fn rate_limit_policy(config: &SentinelConfig) -> std::result::Result<RateLimitPolicy, ConfigError> {
    let bg = &config.break_glass;
    Ok(RateLimitPolicy {
        cooldown: match bg.cooldown_secs {
            0 => None,
            s => Some(secs(s, "break_glass.cooldown_secs")?),
        },
        max_per_user: (bg.max_per_user > 0).then_some(bg.max_per_user),
        quota_window: secs(bg.quota_window_secs, "break_glass.quota_window_secs")?,
    })
}

/// Builds the audit trail described by `config`: a JSON-lines file, a
/// `tracing` stream, both, or neither. The file is written from a
/// background thread.
pub fn audit_log_from_config(config: &LoggingConfig) -> Result<DecisionAuditLog> {
    let mut fanout = FanoutLogger::new();
    if let Some(path) = &config.decision_log {
        let file = Arc::new(JsonLinesLogger::open(path)?);
        fanout = fanout.with_sink(Arc::new(BackgroundLogger::spawn(file)?));
    }
    if config.stream {
        fanout = fanout.with_sink(Arc::new(TracingLogger));
    }

    Ok(match fanout.len() {
        0 => DecisionAuditLog::disabled(),
        _ => DecisionAuditLog::new(Arc::new(fanout) as Arc<dyn Logger>),
    })
}

// ============================================================================
// Broker
// ============================================================================

/// The outcome of [`Broker::authorize`].
#[derive(Debug)]
pub struct Authorization {
    pub decision: FinalDecision,
    /// The session opened for the issued credentials; `None` on Deny.
    pub session: Option<ServerSession>,
}

impl Authorization {
    pub fn is_allow(&self) -> bool {
        self.decision.is_allow()
    }
}

/// Arguments to [`Broker::invoke_break_glass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakGlassInvocation {
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    pub duration: TimeDelta,
}

/// Wires the stores, the decider, the session manager, and the audit
/// trail together.
pub struct Broker {
    config: SentinelConfig,
    stores: BrokerStores,
    decider: AuthorizationDecider,
    sessions: SessionManager,
    audit: DecisionAuditLog,
    request_limits: RequestLimits,
    rate_limit: RateLimitPolicy,
    break_glass_max: TimeDelta,
    session_default: TimeDelta,
    session_max: TimeDelta,
    approval_policy: Option<ApprovalPolicy>,
    break_glass_policy: Option<BreakGlassPolicy>,
}

impl Broker {
    /// Creates a broker with an explicit audit trail.
    pub fn new(config: SentinelConfig, stores: BrokerStores, audit: DecisionAuditLog) -> Result<Self> {
        config.validate()?;

        let resolvers: Vec<Arc<dyn OverrideResolver>> = vec![
            Arc::new(
                ApprovalOverride::new(stores.requests.clone())
                    .with_limit(config.approval.lookup_limit),
            ),
            Arc::new(
                BreakGlassOverride::new(stores.break_glass.clone())
                    .with_limit(config.break_glass.lookup_limit),
            ),
        ];
        let decider = AuthorizationDecider::new(resolvers)
            .with_audit_log(audit.clone())
            .with_policy_path(config.policy.path.display().to_string());

        Ok(Self {
            request_limits: request_limits(&config)?,
            rate_limit: rate_limit_policy(&config)?,
            break_glass_max: secs(config.break_glass.max_duration_secs, "break_glass.max_duration_secs")?,
            session_default: secs(config.session.default_duration_secs, "session.default_duration_secs")?,
            session_max: secs(config.session.max_duration_secs, "session.max_duration_secs")?,
            sessions: SessionManager::new(stores.sessions.clone()),
            decider,
            audit,
            stores,
            config,
            approval_policy: None,
            break_glass_policy: None,
        })
    }

    /// Creates a broker whose audit trail follows `config.logging`.
    pub fn from_config(config: SentinelConfig, stores: BrokerStores) -> Result<Self> {
        let audit = audit_log_from_config(&config.logging)?;
        Self::new(config, stores, audit)
    }

    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.approval_policy = Some(policy);
        self
    }

    pub fn with_break_glass_policy(mut self, policy: BreakGlassPolicy) -> Self {
        self.break_glass_policy = Some(policy);
        self
    }

    pub fn with_drift_checker(mut self, checker: Arc<dyn DriftChecker>) -> Self {
        self.decider = self.decider.with_drift_checker(checker);
        self
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn decider(&self) -> &AuthorizationDecider {
        &self.decider
    }

    // ------------------------------------------------------------------------
    // Credential decisions
    // ------------------------------------------------------------------------

    /// Decides `request` and, on Allow, opens a session for the effective
    /// duration.
    ///
    /// A zero requested duration means the configured session default; longer
    /// requests are clamped to the session maximum before deciding.
    pub async fn authorize(
        &self,
        policy: Option<&Policy>,
        mut request: DecisionRequest,
    ) -> Result<Authorization> {
        if request.requested_duration <= TimeDelta::zero() {
            request.requested_duration = self.session_default;
        }
        request.requested_duration = request.requested_duration.min(self.session_max);

        let decision = self.decider.decide(policy, &request).await;
        if !decision.is_allow() {
            return Ok(Authorization {
                decision,
                session: None,
            });
        }

        let session = self
            .sessions
            .issue(
                &request.user,
                &request.profile,
                &self.config.session.server_instance_id,
                request.source_identity.as_deref().unwrap_or_default(),
                decision.effective_duration,
                request.time,
            )
            .await?;

        Ok(Authorization {
            decision,
            session: Some(session),
        })
    }

    pub async fn revoke_session(&self, input: &RevokeInput, now: DateTime<Utc>) -> Result<ServerSession> {
        Ok(self.sessions.revoke(input, now).await?)
    }

    // ------------------------------------------------------------------------
    // Approval workflow
    // ------------------------------------------------------------------------

    /// Files an access request, auto-approving it when the approval policy
    /// allows.
    pub async fn submit_request(
        &self,
        requester: &str,
        profile: &str,
        justification: &str,
        duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        let request = Request::new(requester, profile, justification, duration, now, &self.request_limits)?;
        let request = submit_request(
            self.stores.requests.as_ref(),
            self.approval_policy.as_ref(),
            request,
            now,
        )
        .await?;

        self.audit
            .append_approval(&ApprovalLogEntry::new(ApprovalEvent::Created, &request, now));
        if request.status == RequestStatus::Approved {
            self.audit
                .append_approval(&ApprovalLogEntry::new(ApprovalEvent::AutoApproved, &request, now));
        }
        info!(
            request_id = %request.id,
            requester = %request.requester,
            profile = %request.profile,
            status = %request.status,
            "access request submitted"
        );
        Ok(request)
    }

    pub async fn approve_request(
        &self,
        id: &str,
        approver: &str,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        let mut request = self.load_request(id).await?;
        self.ensure_approver(&request, approver)?;
        request.approve(approver, comment, now)?;
        self.save_request(&request, ApprovalEvent::Approved, now).await?;
        Ok(request)
    }

    pub async fn deny_request(
        &self,
        id: &str,
        approver: &str,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        let mut request = self.load_request(id).await?;
        self.ensure_approver(&request, approver)?;
        request.deny(approver, comment, now)?;
        self.save_request(&request, ApprovalEvent::Denied, now).await?;
        Ok(request)
    }

    pub async fn cancel_request(&self, id: &str, requester: &str, now: DateTime<Utc>) -> Result<Request> {
        let mut request = self.load_request(id).await?;
        request.cancel(requester, now)?;
        self.save_request(&request, ApprovalEvent::Cancelled, now).await?;
        Ok(request)
    }

    async fn load_request(&self, id: &str) -> Result<Request> {
        let id = RequestId::parse(id).map_err(RequestError::from)?;
        let request = self.stores.requests.get(&id).await.map_err(RequestError::from)?;
        Ok(request)
    }

    async fn save_request(&self, request: &Request, event: ApprovalEvent, now: DateTime<Utc>) -> Result<()> {
        self.stores
            .requests
            .update(request)
            .await
            .map_err(RequestError::from)?;
        self.audit
            .append_approval(&ApprovalLogEntry::new(event, request, now));
        info!(
            request_id = %request.id,
            profile = %request.profile,
            status = %request.status,
            "access request updated"
        );
        Ok(())
    }

    /// Without an approval policy nobody is a recognized approver.
    fn ensure_approver(&self, request: &Request, approver: &str) -> Result<()> {
        let allowed = self
            .approval_policy
            .as_ref()
            .and_then(|policy| find_approval_rule(policy, &request.profile))
            .is_some_and(|rule| can_approve(rule, approver));
        if !allowed {
            return Err(RequestError::NotAnApprover {
                approver: approver.to_string(),
                profile: request.profile.clone(),
            }
            .into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Break-glass
    // ------------------------------------------------------------------------

    /// Opens a break-glass event.
    ///
    /// Requires a break-glass policy rule admitting the invoker, profile,
    /// reason, and time, then a passing rate-limit check. The event's
    /// duration is capped by the rule and the configured maximum.
    pub async fn invoke_break_glass(
        &self,
        invocation: &BreakGlassInvocation,
        now: DateTime<Utc>,
    ) -> Result<BreakGlassEvent> {
        let not_authorized = || BreakGlassError::NotAuthorized {
            user: invocation.invoker.clone(),
            profile: invocation.profile.clone(),
        };
        let policy = self.break_glass_policy.as_ref().ok_or_else(not_authorized)?;
        let rule = can_invoke_break_glass(
            policy,
            &invocation.invoker,
            &invocation.profile,
            invocation.reason_code,
            now,
        )
        .ok_or_else(not_authorized)?;

        let limit = check_rate_limit(
            self.stores.break_glass.as_ref(),
            &invocation.invoker,
            &self.rate_limit,
            now,
            self.config.break_glass.lookup_limit,
        )
        .await
        .map_err(BreakGlassError::from)?;
        if !limit.allowed {
            return Err(BreakGlassError::RateLimited(limit.reason).into());
        }

        let max_duration = rule
            .max_duration
            .map_or(self.break_glass_max, |d| d.min(self.break_glass_max));
        let event = BreakGlassEvent::new(
            invocation.invoker.as_str(),
            invocation.profile.as_str(),
            invocation.reason_code,
            invocation.justification.as_str(),
            invocation.duration,
            now,
            max_duration,
        )?;
        self.stores
            .break_glass
            .create(&event)
            .await
            .map_err(BreakGlassError::from)?;

        self.audit.append_break_glass(&BreakGlassLogEntry::new(
            BreakGlassLogEvent::Invoked,
            &event,
            now,
        ));
        info!(
            event_id = %event.id,
            invoker = %event.invoker,
            profile = %event.profile,
            reason_code = %event.reason_code,
            expires_at = %event.expires_at,
            rule = %rule.name,
            "break-glass invoked"
        );
        Ok(event)
    }

    pub async fn close_break_glass(
        &self,
        id: &str,
        closed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BreakGlassEvent> {
        let id = EventId::parse(id).map_err(BreakGlassError::from)?;
        let mut event = self
            .stores
            .break_glass
            .get(&id)
            .await
            .map_err(BreakGlassError::from)?;
        event.close(closed_by, reason, now)?;
        self.stores
            .break_glass
            .update(&event)
            .await
            .map_err(BreakGlassError::from)?;

        self.audit.append_break_glass(&BreakGlassLogEntry::new(
            BreakGlassLogEvent::Closed,
            &event,
            now,
        ));
        info!(event_id = %event.id, closed_by, "break-glass closed");
        Ok(event)
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("audit", &self.audit)
            .field("approval_policy", &self.approval_policy.is_some())
            .field("break_glass_policy", &self.break_glass_policy.is_some())
            .finish_non_exhaustive()
    }
}

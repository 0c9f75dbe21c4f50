//! Decider scenarios against counting in-memory stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sentinel_audit::{
    ApprovalLogEntry, BreakGlassLogEntry, DecisionAuditLog, DecisionLogEntry, DriftCheckError,
    DriftCheckResult, DriftChecker, DriftStatus, Logger,
};
use sentinel_breakglass::{
    BreakGlassEvent, BreakGlassStore, DEFAULT_MAX_DURATION, MemoryBreakGlassStore, ReasonCode,
};
use sentinel_policy::{Conditions, Effect, Policy, Rule};
use sentinel_request::{MemoryRequestStore, Request, RequestLimits, RequestStatus, RequestStore};
use sentinel_types::{EventId, RequestId, StoreError};
use test_case::test_case;

use crate::*;

// ============================================================================
// Fixtures
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap()
}

fn deny_production() -> Policy {
    Policy::new("1")
        .with_rule(Rule::new(
            "deny-production",
            Effect::Deny,
            Conditions::for_profiles(["production"]),
        ))
        .with_rule(Rule::new(
            "allow-dev",
            Effect::Allow,
            Conditions::for_profiles(["dev"]),
        ))
}

fn ask(profile: &str, duration: TimeDelta) -> DecisionRequest {
    DecisionRequest::new("alice", profile, now(), duration)
}

/// Counts calls and can be switched to fail.
#[derive(Default)]
struct CountingRequests {
    inner: MemoryRequestStore,
    lists: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl RequestStore for CountingRequests {
    async fn create(&self, request: &Request) -> Result<(), StoreError> {
        self.inner.create(request).await
    }
    async fn get(&self, id: &RequestId) -> Result<Request, StoreError> {
        self.inner.get(id).await
    }
    async fn update(&self, request: &Request) -> Result<(), StoreError> {
        self.inner.update(request).await
    }
    async fn list_by_requester(&self, requester: &str, limit: usize) -> Result<Vec<Request>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::backend("throttled"));
        }
        self.inner.list_by_requester(requester, limit).await
    }
    async fn list_by_status(&self, status: RequestStatus, limit: usize) -> Result<Vec<Request>, StoreError> {
        self.inner.list_by_status(status, limit).await
    }
}

#[derive(Default)]
struct CountingBreakGlass {
    inner: MemoryBreakGlassStore,
    lists: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl BreakGlassStore for CountingBreakGlass {
    async fn create(&self, event: &BreakGlassEvent) -> Result<(), StoreError> {
        self.inner.create(event).await
    }
    async fn get(&self, id: &EventId) -> Result<BreakGlassEvent, StoreError> {
        self.inner.get(id).await
    }
    async fn update(&self, event: &BreakGlassEvent) -> Result<(), StoreError> {
        self.inner.update(event).await
    }
    async fn list_by_invoker(&self, invoker: &str, limit: usize) -> Result<Vec<BreakGlassEvent>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection reset"));
        }
        self.inner.list_by_invoker(invoker, limit).await
    }
}

struct Harness {
    requests: Arc<CountingRequests>,
    break_glass: Arc<CountingBreakGlass>,
    decider: AuthorizationDecider,
}

fn harness() -> Harness {
    let requests = Arc::new(CountingRequests::default());
    let break_glass = Arc::new(CountingBreakGlass::default());
    let decider = AuthorizationDecider::standard(requests.clone(), break_glass.clone())
        .with_policy_path("/etc/sentinel/policy.yaml");
    Harness {
        requests,
        break_glass,
        decider,
    }
}

async fn seed_approval(store: &CountingRequests, created: DateTime<Utc>) -> RequestId {
    let mut request = Request::new(
        "alice",
        "production",
        "rolling out the payments migration",
        TimeDelta::hours(2),
        created,
        &RequestLimits::default(),
    )
    .unwrap();
    request.approve("lead", "approved", created).unwrap();
    store.create(&request).await.unwrap();
    request.id
}

async fn seed_break_glass(store: &CountingBreakGlass, remaining: TimeDelta) -> EventId {
    let grant = TimeDelta::hours(3);
    let event = BreakGlassEvent::new(
        "alice",
        "production",
        ReasonCode::Incident,
        "checkout returning 500s for all customers",
        grant,
        now() - (grant - remaining),
        DEFAULT_MAX_DURATION,
    )
    .unwrap();
    store.create(&event).await.unwrap();
    event.id
}

// ============================================================================
// Policy outcome
// ============================================================================

#[tokio::test]
async fn test_policy_allow_skips_overrides() {
    let h = harness();
    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("dev", TimeDelta::hours(1)))
        .await;

    assert!(decision.is_allow());
    assert!(decision.grant.is_none());
    assert_eq!(decision.effective_duration, TimeDelta::hours(1));
    assert_eq!(h.requests.lists.load(Ordering::SeqCst), 0);
    assert_eq!(h.break_glass.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deny_without_overrides() {
    let h = harness();
    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert_eq!(decision.effect, Effect::Deny);
    assert_eq!(decision.policy_decision.rule_name(), "deny-production");
    assert_eq!(decision.effective_duration, TimeDelta::zero());
    assert_eq!(h.requests.lists.load(Ordering::SeqCst), 1);
    assert_eq!(h.break_glass.lists.load(Ordering::SeqCst), 1);
    assert!(decision.lookup_errors.is_empty());
}

#[tokio::test]
async fn test_absent_policy_denies() {
    let h = harness();
    let decision = h.decider.decide(None, &ask("dev", TimeDelta::hours(1))).await;
    assert_eq!(decision.effect, Effect::Deny);
    assert_eq!(decision.log_entry.rule_index, -1);
    assert_eq!(decision.log_entry.rule, "");
}

// ============================================================================
// Overrides
// ============================================================================

#[tokio::test]
async fn test_approval_allows_denied_profile() {
    let h = harness();
    let approved = seed_approval(&h.requests, now() - TimeDelta::minutes(30)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert!(decision.is_allow());
    assert_eq!(decision.override_kind(), Some(OverrideKind::Approval));
    assert_eq!(decision.approved_request_id(), Some(&approved));
    assert!(decision.break_glass_event_id().is_none());
    assert_eq!(decision.effective_duration, TimeDelta::hours(1));
    assert_eq!(decision.log_entry.approved_request_id, Some(approved));
    assert!(decision.log_entry.break_glass_event_id.is_none());
    assert_eq!(decision.log_entry.effect, Effect::Allow);
    assert_eq!(decision.log_entry.rule, "deny-production");
}

#[tokio::test]
async fn test_approval_caps_duration_at_approved_length() {
    let h = harness();
    seed_approval(&h.requests, now() - TimeDelta::minutes(30)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(12)))
        .await;

    assert_eq!(decision.override_kind(), Some(OverrideKind::Approval));
    assert_eq!(decision.effective_duration, TimeDelta::hours(2));
    assert_eq!(decision.log_entry.session_duration_seconds, Some(7200));
}

#[test_case(TimeDelta::minutes(10), TimeDelta::minutes(10) ; "shorter request kept")]
#[test_case(TimeDelta::hours(2), TimeDelta::hours(2) ; "equal to approval")]
#[test_case(TimeDelta::hours(5), TimeDelta::hours(2) ; "longer request capped")]
fn test_approval_grant_effective_duration(requested: TimeDelta, expected: TimeDelta) {
    let grant = OverrideGrant::Approval {
        request_id: RequestId::parse("0123456789abcdef").unwrap(),
        duration: TimeDelta::hours(2),
    };
    assert_eq!(grant.effective_duration(requested), expected);
}

#[test_case(TimeDelta::minutes(10), TimeDelta::minutes(10) ; "shorter request kept")]
#[test_case(TimeDelta::hours(1), TimeDelta::minutes(30) ; "longer request capped")]
fn test_break_glass_grant_effective_duration(requested: TimeDelta, expected: TimeDelta) {
    let grant = OverrideGrant::BreakGlass {
        event_id: EventId::parse("0123456789abcdef").unwrap(),
        remaining: TimeDelta::minutes(30),
    };
    assert_eq!(grant.effective_duration(requested), expected);
}

#[tokio::test]
async fn test_live_approval_short_circuits_break_glass() {
    let h = harness();
    seed_approval(&h.requests, now() - TimeDelta::minutes(30)).await;
    seed_break_glass(&h.break_glass, TimeDelta::minutes(90)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert_eq!(decision.override_kind(), Some(OverrideKind::Approval));
    assert_eq!(h.break_glass.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_break_glass_caps_duration() {
    let h = harness();
    let event_id = seed_break_glass(&h.break_glass, TimeDelta::minutes(30)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert!(decision.is_allow());
    assert_eq!(decision.break_glass_event_id(), Some(&event_id));
    assert!(decision.approved_request_id().is_none());
    assert_eq!(decision.effective_duration, TimeDelta::minutes(30));
    assert_eq!(decision.log_entry.session_duration_seconds, Some(1800));
}

#[tokio::test]
async fn test_break_glass_remaining_90m_requested_2h() {
    let h = harness();
    seed_break_glass(&h.break_glass, TimeDelta::minutes(90)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(2)))
        .await;

    assert_eq!(decision.override_kind(), Some(OverrideKind::BreakGlass));
    assert_eq!(decision.effective_duration, TimeDelta::minutes(90));
}

#[tokio::test]
async fn test_break_glass_shorter_request_not_extended() {
    let h = harness();
    seed_break_glass(&h.break_glass, TimeDelta::minutes(90)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::minutes(15)))
        .await;
    assert_eq!(decision.effective_duration, TimeDelta::minutes(15));
}

#[tokio::test]
async fn test_expired_approval_falls_through_to_break_glass() {
    let h = harness();
    seed_approval(&h.requests, now() - TimeDelta::hours(30)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert_eq!(decision.effect, Effect::Deny);
    assert_eq!(h.break_glass.lists.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Fail-closed on lookup errors
// ============================================================================

#[tokio::test]
async fn test_request_store_error_still_tries_break_glass() {
    let h = harness();
    h.requests.fail.store(true, Ordering::SeqCst);
    seed_break_glass(&h.break_glass, TimeDelta::minutes(45)).await;

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert!(decision.is_allow());
    assert_eq!(decision.override_kind(), Some(OverrideKind::BreakGlass));
    assert_eq!(decision.lookup_errors.len(), 1);
    assert!(matches!(
        decision.lookup_errors[0],
        DecisionError::Lookup {
            kind: OverrideKind::Approval,
            ..
        }
    ));
}

#[tokio::test]
async fn test_all_lookups_failing_denies() {
    let h = harness();
    seed_approval(&h.requests, now()).await;
    seed_break_glass(&h.break_glass, TimeDelta::minutes(45)).await;
    h.requests.fail.store(true, Ordering::SeqCst);
    h.break_glass.fail.store(true, Ordering::SeqCst);

    let decision = h
        .decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert_eq!(decision.effect, Effect::Deny);
    assert!(decision.grant.is_none());
    assert_eq!(decision.lookup_errors.len(), 2);
    assert!(decision.lookup_errors[1].to_string().contains("break-glass"));
}

// ============================================================================
// Audit and drift
// ============================================================================

#[derive(Default)]
struct Capture {
    decisions: std::sync::Mutex<Vec<DecisionLogEntry>>,
}

impl Logger for Capture {
    fn log_decision(&self, entry: &DecisionLogEntry) {
        self.decisions.lock().unwrap().push(entry.clone());
    }
    fn log_approval(&self, _: &ApprovalLogEntry) {}
    fn log_break_glass(&self, _: &BreakGlassLogEntry) {}
}

struct FixedDrift(Result<DriftStatus, String>);

#[async_trait]
impl DriftChecker for FixedDrift {
    async fn check_role(&self, _: &str) -> Result<DriftCheckResult, DriftCheckError> {
        match &self.0 {
            Ok(status) => Ok(DriftCheckResult {
                status: *status,
                message: String::new(),
            }),
            Err(msg) => Err(DriftCheckError::Unavailable(msg.clone())),
        }
    }
}

#[tokio::test]
async fn test_every_decision_is_audited() {
    let capture = Arc::new(Capture::default());
    let h = harness();
    let decider = h.decider.with_audit_log(DecisionAuditLog::new(capture.clone()));

    decider
        .decide(Some(&deny_production()), &ask("dev", TimeDelta::hours(1)))
        .await;
    decider
        .decide(
            Some(&deny_production()),
            &ask("production", TimeDelta::hours(1)).with_request_id("cli-7"),
        )
        .await;

    let logged = capture.decisions.lock().unwrap();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].effect, Effect::Allow);
    assert_eq!(logged[0].policy_path, "/etc/sentinel/policy.yaml");
    assert_eq!(logged[1].effect, Effect::Deny);
    assert_eq!(logged[1].request_id.as_deref(), Some("cli-7"));
    assert!(logged[1].session_duration_seconds.is_none());
}

#[tokio::test]
async fn test_drift_error_recorded_not_fatal() {
    let h = harness();
    let decider = h
        .decider
        .with_drift_checker(Arc::new(FixedDrift(Err("iam unavailable".into()))));

    let decision = decider
        .decide(
            Some(&deny_production()),
            &ask("dev", TimeDelta::hours(1)).with_role_arn("arn:aws:iam::123456789012:role/dev"),
        )
        .await;

    assert!(decision.is_allow());
    assert_eq!(decision.log_entry.drift_status, Some(DriftStatus::Unknown));
    assert!(decision.log_entry.drift_message.as_deref().unwrap().contains("iam unavailable"));
}

#[tokio::test]
async fn test_drift_none_does_not_deny() {
    let h = harness();
    let decider = h.decider.with_drift_checker(Arc::new(FixedDrift(Ok(DriftStatus::None))));

    let decision = decider
        .decide(
            Some(&deny_production()),
            &ask("dev", TimeDelta::hours(1)).with_role_arn("arn:aws:iam::123456789012:role/dev"),
        )
        .await;

    assert!(decision.is_allow());
    assert_eq!(decision.log_entry.drift_status, Some(DriftStatus::None));
}

#[tokio::test]
async fn test_drift_skipped_without_role() {
    let h = harness();
    let decider = h.decider.with_drift_checker(Arc::new(FixedDrift(Ok(DriftStatus::Ok))));
    let decision = decider
        .decide(Some(&deny_production()), &ask("dev", TimeDelta::hours(1)))
        .await;
    assert!(decision.log_entry.drift_status.is_none());
}

// ============================================================================
// Extensibility
// ============================================================================

struct AlwaysGrant;

#[async_trait]
impl OverrideResolver for AlwaysGrant {
    fn kind(&self) -> OverrideKind {
        OverrideKind::Approval
    }

    async fn resolve(&self, _: &DecisionRequest) -> Result<Option<OverrideGrant>, StoreError> {
        Ok(Some(OverrideGrant::Approval {
            request_id: RequestId::parse("feedfacecafebeef").unwrap(),
            duration: TimeDelta::hours(8),
        }))
    }
}

#[tokio::test]
async fn test_custom_resolver_order() {
    let break_glass = Arc::new(CountingBreakGlass::default());
    let resolvers: Vec<Arc<dyn OverrideResolver>> = vec![
        Arc::new(AlwaysGrant),
        Arc::new(BreakGlassOverride::new(break_glass.clone())),
    ];
    let decider = AuthorizationDecider::new(resolvers);

    let decision = decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;

    assert!(decision.is_allow());
    assert_eq!(break_glass.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_resolvers_denies() {
    let decider = AuthorizationDecider::new(Vec::new());
    let decision = decider
        .decide(Some(&deny_production()), &ask("production", TimeDelta::hours(1)))
        .await;
    assert_eq!(decision.effect, Effect::Deny);
}

//! Audit record layouts.
//!
//! Optional fields are omitted from the JSON when unset. Durations are
//! written as whole seconds.

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_breakglass::{BreakGlassEvent, ReasonCode};
use sentinel_policy::{Decision, Effect, Request};
use sentinel_request::{Request as AccessRequest, RequestStatus};
use sentinel_types::{EventId, RequestId};
use serde::{Deserialize, Serialize};

use crate::drift::{DriftCheckError, DriftCheckResult, DriftStatus};

// ============================================================================
// Decision entries
// ============================================================================

/// One credential decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub profile: String,
    pub effect: Effect,
    /// Matched rule name; empty for the default deny.
    pub rule: String,
    /// Matched rule index; `-1` for the default deny.
    pub rule_index: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub policy_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_glass_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_status: Option<DriftStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_message: Option<String>,
}

impl DecisionLogEntry {
    /// Builds an entry from the evaluated request and its policy decision.
    ///
    /// The timestamp is the request time.
    pub fn new(request: &Request, decision: &Decision, policy_path: impl Into<String>) -> Self {
        Self {
            timestamp: request.time,
            user: request.user.clone(),
            profile: request.profile.clone(),
            effect: decision.effect,
            rule: decision.rule_name().to_string(),
            rule_index: decision.rule_index_i64(),
            reason: decision.reason.clone(),
            policy_path: policy_path.into(),
            request_id: None,
            source_identity: None,
            role_arn: None,
            session_duration_seconds: None,
            approved_request_id: None,
            break_glass_event_id: None,
            drift_status: None,
            drift_message: None,
        }
    }

    /// Overrides the recorded effect, used when an override allowed a
    /// policy denial.
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
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

    pub fn with_session_duration(mut self, duration: TimeDelta) -> Self {
        self.session_duration_seconds = Some(duration.num_seconds());
        self
    }

    pub fn with_approved_request(mut self, id: RequestId) -> Self {
        self.approved_request_id = Some(id);
        self
    }

    pub fn with_break_glass_event(mut self, id: EventId) -> Self {
        self.break_glass_event_id = Some(id);
        self
    }

    /// Records a completed drift check.
    pub fn with_drift(mut self, result: &DriftCheckResult) -> Self {
        self.drift_status = Some(result.status);
        self.drift_message = (!result.message.is_empty()).then(|| result.message.clone());
        self
    }

    /// Records a drift check that could not complete.
    pub fn with_drift_error(mut self, error: &DriftCheckError) -> Self {
        self.drift_status = Some(DriftStatus::Unknown);
        self.drift_message = Some(error.to_string());
        self
    }
}

// ============================================================================
// Approval workflow entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalEvent {
    #[serde(rename = "request.created")]
    Created,
    #[serde(rename = "request.approved")]
    Approved,
    #[serde(rename = "request.denied")]
    Denied,
    #[serde(rename = "request.cancelled")]
    Cancelled,
    #[serde(rename = "request.auto_approved")]
    AutoApproved,
}

/// One approval workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: ApprovalEvent,
    pub request_id: RequestId,
    pub requester: String,
    pub profile: String,
    pub status: RequestStatus,
    pub justification: String,
    pub duration_seconds: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approver_comment: String,
}

impl ApprovalLogEntry {
    /// Snapshots `request` as it stands after `event`.
    pub fn new(event: ApprovalEvent, request: &AccessRequest, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event,
            request_id: request.id.clone(),
            requester: request.requester.clone(),
            profile: request.profile.clone(),
            status: request.status,
            justification: request.justification.clone(),
            duration_seconds: request.duration.num_seconds(),
            expires_at: request.expires_at,
            approver: request.approver.clone(),
            approver_comment: request.approver_comment.clone(),
        }
    }
}

// ============================================================================
// Break-glass entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakGlassLogEvent {
    #[serde(rename = "breakglass.invoked")]
    Invoked,
    #[serde(rename = "breakglass.closed")]
    Closed,
}

/// One break-glass lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakGlassLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: BreakGlassLogEvent,
    pub event_id: EventId,
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    pub duration_seconds: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub closed_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub closed_reason: String,
}

impl BreakGlassLogEntry {
    pub fn new(event: BreakGlassLogEvent, bg: &BreakGlassEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event,
            event_id: bg.id.clone(),
            invoker: bg.invoker.clone(),
            profile: bg.profile.clone(),
            reason_code: bg.reason_code,
            justification: bg.justification.clone(),
            duration_seconds: bg.duration.num_seconds(),
            expires_at: bg.expires_at,
            closed_by: bg.closed_by.clone(),
            closed_reason: bg.closed_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sentinel_request::RequestLimits;
    use serde_json::Value;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
    }

    fn denied_entry() -> DecisionLogEntry {
        let request = Request::new("alice", "production", at());
        DecisionLogEntry::new(&request, &Decision::default_deny("no rule matched"), "/etc/sentinel/policy.yaml")
    }

    #[test]
    fn test_default_deny_entry_shape() {
        let json: Value = serde_json::to_value(denied_entry()).unwrap();

        assert_eq!(json["user"], "alice");
        assert_eq!(json["profile"], "production");
        assert_eq!(json["effect"], "deny");
        assert_eq!(json["rule"], "");
        assert_eq!(json["rule_index"], -1);
        assert_eq!(json["policy_path"], "/etc/sentinel/policy.yaml");
        for absent in [
            "request_id",
            "source_identity",
            "role_arn",
            "session_duration_seconds",
            "approved_request_id",
            "break_glass_event_id",
            "drift_status",
            "drift_message",
        ] {
            assert!(json.get(absent).is_none(), "{absent} should be omitted");
        }
    }

    #[test]
    fn test_optional_fields_written_when_set() {
        let entry = denied_entry()
            .with_effect(Effect::Allow)
            .with_request_id("req-1")
            .with_source_identity("sentinel:alice:abc")
            .with_role_arn("arn:aws:iam::123456789012:role/prod")
            .with_session_duration(TimeDelta::minutes(30))
            .with_break_glass_event(EventId::parse("00000000000000ff").unwrap())
            .with_drift(&DriftCheckResult {
                status: DriftStatus::Partial,
                message: "trust policy allows unstamped sessions".into(),
            });
        let json: Value = serde_json::to_value(entry).unwrap();

        assert_eq!(json["effect"], "allow");
        assert_eq!(json["session_duration_seconds"], 1800);
        assert_eq!(json["break_glass_event_id"], "00000000000000ff");
        assert_eq!(json["drift_status"], "partial");
        assert_eq!(json["role_arn"], "arn:aws:iam::123456789012:role/prod");
    }

    #[test]
    fn test_drift_error_recorded_as_unknown() {
        let entry = denied_entry().with_drift_error(&DriftCheckError::Unavailable("iam timeout".into()));
        assert_eq!(entry.drift_status, Some(DriftStatus::Unknown));
        assert!(entry.drift_message.unwrap().contains("iam timeout"));
    }

    #[test]
    fn test_approval_entry_event_names() {
        let mut request = AccessRequest::new(
            "alice",
            "production",
            "schema migration for release 42",
            TimeDelta::hours(1),
            at(),
            &RequestLimits::default(),
        )
        .unwrap();
        request.approve("bob", "go ahead", at()).unwrap();

        let json: Value =
            serde_json::to_value(ApprovalLogEntry::new(ApprovalEvent::Approved, &request, at())).unwrap();
        assert_eq!(json["event"], "request.approved");
        assert_eq!(json["status"], "approved");
        assert_eq!(json["approver"], "bob");

        let auto = serde_json::to_value(ApprovalEvent::AutoApproved).unwrap();
        assert_eq!(auto, "request.auto_approved");
    }

    #[test]
    fn test_break_glass_entry() {
        let event = BreakGlassEvent::new(
            "alice",
            "production",
            ReasonCode::Security,
            "credential leak suspected, rotating keys",
            TimeDelta::hours(1),
            at(),
            TimeDelta::hours(4),
        )
        .unwrap();
        let json: Value =
            serde_json::to_value(BreakGlassLogEntry::new(BreakGlassLogEvent::Invoked, &event, at())).unwrap();
        assert_eq!(json["event"], "breakglass.invoked");
        assert_eq!(json["reason_code"], "security");
        assert_eq!(json["duration_seconds"], 3600);
        assert!(json.get("closed_by").is_none());
    }
}

//! The access request record and its lifecycle transitions.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_types::RequestId;
use serde::{Deserialize, Serialize};

use crate::error::{RequestError, Result};

/// Minimum justification length, in characters.
pub const JUSTIFICATION_MIN: usize = 10;

/// Maximum justification length, in characters.
pub const JUSTIFICATION_MAX: usize = 500;

/// Comment stamped on requests approved by an auto-approve rule.
pub const AUTO_APPROVE_COMMENT: &str = "auto-approved by policy";

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// True for statuses no transition leaves.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RequestError::InvalidStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Limits
// ============================================================================

/// System-wide bounds applied when a request is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Requested durations above this are capped.
    pub max_duration: TimeDelta,
    /// Used when the requester asks for a zero duration.
    pub default_duration: TimeDelta,
    /// How long a request stays live after creation.
    pub request_ttl: TimeDelta,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_duration: TimeDelta::hours(8),
            default_duration: TimeDelta::hours(1),
            request_ttl: TimeDelta::hours(24),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// An access request.
///
/// Field names are part of the stored and audited record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub requester: String,
    pub profile: String,
    pub justification: String,
    /// Requested credential lifetime, in seconds on the wire.
    #[serde(with = "sentinel_types::duration_secs")]
    pub duration: TimeDelta,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approver_comment: String,
}

impl Request {
    /// Creates a pending request with a fresh ID.
    ///
    /// A zero duration becomes `limits.default_duration`; anything above
    /// `limits.max_duration` is capped. Negative durations are rejected.
    pub fn new(
        requester: impl Into<String>,
        profile: impl Into<String>,
        justification: impl Into<String>,
        duration: TimeDelta,
        now: DateTime<Utc>,
        limits: &RequestLimits,
    ) -> Result<Self> {
        let requester = requester.into();
        let profile = profile.into();
        let justification = justification.into();

        if requester.trim().is_empty() {
            return Err(RequestError::Invalid("requester is required".into()));
        }
        if profile.trim().is_empty() {
            return Err(RequestError::Invalid("profile is required".into()));
        }
        let chars = justification.chars().count();
        if !(JUSTIFICATION_MIN..=JUSTIFICATION_MAX).contains(&chars) {
            return Err(RequestError::Invalid(format!(
                "justification must be {JUSTIFICATION_MIN}-{JUSTIFICATION_MAX} characters, got {chars}"
            )));
        }
        if duration < TimeDelta::zero() {
            return Err(RequestError::Invalid("duration must not be negative".into()));
        }

        let duration = if duration.is_zero() {
            limits.default_duration
        } else {
            duration.min(limits.max_duration)
        };

        Ok(Self {
            id: RequestId::generate()?,
            requester,
            profile,
            justification,
            duration,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + limits.request_ttl,
            approver: String::new(),
            approver_comment: String::new(),
        })
    }

    /// True once `expires_at` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True if this request currently grants `profile`.
    pub fn is_live_approval(&self, profile: &str, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Approved && !self.is_expired(now) && self.profile == profile
    }

    /// Approves a pending request. Self-approval is rejected.
    pub fn approve(
        &mut self,
        approver: impl Into<String>,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let approver = approver.into();
        if approver == self.requester {
            return Err(RequestError::SelfApproval);
        }
        self.review(RequestStatus::Approved, approver, comment.into(), now)
    }

    /// Denies a pending request. Self-denial is rejected.
    pub fn deny(
        &mut self,
        approver: impl Into<String>,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let approver = approver.into();
        if approver == self.requester {
            return Err(RequestError::SelfApproval);
        }
        self.review(RequestStatus::Denied, approver, comment.into(), now)
    }

    /// Cancels a pending request. Only the requester may cancel.
    pub fn cancel(&mut self, requester: &str, now: DateTime<Utc>) -> Result<()> {
        if requester != self.requester {
            return Err(RequestError::Invalid(
                "only the requester can cancel a request".into(),
            ));
        }
        self.ensure_pending()?;
        self.status = RequestStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Stamps an automatic approval on behalf of the requester.
    pub(crate) fn auto_approve(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.approver = self.requester.clone();
        self.approver_comment = AUTO_APPROVE_COMMENT.to_string();
        self.updated_at = now;
    }

    fn review(
        &mut self,
        status: RequestStatus,
        approver: String,
        comment: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_pending()?;
        if self.is_expired(now) {
            return Err(RequestError::Expired);
        }
        self.status = status;
        self.approver = approver;
        self.approver_comment = comment;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status == RequestStatus::Pending {
            Ok(())
        } else {
            Err(RequestError::NotPending {
                status: self.status,
            })
        }
    }
}

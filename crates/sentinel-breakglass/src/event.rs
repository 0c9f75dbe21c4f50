//! The break-glass event record and its lifecycle.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_policy::ReasonCode;
use sentinel_types::EventId;
use serde::{Deserialize, Serialize};

use crate::error::{BreakGlassError, Result};

/// Minimum justification length, in characters.
pub const JUSTIFICATION_MIN: usize = 20;

/// Maximum justification length, in characters.
pub const JUSTIFICATION_MAX: usize = 1000;

/// Longest emergency grant when no tighter limit is configured.
pub const DEFAULT_MAX_DURATION: TimeDelta = TimeDelta::hours(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakGlassStatus {
    Active,
    Closed,
}

impl BreakGlassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl Display for BreakGlassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakGlassStatus {
    type Err = BreakGlassError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(BreakGlassError::InvalidStatus(other.to_string())),
        }
    }
}

/// One emergency access invocation.
///
/// Field names are part of the stored and audited record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakGlassEvent {
    pub id: EventId,
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    #[serde(with = "sentinel_types::duration_secs")]
    pub duration: TimeDelta,
    pub status: BreakGlassStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub closed_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub closed_reason: String,
}

impl BreakGlassEvent {
    /// Creates an active event with a fresh ID.
    ///
    /// `duration` must be positive and is capped at `max_duration`.
    pub fn new(
        invoker: impl Into<String>,
        profile: impl Into<String>,
        reason_code: ReasonCode,
        justification: impl Into<String>,
        duration: TimeDelta,
        now: DateTime<Utc>,
        max_duration: TimeDelta,
    ) -> Result<Self> {
        let invoker = invoker.into();
        let profile = profile.into();
        let justification = justification.into();

        if invoker.trim().is_empty() {
            return Err(BreakGlassError::Invalid("invoker is required".into()));
        }
        if profile.trim().is_empty() {
            return Err(BreakGlassError::Invalid("profile is required".into()));
        }
        let chars = justification.chars().count();
        if !(JUSTIFICATION_MIN..=JUSTIFICATION_MAX).contains(&chars) {
            return Err(BreakGlassError::Invalid(format!(
                "justification must be {JUSTIFICATION_MIN}-{JUSTIFICATION_MAX} characters, got {chars}"
            )));
        }
        if duration <= TimeDelta::zero() {
            return Err(BreakGlassError::Invalid("duration must be positive".into()));
        }

        let duration = duration.min(max_duration);
        Ok(Self {
            id: EventId::generate()?,
            invoker,
            profile,
            reason_code,
            justification,
            duration,
            status: BreakGlassStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: now + duration,
            closed_by: String::new(),
            closed_reason: String::new(),
        })
    }

    /// True if this event currently grants `profile`.
    pub fn is_live(&self, profile: &str, now: DateTime<Utc>) -> bool {
        self.status == BreakGlassStatus::Active && now < self.expires_at && self.profile == profile
    }

    /// Closes an active event early.
    pub fn close(
        &mut self,
        closed_by: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != BreakGlassStatus::Active {
            return Err(BreakGlassError::NotActive {
                status: self.status,
            });
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(BreakGlassError::Invalid("close reason is required".into()));
        }
        self.status = BreakGlassStatus::Closed;
        self.closed_by = closed_by.into();
        self.closed_reason = reason;
        self.updated_at = now;
        Ok(())
    }
}

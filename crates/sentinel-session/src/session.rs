//! The server session record.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_types::SessionId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Revoked,
    Expired,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            other => Err(SessionError::InvalidStatus(other.to_string())),
        }
    }
}

/// Access issued to one user for one profile.
///
/// Field names are part of the stored record format read by session
/// listing tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSession {
    pub id: SessionId,
    pub user: String,
    pub profile: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request_count: u64,
    pub server_instance_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_identity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revoked_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revoked_reason: String,
}

impl ServerSession {
    /// True if the stored status is `Expired` or `expires_at` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Expired || now >= self.expires_at
    }

    /// Status with time-based expiry applied. Revocation takes precedence.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        match self.status {
            SessionStatus::Active if now >= self.expires_at => SessionStatus::Expired,
            status => status,
        }
    }
}

/// Builds a new active session with a CSPRNG-generated ID.
pub fn new_session(
    user: impl Into<String>,
    profile: impl Into<String>,
    server_instance_id: impl Into<String>,
    source_identity: impl Into<String>,
    duration: TimeDelta,
    now: DateTime<Utc>,
) -> Result<ServerSession> {
    let user = user.into();
    let profile = profile.into();
    if user.trim().is_empty() {
        return Err(SessionError::Invalid("user is required".into()));
    }
    if profile.trim().is_empty() {
        return Err(SessionError::Invalid("profile is required".into()));
    }
    if duration <= TimeDelta::zero() {
        return Err(SessionError::Invalid("duration must be positive".into()));
    }

    Ok(ServerSession {
        id: SessionId::generate()?,
        user,
        profile,
        status: SessionStatus::Active,
        started_at: now,
        last_access_at: now,
        expires_at: now + duration,
        request_count: 0,
        server_instance_id: server_instance_id.into(),
        source_identity: source_identity.into(),
        revoked_by: String::new(),
        revoked_reason: String::new(),
    })
}

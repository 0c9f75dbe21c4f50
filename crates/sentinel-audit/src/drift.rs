//! Advisory trust-policy drift checks.
//!
//! A drift check asks whether a role's trust policy still requires the
//! SourceIdentity stamp Sentinel puts on every session. The answer is
//! recorded in the decision log and never changes the decision.

use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    /// The trust policy enforces SourceIdentity.
    Ok,
    /// Some trust statements enforce it, others do not.
    Partial,
    /// Nothing enforces it.
    None,
    /// The check could not be completed.
    Unknown,
}

impl Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::None => "none",
            Self::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftCheckResult {
    pub status: DriftStatus,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum DriftCheckError {
    #[error("drift check unavailable: {0}")]
    Unavailable(String),

    #[error("malformed trust policy for {role_arn}: {reason}")]
    MalformedPolicy { role_arn: String, reason: String },
}

/// Inspects a role's trust policy.
#[async_trait]
pub trait DriftChecker: Send + Sync {
    async fn check_role(&self, role_arn: &str) -> Result<DriftCheckResult, DriftCheckError>;
}

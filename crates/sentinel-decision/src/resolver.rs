//! Override strategies consulted after a policy denial.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use sentinel_breakglass::{BreakGlassStore, find_active_break_glass, remaining_duration};
use sentinel_request::{RequestStore, find_approved_request};
use sentinel_types::{EventId, RequestId, StoreError};

use crate::decider::DecisionRequest;

/// Records scanned per override lookup unless configured otherwise.
pub const DEFAULT_LOOKUP_LIMIT: usize = 100;

/// Which mechanism produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OverrideKind {
    Approval,
    BreakGlass,
}

impl Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Approval => "approval",
            Self::BreakGlass => "break-glass",
        })
    }
}

/// Evidence that a denied request may proceed anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OverrideGrant {
    /// A live approved access request and the duration it was approved for.
    Approval {
        request_id: RequestId,
        duration: TimeDelta,
    },
    /// A live break-glass event and the time it has left.
    BreakGlass {
        event_id: EventId,
        remaining: TimeDelta,
    },
}

impl OverrideGrant {
    pub fn kind(&self) -> OverrideKind {
        match self {
            Self::Approval { .. } => OverrideKind::Approval,
            Self::BreakGlass { .. } => OverrideKind::BreakGlass,
        }
    }

    /// Session length this grant permits for a `requested` duration.
    ///
    /// Approvals are capped at the approved request's duration; break-glass
    /// is capped at the event's remaining time.
    pub fn effective_duration(&self, requested: TimeDelta) -> TimeDelta {
        match self {
            Self::Approval { duration, .. } => requested.min(*duration),
            Self::BreakGlass { remaining, .. } => requested.min(*remaining),
        }
    }
}

/// One override mechanism.
///
/// `resolve` returns `Ok(None)` when the requester holds no live override.
/// Store failures are returned, not swallowed; the decider decides what
/// they mean.
#[async_trait]
pub trait OverrideResolver: Send + Sync {
    fn kind(&self) -> OverrideKind;

    async fn resolve(&self, request: &DecisionRequest) -> Result<Option<OverrideGrant>, StoreError>;
}

// ============================================================================
// Approval
// ============================================================================

pub struct ApprovalOverride {
    store: Arc<dyn RequestStore>,
    limit: usize,
}

impl ApprovalOverride {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_LOOKUP_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl OverrideResolver for ApprovalOverride {
    fn kind(&self) -> OverrideKind {
        OverrideKind::Approval
    }

    async fn resolve(&self, request: &DecisionRequest) -> Result<Option<OverrideGrant>, StoreError> {
        let found = find_approved_request(
            self.store.as_ref(),
            &request.user,
            &request.profile,
            request.time,
            self.limit,
        )
        .await?;
        Ok(found.map(|r| OverrideGrant::Approval {
            request_id: r.id,
            duration: r.duration,
        }))
    }
}

// ============================================================================
// Break-glass
// ============================================================================

pub struct BreakGlassOverride {
    store: Arc<dyn BreakGlassStore>,
    limit: usize,
}

impl BreakGlassOverride {
    pub fn new(store: Arc<dyn BreakGlassStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_LOOKUP_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl OverrideResolver for BreakGlassOverride {
    fn kind(&self) -> OverrideKind {
        OverrideKind::BreakGlass
    }

    async fn resolve(&self, request: &DecisionRequest) -> Result<Option<OverrideGrant>, StoreError> {
        let found = find_active_break_glass(
            self.store.as_ref(),
            &request.user,
            &request.profile,
            request.time,
            self.limit,
        )
        .await?;
        Ok(found.map(|event| OverrideGrant::BreakGlass {
            remaining: remaining_duration(&event, request.time),
            event_id: event.id,
        }))
    }
}

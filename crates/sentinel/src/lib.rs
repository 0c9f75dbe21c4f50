//! # Sentinel
//!
//! Policy-gated credential broker core.
//!
//! Sentinel decides whether a user may receive credentials for a profile.
//! The policy decides first; a denial can still be overridden by a live
//! approved access request or an active break-glass event. Every decision
//! is audited, and every issuance opens a session that can be revoked.
//!
//! # Architecture
//!
//! ```text
//!   DecisionRequest
//!         │
//!         ▼
//!  ┌──────────────┐  deny   ┌──────────┐  none   ┌─────────────┐
//!  │ PolicyEngine │ ──────▶ │ approval │ ──────▶ │ break-glass │
//!  └──────────────┘         └──────────┘         └─────────────┘
//!         │ allow                │ grant                │ grant
//!         ▼                      ▼                      ▼
//!  ┌────────────────────────────────────────────────────────────┐
//!  │        FinalDecision ─▶ DecisionAuditLog ─▶ Session         │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use sentinel::{Broker, BrokerStores, DecisionRequest, SentinelConfig};
//!
//! let config = SentinelConfig::load()?;
//! sentinel::telemetry::init_tracing(&config.logging)?;
//!
//! let policy = sentinel::load_policy_file(&config.policy.path)?;
//! let broker = Broker::from_config(config, BrokerStores::in_memory())?;
//!
//! let request = DecisionRequest::new("alice", "production", chrono::Utc::now(), chrono::TimeDelta::zero());
//! let outcome = broker.authorize(Some(&policy), request).await?;
//! ```
//!
//! # Modules
//!
//! - **Broker**: [`Broker`], [`BrokerStores`] - wiring and workflows
//! - **Decisions**: [`AuthorizationDecider`], [`OverrideResolver`]
//! - **Records**: access requests, break-glass events, sessions, audit entries

mod broker;
mod error;
pub mod telemetry;

pub use broker::{Authorization, BreakGlassInvocation, Broker, BrokerStores, audit_log_from_config};
pub use error::{Result, SentinelError};

// Configuration
pub use sentinel_config::{ConfigError, ConfigLoader, LoggingConfig, SentinelConfig};

// Identifiers and store errors
pub use sentinel_types::{EventId, IdError, RequestId, SessionId, StoreError, is_valid_id};

// Policy engine
pub use sentinel_policy::{
    ApprovalPolicy, BreakGlassPolicy, Decision, Effect, Policy, PolicyError, ReasonCode, Rule,
    evaluate, lint, load_approval_policy_file, load_break_glass_policy_file, load_policy_file,
    parse_approval_policy, parse_break_glass_policy, parse_policy,
};

// Overrides
pub use sentinel_breakglass::{
    BreakGlassError, BreakGlassEvent, BreakGlassStatus, BreakGlassStore, MemoryBreakGlassStore,
    RateLimitPolicy,
};
pub use sentinel_request::{MemoryRequestStore, Request, RequestError, RequestStatus, RequestStore};

// Decisions and audit
pub use sentinel_audit::{
    ApprovalLogEntry, BackgroundLogger, BreakGlassLogEntry, DecisionAuditLog, DecisionLogEntry,
    DriftCheckError, DriftCheckResult, DriftChecker, DriftStatus, Logger,
};
pub use sentinel_decision::{
    AuthorizationDecider, DecisionRequest, FinalDecision, OverrideGrant, OverrideKind,
    OverrideResolver,
};

// Sessions
pub use sentinel_session::{
    MemorySessionStore, RevokeInput, ServerSession, SessionError, SessionManager, SessionQuery,
    SessionStatus, SessionStore,
};

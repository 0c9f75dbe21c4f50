//! # sentinel-audit: Audit trail for Sentinel
//!
//! Every credential decision, approval workflow step, and break-glass
//! event is written as one JSON object per line. The record layouts are an
//! external contract read by compliance tooling; field names never change.
//!
//! # Architecture
//!
//! ```text
//! DecisionAuditLog
//!   └─ Option<Arc<dyn Logger>>     None => silent no-op
//!        ├─ JsonLinesLogger<W>     file / stdout
//!        ├─ TracingLogger          live stream via `tracing`
//!        ├─ FanoutLogger           every sink above, same entry
//!        └─ BackgroundLogger       any sink, on a writer thread
//! ```
//!
//! Appending is fire-and-forget: sink failures are reported through
//! `tracing` and never reach the decision path.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use sentinel_audit::{DecisionAuditLog, DecisionLogEntry};
//! use sentinel_policy::{Decision, Request};
//!
//! let request = Request::new("alice", "production", Utc::now());
//! let entry = DecisionLogEntry::new(&request, &Decision::default_deny("no match"), "policy.yaml");
//!
//! // No sink configured: appending does nothing.
//! DecisionAuditLog::disabled().append(&entry);
//!
//! let line = serde_json::to_string(&entry).unwrap();
//! assert!(line.contains("\"rule_index\":-1"));
//! ```

mod drift;
mod entry;
mod error;
mod logger;

pub use drift::{DriftCheckError, DriftCheckResult, DriftChecker, DriftStatus};
pub use entry::{
    ApprovalEvent, ApprovalLogEntry, BreakGlassLogEntry, BreakGlassLogEvent, DecisionLogEntry,
};
pub use error::{AuditError, Result};
pub use logger::{BackgroundLogger, DecisionAuditLog, FanoutLogger, JsonLinesLogger, Logger, TracingLogger};

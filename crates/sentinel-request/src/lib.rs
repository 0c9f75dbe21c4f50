//! # sentinel-request: Approval workflow for Sentinel
//!
//! A user whose credential request is denied by policy can ask for access.
//! The ask is a [`Request`]: created `pending`, then approved or denied by
//! an approver named in the approval policy, or approved automatically at
//! creation when an auto-approve rule matches.
//!
//! ```text
//!            ┌──────────┐  approve   ┌──────────┐
//!  create ──▶│ pending  │───────────▶│ approved │
//!            └────┬─────┘            └──────────┘
//!                 │ deny / cancel / ttl
//!                 ▼
//!       denied | cancelled | expired
//! ```
//!
//! The decision path only ever reads requests, through
//! [`find_approved_request`]: an approved request is live while
//! `now < expires_at`, whatever its stored status says afterwards.

mod error;
mod request;
mod resolver;
mod store;

pub use error::{RequestError, Result};
pub use request::{
    AUTO_APPROVE_COMMENT, JUSTIFICATION_MAX, JUSTIFICATION_MIN, Request, RequestLimits,
    RequestStatus,
};
pub use resolver::{apply_auto_approve, find_approved_request, submit_request};
pub use store::{MemoryRequestStore, RequestStore};

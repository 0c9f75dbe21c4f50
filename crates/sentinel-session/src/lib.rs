//! # sentinel-session: Issued session tracking for Sentinel
//!
//! Every credential issuance creates a [`ServerSession`]. Sessions are the
//! handle administrators use to see who holds access and to cut it off.
//!
//! ```text
//!            issue             revoke(reason)
//!   ──────────────▶ active ─────────────────▶ revoked
//!                     │
//!                     │ now >= expires_at
//!                     ▼
//!                  expired
//! ```
//!
//! `revoked` and `expired` are terminal. Expiry is derived from
//! `expires_at` when read; a stored `expired` status, written by an
//! external sweeper, means the same thing.
//!
//! Session IDs are validated before any store call, so a malformed ID
//! never reaches a backend.

mod error;
mod manager;
mod session;
mod store;

pub use error::{Result, SessionError};
pub use manager::{RevokeInput, SessionManager, SessionQuery, TimeRange, validate_session_id};
pub use session::{ServerSession, SessionStatus, new_session};
pub use store::{MemorySessionStore, SessionStore};

//! # sentinel-breakglass: Emergency access for Sentinel
//!
//! Break-glass lets an authorized user grant themselves time-boxed access
//! to a profile without waiting for an approver. Every invocation is a
//! [`BreakGlassEvent`] that starts `active` and becomes not-live once it is
//! closed or its `expires_at` passes.
//!
//! The decision path reads events through [`find_active_break_glass`] and
//! caps the issued session with [`remaining_duration`]. Invocation is
//! throttled per user by [`check_rate_limit`].

mod error;
mod event;
mod ratelimit;
mod resolver;
mod store;

pub use error::{BreakGlassError, Result};
pub use event::{
    BreakGlassEvent, BreakGlassStatus, DEFAULT_MAX_DURATION, JUSTIFICATION_MAX, JUSTIFICATION_MIN,
};
pub use ratelimit::{RateLimitPolicy, RateLimitResult, check_rate_limit};
pub use resolver::{find_active_break_glass, remaining_duration};
pub use store::{BreakGlassStore, MemoryBreakGlassStore};

pub use sentinel_policy::ReasonCode;

use sentinel_types::{IdError, StoreError};
use thiserror::Error;

use crate::event::BreakGlassStatus;

#[derive(Debug, Error)]
pub enum BreakGlassError {
    #[error("invalid break-glass event: {0}")]
    Invalid(String),

    #[error("invalid break-glass status: {0:?}")]
    InvalidStatus(String),

    #[error("break-glass event is {status}, expected active")]
    NotActive { status: BreakGlassStatus },

    #[error("{user} is not authorized to invoke break-glass for {profile}")]
    NotAuthorized { user: String, profile: String },

    #[error("break-glass rate limited: {0}")]
    RateLimited(String),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("break-glass store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BreakGlassError>;

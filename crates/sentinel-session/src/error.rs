use sentinel_types::{IdError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session ID format")]
    InvalidId,

    #[error("reason is required for revocation")]
    ReasonRequired,

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already revoked")]
    AlreadyRevoked,

    #[error("session expired")]
    Expired,

    #[error("invalid session status: {0:?}")]
    InvalidStatus(String),

    #[error("invalid session query: {0}")]
    InvalidQuery(String),

    #[error("invalid session: {0}")]
    Invalid(String),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("session store error: {0}")]
    Store(#[source] StoreError),
}

impl SessionError {
    /// Maps a store failure for `id`, keeping not-found distinct.
    pub(crate) fn from_store(id: &str, error: StoreError) -> Self {
        if error.is_not_found() {
            Self::NotFound(id.to_string())
        } else {
            Self::Store(error)
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

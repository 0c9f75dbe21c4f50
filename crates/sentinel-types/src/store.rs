//! Store failure type shared by every store trait.

use thiserror::Error;

/// Error returned by request, break-glass, and session stores.
///
/// `NotFound` is kept distinct from `Backend` so callers can tell "no such
/// record" apart from "backend unavailable".
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given key.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A record with the given key already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// The backing store failed (network, throttling, serialization, ...).
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Builds a `Backend` error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into().into())
    }

    /// Returns true if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

use sentinel_types::StoreError;
use thiserror::Error;

use crate::resolver::OverrideKind;

/// A failure observed while deciding. Never changes the outcome.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("{kind} override lookup failed: {source}")]
    Lookup {
        kind: OverrideKind,
        #[source]
        source: StoreError,
    },
}

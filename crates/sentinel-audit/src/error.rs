use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start audit writer thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("audit sink lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, AuditError>;

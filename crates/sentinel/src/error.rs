//! Error types for the Sentinel facade.

use sentinel_audit::AuditError;
use sentinel_breakglass::BreakGlassError;
use sentinel_config::ConfigError;
use sentinel_policy::PolicyError;
use sentinel_request::RequestError;
use sentinel_session::SessionError;
use thiserror::Error;

/// Errors surfaced by [`crate::Broker`] workflows.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    BreakGlass(#[from] BreakGlassError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("failed to initialize tracing: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, SentinelError>;

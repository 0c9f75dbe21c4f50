use sentinel_types::{IdError, StoreError};
use thiserror::Error;

use crate::request::RequestStatus;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("invalid request status: {0:?}")]
    InvalidStatus(String),

    #[error("request is {status}, expected pending")]
    NotPending { status: RequestStatus },

    #[error("request has expired")]
    Expired,

    #[error("requester cannot approve or deny their own request")]
    SelfApproval,

    #[error("{approver} is not an approver for profile {profile}")]
    NotAnApprover { approver: String, profile: String },

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("request store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RequestError>;

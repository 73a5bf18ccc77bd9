//! Error types for the COSI driver
//!
//! Every failure inside a request pipeline is classified exactly once, where it
//! is detected, into one of the caller-facing kinds below. The kind is then
//! carried unchanged to the gRPC boundary.

use thiserror::Error;
use tonic::{Code, Status};

/// Common result type for driver operations
pub type Result<T> = std::result::Result<T, ProvisionerError>;

/// Caller-facing failure kinds
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProvisionerError {
    /// Malformed or missing caller input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend reports a naming conflict
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Infrastructure failure: secret lookup, client construction, backend
    #[error("internal error: {0}")]
    Internal(String),

    /// Operation intentionally not supported by this driver
    #[error("not implemented: {0}")]
    Unimplemented(String),
}

impl ProvisionerError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an already exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a not implemented error
    pub fn unimplemented(operation: impl Into<String>) -> Self {
        Self::Unimplemented(operation.into())
    }

    /// gRPC status code for this kind
    #[must_use]
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::Internal(_) => Code::Internal,
            Self::Unimplemented(_) => Code::Unimplemented,
        }
    }
}

impl From<ProvisionerError> for Status {
    fn from(err: ProvisionerError) -> Self {
        let code = err.code();
        match err {
            ProvisionerError::Internal(cause) => {
                tracing::error!(%cause, "request failed");
                Self::new(code, "internal error while provisioning bucket")
            }
            ProvisionerError::InvalidArgument(msg)
            | ProvisionerError::AlreadyExists(msg)
            | ProvisionerError::Unimplemented(msg) => Self::new(code, msg),
        }
    }
}

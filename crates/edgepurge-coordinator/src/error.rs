//! Coordinator error types.

use edgepurge_client::{ApiErrorKind, ClientError};
use edgepurge_core::CoreError;

/// Errors surfaced by [`Coordinator`](crate::Coordinator) operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// No usable credentials from any source.
    #[error("no usable AWS credentials found")]
    Credentials,

    /// The wire client failed.
    #[error(transparent)]
    Client(ClientError),

    /// Configuration or persisted state could not be used.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CoordinatorError {
    /// The API error kind, if the control plane rejected the request.
    #[must_use]
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Client(e) => e.api_kind(),
            _ => None,
        }
    }
}

impl From<ClientError> for CoordinatorError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Credentials => Self::Credentials,
            other => Self::Client(other),
        }
    }
}

/// Convenience result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

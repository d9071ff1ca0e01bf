//! Error types for the edgepurge core.

/// Core error type for edgepurge infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid CloudFront distribution ID format.
    #[error("invalid distribution ID: {0:?} (must be a non-empty alphanumeric string)")]
    InvalidDistributionId(String),

    /// Invalidation path that is not an absolute, printable path.
    #[error("invalid invalidation path: {0:?}")]
    InvalidPath(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The backing key-value store could not be read or written.
    #[error("state store I/O error for key {key}: {source}")]
    StoreIo {
        /// The key being accessed.
        key: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be encoded.
    #[error("failed to encode value for key {key}: {source}")]
    StoreCodec {
        /// The key being written.
        key: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

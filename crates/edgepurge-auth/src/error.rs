//! Error types for request signing.

/// Errors that can occur while preparing or signing a request.
///
/// These are programmer errors: a request that fails here is never retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required signing input (method, host or path) is missing or malformed.
    #[error("invalid signing input: {0}")]
    Usage(String),

    /// The HTTP client used for the instance metadata service could not be built.
    #[error("failed to build metadata HTTP client: {0}")]
    HttpClient(String),
}

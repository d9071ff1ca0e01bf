//! Wire client error taxonomy.

use edgepurge_auth::AuthError;

/// Coarse classification of a control-plane API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The distribution does not exist.
    DistributionNotFound,
    /// The credentials were rejected.
    InvalidCredentials,
    /// Too many requests or too many invalidations in progress.
    RateLimited,
    /// Anything else.
    Generic,
}

impl ApiErrorKind {
    /// Classify an error from its code and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgepurge_client::ApiErrorKind;
    ///
    /// assert_eq!(
    ///     ApiErrorKind::classify(Some("NoSuchDistribution"), ""),
    ///     ApiErrorKind::DistributionNotFound
    /// );
    /// assert_eq!(
    ///     ApiErrorKind::classify(None, "Rate exceeded"),
    ///     ApiErrorKind::RateLimited
    /// );
    /// ```
    #[must_use]
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        let haystack = format!("{} {message}", code.unwrap_or_default());
        let mentions = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

        if mentions(&["NoSuchDistribution", "distribution does not exist"]) {
            Self::DistributionNotFound
        } else if mentions(&[
            "InvalidClientTokenId",
            "SignatureDoesNotMatch",
            "InvalidAccessKeyId",
            "AccessDenied",
            "security token included in the request is invalid",
        ]) {
            Self::InvalidCredentials
        } else if mentions(&[
            "TooManyInvalidationsInProgress",
            "Throttling",
            "Rate exceeded",
            "TooManyRequests",
        ]) {
            Self::RateLimited
        } else {
            Self::Generic
        }
    }

    /// Short operator-facing description.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistributionNotFound => "distribution not found",
            Self::InvalidCredentials => "invalid credentials",
            Self::RateLimited => "rate limited",
            Self::Generic => "api error",
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`CloudFrontClient`](crate::CloudFrontClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be signed. Never retried.
    #[error(transparent)]
    Usage(#[from] AuthError),

    /// No usable credentials from any source.
    #[error("no usable AWS credentials found")]
    Credentials,

    /// The control plane answered with an error status.
    #[error("{kind} (HTTP {status}): {message}")]
    Api {
        /// Classification of the error.
        kind: ApiErrorKind,
        /// HTTP status code.
        status: u16,
        /// Error code from the response body, if any.
        code: Option<String>,
        /// Error message, parsed or synthesized.
        message: String,
    },

    /// Network failure, timeout or unreadable response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// The API error kind, if this is an API error.
    #[must_use]
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

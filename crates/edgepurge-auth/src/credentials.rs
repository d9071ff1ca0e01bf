//! Credential type and provider trait.
//!
//! [`Credentials`] is the `(key, secret, session token)` triple a request is
//! signed with. Anything able to produce one implements [`ProvideCredentials`];
//! the wire client only ever talks to that trait, so a host can replace the
//! default [`CredentialResolver`](crate::resolver::CredentialResolver) with its
//! own source.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

/// Seconds before expiry at which temporary credentials stop being reused.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

/// AWS credentials used to sign a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// When temporary credentials stop being valid.
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Long-term credentials without a session token or expiry.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiry: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Attach an expiry time.
    #[must_use]
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Whether these credentials may still be used at `now`.
    ///
    /// Credentials without an expiry never go stale. Temporary credentials are
    /// retired [`EXPIRY_SAFETY_MARGIN_SECS`] before they actually expire.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_none_or(|expiry| now < expiry - TimeDelta::seconds(EXPIRY_SAFETY_MARGIN_SECS))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Trait for anything that can supply signing credentials.
///
/// Implementations never fail loudly: `None` means "no usable credentials".
#[async_trait]
pub trait ProvideCredentials: Send + Sync + fmt::Debug {
    /// Produce credentials for the next request.
    async fn provide_credentials(&self) -> Option<Credentials>;
}

/// A provider that always returns the same credentials.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::credentials::{Credentials, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(Credentials::new("AKID", "secret"));
/// assert_eq!(provider.credentials().access_key_id, "AKID");
/// ```
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Create a provider for the given credentials.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// The credentials this provider hands out.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[async_trait]
impl ProvideCredentials for StaticCredentialProvider {
    async fn provide_credentials(&self) -> Option<Credentials> {
        Some(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_should_treat_long_term_credentials_as_always_usable() {
        let creds = Credentials::new("AKID", "secret");
        assert!(creds.is_usable_at(Utc::now()));
    }

    #[test]
    fn test_should_retire_credentials_before_expiry() {
        let expiry = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let creds = Credentials::new("AKID", "secret").with_expiry(expiry);

        assert!(creds.is_usable_at(expiry - TimeDelta::seconds(301)));
        assert!(!creds.is_usable_at(expiry - TimeDelta::seconds(300)));
        assert!(!creds.is_usable_at(expiry));
    }

    #[test]
    fn test_should_redact_secrets_in_debug_output() {
        let creds = Credentials::new("AKID", "very-secret").with_session_token("token-value");
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token-value"));
    }

    #[tokio::test]
    async fn test_should_return_static_credentials() {
        let provider = StaticCredentialProvider::new(Credentials::new("AKID", "secret"));
        let creds = provider.provide_credentials().await.unwrap();
        assert_eq!(creds.secret_access_key, "secret");
    }
}

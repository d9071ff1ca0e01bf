//! EC2 instance metadata credential client.
//!
//! Fetches the temporary credentials of the instance role:
//!
//! 1. `PUT /latest/api/token` with a 21600-second TTL header (IMDSv2). If this
//!    fails for any reason the client continues without a token (IMDSv1).
//! 2. `GET /latest/meta-data/iam/security-credentials/` returns the role name.
//! 3. `GET /latest/meta-data/iam/security-credentials/<role>` returns JSON with
//!    the key, secret, session token and expiry.
//!
//! Every failure is logged and reported as `None`; nothing here returns an error
//! to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::AuthError;

/// Link-local address of the instance metadata service.
pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

/// Upper bound for each metadata request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const TOKEN_PATH: &str = "/latest/api/token";
const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: u32 = 21_600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    code: String,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

/// Client for the instance metadata service.
#[derive(Debug, Clone)]
pub struct InstanceMetadataClient {
    http: reqwest::Client,
    endpoint: String,
}

impl InstanceMetadataClient {
    /// Create a client for `endpoint` with the given per-request timeout.
    ///
    /// The timeout is capped at [`DEFAULT_TIMEOUT`].
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.min(DEFAULT_TIMEOUT))
            .no_proxy()
            .build()
            .map_err(|e| AuthError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
        })
    }

    /// The metadata service base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the instance role credentials.
    pub async fn fetch_credentials(&self) -> Option<Credentials> {
        let token = self.fetch_token().await;
        if token.is_none() {
            debug!("metadata token unavailable, using tokenless metadata requests");
        }

        let role = self.fetch_role_name(token.as_deref()).await?;
        self.fetch_role_credentials(&role, token.as_deref()).await
    }

    async fn fetch_token(&self) -> Option<String> {
        let url = format!("{}{TOKEN_PATH}", self.endpoint);
        let response = self
            .http
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await
            .inspect_err(|e| debug!(error = %e, "metadata token request failed"))
            .ok()?;

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "metadata token request rejected");
            return None;
        }

        let token = response.text().await.ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_owned())
    }

    async fn fetch_role_name(&self, token: Option<&str>) -> Option<String> {
        let body = self.get_text(CREDENTIALS_PATH, token).await?;
        let role = body.lines().next().map(str::trim).unwrap_or_default();
        if role.is_empty() {
            warn!("instance has no IAM role attached");
            return None;
        }
        Some(role.to_owned())
    }

    async fn fetch_role_credentials(&self, role: &str, token: Option<&str>) -> Option<Credentials> {
        let body = self
            .get_text(&format!("{CREDENTIALS_PATH}{role}"), token)
            .await?;

        let parsed: RoleCredentials = serde_json::from_str(&body)
            .inspect_err(|e| warn!(role, error = %e, "malformed metadata credentials document"))
            .ok()?;

        if parsed.code != "Success" {
            warn!(role, code = %parsed.code, "metadata service refused credentials");
            return None;
        }

        let (Some(key), Some(secret)) = (parsed.access_key_id, parsed.secret_access_key) else {
            warn!(role, "metadata credentials document lacks a key pair");
            return None;
        };

        let mut credentials = Credentials::new(key, secret);
        credentials.session_token = parsed.token.filter(|t| !t.is_empty());
        credentials.expiry = parsed.expiration;

        debug!(role, expiry = ?credentials.expiry, "fetched instance role credentials");
        Some(credentials)
    }

    async fn get_text(&self, path: &str, token: Option<&str>) -> Option<String> {
        let url = format!("{}{path}", self.endpoint);
        let mut request = self.http.get(&url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .inspect_err(|e| debug!(path, error = %e, "metadata request failed"))
            .ok()?;

        if response.status() != StatusCode::OK {
            debug!(path, status = %response.status(), "metadata request rejected");
            return None;
        }

        response.text().await.ok()
    }
}

//! AWS Signature Version 4 signing.
//!
//! This module implements the SigV4 signing flow:
//!
//! 1. Split the request target into path and query and canonicalize both.
//! 2. Merge `host`, `x-amz-date`, `x-amz-content-sha256` (and
//!    `x-amz-security-token` for temporary credentials) into the caller's
//!    headers, lower-cased and sorted.
//! 3. Build the canonical request and hash it.
//! 4. Build the string to sign from the timestamp, credential scope and hash.
//! 5. Derive the signing key using the HMAC-SHA256 chain over date, region,
//!    service and `aws4_request`.
//! 6. Sign and assemble the `Authorization` header.
//!
//! The main entry point is [`sign_request`]. It is a pure function of its
//! inputs; the timestamp is passed in rather than read from the clock.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::canonical::{
    build_canonical_headers, build_canonical_query_string, build_canonical_request,
    build_canonical_uri, build_signed_headers_string, normalize_headers, split_path_and_query,
};
use crate::credentials::Credentials;
use crate::error::AuthError;

/// The signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The fixed credential scope terminator.
const SCOPE_TERMINATOR: &str = "aws4_request";

/// Headers computed by the signer; callers cannot override them.
const RESERVED_HEADERS: &[&str] = &[
    "authorization",
    "host",
    "x-amz-date",
    "x-amz-content-sha256",
    "x-amz-security-token",
];

type HmacSha256 = Hmac<Sha256>;

/// Inputs to [`sign_request`].
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// HTTP method (e.g. `POST`).
    pub method: &'a str,
    /// Host the request is sent to.
    pub host: &'a str,
    /// Request path, optionally followed by `?query`.
    pub path: &'a str,
    /// Request body.
    pub body: &'a [u8],
    /// Additional headers to sign and send.
    pub extra_headers: &'a [(&'a str, &'a str)],
    /// Credentials to sign with.
    pub credentials: &'a Credentials,
    /// Signing region.
    pub region: &'a str,
    /// Signing service name.
    pub service: &'a str,
    /// Signing time.
    pub now: DateTime<Utc>,
}

/// A signed request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// HTTP method, upper-cased.
    pub method: String,
    /// Host the request was signed for.
    pub host: String,
    /// Canonical (encoded) path.
    pub canonical_path: String,
    /// Canonical (encoded, sorted) query string, possibly empty.
    pub query: String,
    /// Signed headers by lower-cased name. Does not contain `authorization`.
    pub headers: BTreeMap<String, String>,
    /// Semicolon-separated signed header names.
    pub signed_headers: String,
    /// Hex SHA-256 of the body.
    pub body_hash: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
}

impl SignedRequest {
    /// The path and query to put on the request line.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.canonical_path.clone()
        } else {
            format!("{}?{}", self.canonical_path, self.query)
        }
    }

    /// All headers to send, `authorization` last.
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(std::iter::once(("authorization", self.authorization.as_str())))
    }
}

/// Sign a request with AWS Signature Version 4.
///
/// # Errors
///
/// Returns [`AuthError::Usage`] if the method, host or path is empty, if the
/// path does not start with `/`, or if an extra header tries to override a
/// header computed by the signer.
pub fn sign_request(params: &SigningParams<'_>) -> Result<SignedRequest, AuthError> {
    let method = params.method.trim();
    let host = params.host.trim();
    if method.is_empty() {
        return Err(AuthError::Usage("missing HTTP method".to_owned()));
    }
    if host.is_empty() {
        return Err(AuthError::Usage("missing host".to_owned()));
    }
    if params.path.is_empty() {
        return Err(AuthError::Usage("missing request path".to_owned()));
    }
    if !params.path.starts_with('/') {
        return Err(AuthError::Usage(format!(
            "request path must start with '/': {}",
            params.path
        )));
    }
    if let Some((name, _)) = params
        .extra_headers
        .iter()
        .find(|(name, _)| RESERVED_HEADERS.contains(&name.trim().to_ascii_lowercase().as_str()))
    {
        return Err(AuthError::Usage(format!(
            "header {name} is computed by the signer"
        )));
    }

    let (path, query) = split_path_and_query(params.path);
    let canonical_path = build_canonical_uri(path);
    let canonical_query = build_canonical_query_string(query);

    let timestamp = format_amz_date(params.now);
    let date = &timestamp[..8];
    let body_hash = hash_payload(params.body);

    let mut headers = normalize_headers(params.extra_headers.iter().copied());
    headers.insert("host".to_owned(), host.to_owned());
    headers.insert("x-amz-date".to_owned(), timestamp.clone());
    headers.insert("x-amz-content-sha256".to_owned(), body_hash.clone());
    if let Some(token) = &params.credentials.session_token {
        headers.insert("x-amz-security-token".to_owned(), token.clone());
    }

    let names: Vec<&str> = headers.keys().map(String::as_str).collect();
    let signed_headers = build_signed_headers_string(&names);
    let method = method.to_ascii_uppercase();

    let canonical_request = build_canonical_request(
        &method,
        &canonical_path,
        &canonical_query,
        &build_canonical_headers(&headers),
        &signed_headers,
        &body_hash,
    );
    trace!(canonical_request, "Built canonical request");

    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let credential_scope = format!(
        "{date}/{}/{}/{SCOPE_TERMINATOR}",
        params.region, params.service
    );
    let string_to_sign = build_string_to_sign(&timestamp, &credential_scope, &canonical_hash);
    trace!(string_to_sign, "Built string to sign");

    let signing_key = derive_signing_key(
        &params.credentials.secret_access_key,
        date,
        params.region,
        params.service,
    );
    let signature = compute_signature(&signing_key, &string_to_sign);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id
    );

    Ok(SignedRequest {
        method,
        host: host.to_owned(),
        canonical_path,
        query: canonical_query,
        headers,
        signed_headers,
        body_hash,
        authorization,
    })
}

/// Format a timestamp as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Build the SigV4 string to sign.
///
/// Format:
/// ```text
/// AWS4-HMAC-SHA256\n
/// <ISO8601 timestamp>\n
/// <credential_scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
///
/// # Examples
///
/// ```
/// use edgepurge_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20130524T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key using HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, SCOPE_TERMINATOR.as_bytes())
}

/// Compute the HMAC-SHA256 signature of `data` using the given `signing_key`.
///
/// Returns the hex-encoded signature.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Compute HMAC-SHA256 and return the raw bytes.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        <HmacSha256 as KeyInit>::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the SHA-256 hash of the given payload and return it as a hex string.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::sigv4::hash_payload;
///
/// // SHA-256 of empty payload
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

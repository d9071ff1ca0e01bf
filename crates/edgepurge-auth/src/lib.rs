//! AWS Signature Version 4 request signing and credential resolution for edgepurge.
//!
//! # Overview
//!
//! CloudFront control-plane requests are authenticated with SigV4. This crate
//! implements the signing side: given credentials, a request and a timestamp it
//! produces the full set of headers to send, `Authorization` included. It also
//! resolves the credentials to sign with, from explicit parameters, static
//! configuration or the EC2 instance metadata service.
//!
//! # Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use edgepurge_auth::credentials::Credentials;
//! use edgepurge_auth::sigv4::{SigningParams, sign_request};
//!
//! let credentials = Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
//! let signed = sign_request(&SigningParams {
//!     method: "GET",
//!     host: "cloudfront.amazonaws.com",
//!     path: "/2020-05-31/distribution/E123/invalidation?MaxItems=5",
//!     body: b"",
//!     extra_headers: &[],
//!     credentials: &credentials,
//!     region: "us-east-1",
//!     service: "cloudfront",
//!     now: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//! })
//! .unwrap();
//! assert!(signed.authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/"));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - SigV4 canonical request pieces
//! - [`credentials`] - Credential type and the [`ProvideCredentials`] trait
//! - [`error`] - Signing error types
//! - [`imds`] - EC2 instance metadata credential client
//! - [`resolver`] - Prioritized credential resolution with caching
//! - [`sigv4`] - SigV4 signing

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod imds;
pub mod resolver;
pub mod sigv4;

pub use credentials::{Credentials, ProvideCredentials, StaticCredentialProvider};
pub use error::AuthError;
pub use imds::InstanceMetadataClient;
pub use resolver::CredentialResolver;
pub use sigv4::{SignedRequest, SigningParams, hash_payload, sign_request};

//! Signed CloudFront control-plane client.
//!
//! [`CloudFrontClient`] builds the RestXml requests for the invalidation and
//! distribution resources, signs them with SigV4 using whatever
//! [`ProvideCredentials`](edgepurge_auth::ProvideCredentials) it was given, and
//! turns responses into typed results or a classified [`ClientError`].

mod client;
mod error;
mod model;

pub use client::{ClientConfig, CloudFrontClient, SERVICE_NAME};
pub use error::{ApiErrorKind, ClientError};
pub use model::{DistributionInfo, InvalidationDetail, InvalidationResult, InvalidationSummary};

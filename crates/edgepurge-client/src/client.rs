//! The signed CloudFront control-plane client.

use std::sync::Arc;
use std::time::Duration;

use edgepurge_auth::{ProvideCredentials, SigningParams, sign_request};
use edgepurge_core::{Clock, DistributionId, InvalidationBatch, PurgeConfig, SystemClock};
use edgepurge_xml::{extract_error, invalidation_batch_to_xml, parse_xml_or_raw};
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use url::Url;

use crate::error::{ApiErrorKind, ClientError};
use crate::model::{DistributionInfo, InvalidationDetail, InvalidationResult, InvalidationSummary};

/// SigV4 service name of the control plane.
pub const SERVICE_NAME: &str = "cloudfront";

const XML_CONTENT_TYPE: &str = "text/xml";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Connection settings for [`CloudFrontClient`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientConfig {
    /// Control-plane base URL.
    #[builder(default = String::from("https://cloudfront.amazonaws.com"), setter(into))]
    pub endpoint: String,
    /// API version used in resource paths.
    #[builder(default = String::from("2020-05-31"), setter(into))]
    pub api_version: String,
    /// Signing region.
    #[builder(default = String::from("us-east-1"), setter(into))]
    pub region: String,
    /// Per-request timeout.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    /// Log the parameters of every request at debug level.
    #[builder(default = false)]
    pub log_request_params: bool,
}

impl From<&PurgeConfig> for ClientConfig {
    fn from(config: &PurgeConfig) -> Self {
        Self::builder()
            .endpoint(config.endpoint.clone())
            .api_version(config.api_version.clone())
            .region(config.region.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .log_request_params(config.log_request_params)
            .build()
    }
}

/// Client for the CloudFront invalidation and distribution resources.
#[derive(Debug, Clone)]
pub struct CloudFrontClient {
    http: reqwest::Client,
    base_url: String,
    host: String,
    api_version: String,
    region: String,
    log_request_params: bool,
    credentials: Arc<dyn ProvideCredentials>,
    clock: Arc<dyn Clock>,
}

impl CloudFrontClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the endpoint is not an absolute
    /// HTTP(S) URL or the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn ProvideCredentials>,
    ) -> Result<Self, ClientError> {
        let url = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::Transport(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => {
                return Err(ClientError::Transport(format!(
                    "endpoint has no host: {}",
                    config.endpoint
                )));
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Transport(format!(
                "unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("{}://{host}", url.scheme()),
            host,
            api_version: config.api_version.clone(),
            region: config.region.clone(),
            log_request_params: config.log_request_params,
            credentials,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use a custom clock for request timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submit an invalidation for the batch's effective paths.
    pub async fn create_invalidation(
        &self,
        distribution_id: &DistributionId,
        batch: &InvalidationBatch,
    ) -> Result<InvalidationResult, ClientError> {
        let paths = batch.effective_items();
        let body = invalidation_batch_to_xml(&paths, batch.caller_reference())
            .map_err(|e| ClientError::Transport(format!("failed to encode request: {e}")))?;
        let path = format!(
            "/{}/distribution/{distribution_id}/invalidation",
            self.api_version
        );

        let tree = self.send(Method::POST, &path, body).await?;
        let result = InvalidationResult::from_tree(tree, batch.caller_reference());
        info!(
            distribution_id = %distribution_id,
            invalidation_id = ?result.id,
            paths = paths.len(),
            "created invalidation"
        );
        Ok(result)
    }

    /// List recent invalidations, newest first.
    pub async fn list_invalidations(
        &self,
        distribution_id: &DistributionId,
        max_items: u32,
    ) -> Result<Vec<InvalidationSummary>, ClientError> {
        let path = format!(
            "/{}/distribution/{distribution_id}/invalidation?MaxItems={max_items}",
            self.api_version
        );
        let tree = self.send(Method::GET, &path, Vec::new()).await?;
        Ok(InvalidationSummary::list_from_tree(&tree))
    }

    /// Fetch one invalidation.
    pub async fn get_invalidation(
        &self,
        distribution_id: &DistributionId,
        invalidation_id: &str,
    ) -> Result<InvalidationDetail, ClientError> {
        let path = format!(
            "/{}/distribution/{distribution_id}/invalidation/{invalidation_id}",
            self.api_version
        );
        let tree = self.send(Method::GET, &path, Vec::new()).await?;
        Ok(InvalidationDetail::from_tree(tree, invalidation_id))
    }

    /// Fetch a distribution. Used to validate the distribution ID and credentials.
    pub async fn get_distribution(
        &self,
        distribution_id: &DistributionId,
    ) -> Result<DistributionInfo, ClientError> {
        let path = format!("/{}/distribution/{distribution_id}", self.api_version);
        let tree = self.send(Method::GET, &path, Vec::new()).await?;
        Ok(DistributionInfo::from_tree(tree, distribution_id.as_str()))
    }

    async fn send(&self, method: Method, path: &str, body: Vec<u8>) -> Result<Value, ClientError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .ok_or(ClientError::Credentials)?;

        let extra_headers: &[(&str, &str)] = if body.is_empty() {
            &[]
        } else {
            &[("content-type", XML_CONTENT_TYPE)]
        };
        let signed = sign_request(&SigningParams {
            method: method.as_str(),
            host: &self.host,
            path,
            body: &body,
            extra_headers,
            credentials: &credentials,
            region: &self.region,
            service: SERVICE_NAME,
            now: self.clock.now(),
        })?;

        if self.log_request_params {
            debug!(
                method = %method,
                path = %signed.path_and_query(),
                body = %String::from_utf8_lossy(&body),
                "control-plane request parameters"
            );
        }

        let url = format!("{}{}", self.base_url, signed.path_and_query());
        let mut request = self.http.request(method, &url).body(body);
        for (name, value) in signed.header_pairs() {
            // reqwest derives Host from the URL, which is what was signed.
            if name != "host" {
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response body: {e}")))?;

        if status.is_client_error() || status.is_server_error() {
            let error = api_error(status, &text);
            warn!(path, status = status.as_u16(), error = %error, "control-plane request failed");
            return Err(error);
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(parse_xml_or_raw(&text))
    }
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    let parsed = extract_error(body);
    let message = parsed.message.clone().unwrap_or_else(|| {
        let snippet: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        if snippet.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {snippet}", status.as_u16())
        }
    });

    ClientError::Api {
        kind: ApiErrorKind::classify(parsed.code.as_deref(), &message),
        status: status.as_u16(),
        code: parsed.code,
        message,
    }
}

//! End-to-end tests for edgepurge.
//!
//! The control plane and the instance metadata service are replaced by
//! `wiremock` servers and time is driven by a [`ManualClock`], so every
//! scenario runs offline and deterministically. State lives in a
//! [`FileStore`] under a temporary directory; building a second coordinator
//! over the same directory simulates a process restart.

use std::sync::{Arc, Once};

use chrono::{TimeZone, Utc};
use edgepurge_auth::{Credentials, ProvideCredentials, StaticCredentialProvider};
use edgepurge_client::{ClientConfig, CloudFrontClient};
use edgepurge_coordinator::{Coordinator, DebouncePolicy, StaticPathResolver};
use edgepurge_core::{DistributionConfig, FileStore, ManualClock};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

/// Distribution used by every scenario.
pub const DISTRIBUTION_ID: &str = "E2QWRUHAPOMQZL";

/// Control-plane path of the invalidation resource.
pub const INVALIDATION_PATH: &str = "/2020-05-31/distribution/E2QWRUHAPOMQZL/invalidation";

/// A successful `CreateInvalidation` response.
pub const CREATED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invalidation xmlns="http://cloudfront.amazonaws.com/doc/2020-05-31/">
  <Id>I2J0I21PCUYOIK</Id>
  <Status>InProgress</Status>
  <CreateTime>2024-05-01T12:00:00.000Z</CreateTime>
</Invalidation>"#;

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A mocked control plane, a manual clock and a state directory.
#[derive(Debug)]
pub struct Harness {
    /// The mocked control plane.
    pub server: MockServer,
    /// Clock shared by the client and every coordinator.
    pub clock: Arc<ManualClock>,
    /// Persisted coordinator state.
    pub state_dir: TempDir,
}

impl Harness {
    /// Start a harness at 2024-05-01T12:00:00Z.
    pub async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            )),
            state_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Answer every `CreateInvalidation` with [`CREATED`].
    pub async fn accept_invalidations(&self) {
        Mock::given(method("POST"))
            .and(path(INVALIDATION_PATH))
            .respond_with(ResponseTemplate::new(201).set_body_string(CREATED))
            .mount(&self.server)
            .await;
    }

    /// Answer every `CreateInvalidation` with the given status and body.
    pub async fn reject_invalidations(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(INVALIDATION_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body.to_owned()))
            .mount(&self.server)
            .await;
    }

    /// A client signing with `credentials`.
    pub fn client_with(&self, credentials: Arc<dyn ProvideCredentials>) -> CloudFrontClient {
        let config = ClientConfig::builder().endpoint(self.server.uri()).build();
        CloudFrontClient::new(&config, credentials)
            .unwrap()
            .with_clock(self.clock.clone())
    }

    /// A client signing with a fixed test key.
    pub fn client(&self) -> CloudFrontClient {
        self.client_with(Arc::new(StaticCredentialProvider::new(Credentials::new(
            "AKIDTEST", "secret",
        ))))
    }

    /// A coordinator over the harness state with the default policy.
    pub fn coordinator(&self) -> Coordinator {
        self.coordinator_with(DebouncePolicy::default())
    }

    /// A coordinator over the harness state.
    ///
    /// Content `"42"` resolves to `/hello-world/`.
    pub fn coordinator_with(&self, policy: DebouncePolicy) -> Coordinator {
        let settings = DistributionConfig {
            distribution_id: Some(DISTRIBUTION_ID.to_owned()),
            ..DistributionConfig::default()
        };
        Coordinator::new(
            Arc::new(self.client()),
            Arc::new(settings),
            Arc::new(FileStore::open(self.state_dir.path()).unwrap()),
            self.clock.clone(),
            policy,
        )
        .with_path_resolver(Arc::new(
            StaticPathResolver::new().with("42", &["/hello-world/"]),
        ))
    }

    /// Bodies of every invalidation request received so far.
    pub async fn sent_invalidations(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

/// The `<Path>` values of an invalidation request body, in order.
#[must_use]
pub fn paths_of(body: &str) -> Vec<String> {
    body.split("<Path>")
        .skip(1)
        .filter_map(|rest| rest.split_once("</Path>"))
        .map(|(path, _)| path.to_owned())
        .collect()
}

mod test_credentials;
mod test_errors;
mod test_publish;
mod test_restart;

//! Prioritized credential resolution.
//!
//! Credentials are taken from, in order:
//!
//! 1. an explicit key pair passed to [`CredentialResolver::resolve`],
//! 2. the statically configured key pair,
//! 3. the EC2 instance metadata service, when the [`InstanceMetadataMode`]
//!    allows it.
//!
//! Metadata credentials are cached and reused until five minutes before they
//! expire.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use edgepurge_core::{Clock, DistributionConfigSource, InstanceMetadataMode, SystemClock};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::credentials::{Credentials, ProvideCredentials};
use crate::imds::InstanceMetadataClient;

const HYPERVISOR_UUID: &str = "/sys/hypervisor/uuid";
const DMI_SYS_VENDOR: &str = "/sys/class/dmi/id/sys_vendor";
const DMI_BOARD_VENDOR: &str = "/sys/class/dmi/id/board_vendor";
const DMI_BOARD_ASSET_TAG: &str = "/sys/class/dmi/id/board_asset_tag";

/// Resolves the credentials used to sign control-plane requests.
#[derive(Debug)]
pub struct CredentialResolver {
    static_credentials: Option<Credentials>,
    metadata: Option<InstanceMetadataClient>,
    mode: InstanceMetadataMode,
    on_ec2: bool,
    cache: Mutex<Option<Credentials>>,
    settings: Option<Arc<dyn DistributionConfigSource>>,
    clock: Arc<dyn Clock>,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver {
    /// A resolver with no static credentials and no metadata client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            static_credentials: None,
            metadata: None,
            mode: InstanceMetadataMode::Disabled,
            on_ec2: false,
            cache: Mutex::new(None),
            settings: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a statically configured key pair.
    ///
    /// Empty keys or secrets are ignored.
    #[must_use]
    pub fn with_static(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.static_credentials = (!access_key_id.is_empty() && !secret_access_key.is_empty())
            .then(|| Credentials::new(access_key_id, secret_access_key));
        self
    }

    /// Enable the instance metadata fallback.
    ///
    /// With [`InstanceMetadataMode::Auto`] the host is probed for EC2 hardware
    /// once, here.
    #[must_use]
    pub fn with_instance_metadata(
        mut self,
        client: InstanceMetadataClient,
        mode: InstanceMetadataMode,
    ) -> Self {
        if mode == InstanceMetadataMode::Auto {
            self.on_ec2 = detect_ec2();
            debug!(on_ec2 = self.on_ec2, "probed host for EC2 hardware");
        }
        self.metadata = Some(client);
        self.mode = mode;
        self
    }

    /// Override the EC2 hardware probe result.
    #[must_use]
    pub fn with_ec2_detection(mut self, on_ec2: bool) -> Self {
        self.on_ec2 = on_ec2;
        self
    }

    /// Take the explicit key pair from distribution settings on every lookup.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn DistributionConfigSource>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use a custom clock for cache expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether the metadata service may be queried.
    #[must_use]
    pub fn metadata_allowed(&self) -> bool {
        self.metadata.is_some()
            && match self.mode {
                InstanceMetadataMode::Enabled => true,
                InstanceMetadataMode::Auto => self.on_ec2,
                InstanceMetadataMode::Disabled => false,
            }
    }

    /// Resolve credentials.
    ///
    /// The explicit pair wins when both halves are present and non-empty.
    pub async fn resolve(
        &self,
        explicit_key: Option<&str>,
        explicit_secret: Option<&str>,
    ) -> Option<Credentials> {
        if let (Some(key), Some(secret)) = (explicit_key, explicit_secret)
            && !key.is_empty()
            && !secret.is_empty()
        {
            return Some(Credentials::new(key, secret));
        }

        if let Some(credentials) = &self.static_credentials {
            return Some(credentials.clone());
        }

        if !self.metadata_allowed() {
            debug!(mode = ?self.mode, "no static credentials and metadata lookup not allowed");
            return None;
        }

        self.metadata_credentials().await
    }

    async fn metadata_credentials(&self) -> Option<Credentials> {
        let now = self.clock.now();
        if let Some(cached) = self.cache.lock().as_ref()
            && cached.is_usable_at(now)
        {
            return Some(cached.clone());
        }

        let client = self.metadata.as_ref()?;
        let fetched = client.fetch_credentials().await;
        let mut cache = self.cache.lock();
        match fetched {
            Some(credentials) => {
                info!(
                    access_key_id = %credentials.access_key_id,
                    expiry = ?credentials.expiry,
                    "resolved instance role credentials"
                );
                *cache = Some(credentials.clone());
                Some(credentials)
            }
            None => {
                *cache = None;
                None
            }
        }
    }
}

#[async_trait]
impl ProvideCredentials for CredentialResolver {
    async fn provide_credentials(&self) -> Option<Credentials> {
        let config = self
            .settings
            .as_ref()
            .map(|settings| settings.get_distribution_config());
        let (key, secret) = config.as_ref().and_then(|c| c.key_pair()).unzip();
        self.resolve(key, secret).await
    }
}

/// Best-effort check whether the process runs on EC2 hardware.
#[must_use]
pub fn detect_ec2() -> bool {
    let starts_with = |path: &str, prefix: &str| {
        read_trimmed(Path::new(path)).is_some_and(|v| v.to_ascii_lowercase().starts_with(prefix))
    };

    starts_with(HYPERVISOR_UUID, "ec2")
        || read_trimmed(Path::new(DMI_SYS_VENDOR)).is_some_and(|v| v == "Amazon EC2")
        || read_trimmed(Path::new(DMI_BOARD_VENDOR)).is_some_and(|v| v == "Amazon EC2")
        || starts_with(DMI_BOARD_ASSET_TAG, "i-")
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
}

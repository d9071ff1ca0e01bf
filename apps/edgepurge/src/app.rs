//! Wiring of configuration, credentials, client and coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use edgepurge_auth::{CredentialResolver, InstanceMetadataClient};
use edgepurge_client::{ClientConfig, CloudFrontClient};
use edgepurge_coordinator::{Coordinator, DebouncePolicy, DebugLogging};
use edgepurge_core::{
    DistributionConfigSource, DistributionTarget, FileStore, LayeredConfigSource, PurgeConfig,
    SystemClock, load_persisted_settings,
};
use tracing::{debug, info};

/// File in the data directory holding host-persisted distribution settings.
pub const SETTINGS_FILE: &str = "settings.json";

/// Everything a command needs.
#[derive(Debug)]
pub struct App {
    /// Effective distribution settings.
    pub settings: Arc<dyn DistributionConfigSource>,
    /// Signed control-plane client.
    pub client: Arc<CloudFrontClient>,
    /// Invalidation coordinator over the state directory.
    pub coordinator: Coordinator,
}

impl App {
    /// Build the application from configuration.
    pub fn build(config: &PurgeConfig) -> Result<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        let settings: Arc<dyn DistributionConfigSource> =
            Arc::new(layered_settings(config, &data_dir)?);

        let metadata = InstanceMetadataClient::new(
            config.metadata_endpoint.clone(),
            Duration::from_secs(config.metadata_timeout_secs),
        )
        .context("failed to build instance metadata client")?;
        let credentials = CredentialResolver::new()
            .with_instance_metadata(metadata, config.instance_metadata)
            .with_settings(settings.clone());
        debug!(
            metadata_allowed = credentials.metadata_allowed(),
            "configured credential resolution"
        );

        let client = Arc::new(
            CloudFrontClient::new(&ClientConfig::from(config), Arc::new(credentials))
                .context("failed to build CloudFront client")?,
        );

        let store = FileStore::open(&data_dir)
            .with_context(|| format!("cannot open state directory {}", data_dir.display()))?;

        let coordinator = Coordinator::new(
            client.clone(),
            settings.clone(),
            Arc::new(store),
            Arc::new(SystemClock),
            DebouncePolicy::from(config),
        )
        .with_home_url(config.home_url.clone())
        .with_debug_logging(DebugLogging::from(config));

        Ok(Self {
            settings,
            client,
            coordinator,
        })
    }

    /// The distribution the current settings point at.
    pub fn target(&self) -> Result<DistributionTarget> {
        self.settings
            .get_distribution_config()
            .target()
            .context("no usable distribution ID; set EDGEPURGE_DISTRIBUTION_ID or settings.json")
    }
}

/// Combine static configuration with the settings persisted in `data_dir`.
pub fn layered_settings(config: &PurgeConfig, data_dir: &Path) -> Result<LayeredConfigSource> {
    let path = data_dir.join(SETTINGS_FILE);
    let persisted = load_persisted_settings(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    if persisted.is_some() {
        info!(path = %path.display(), "loaded persisted distribution settings");
    }

    Ok(LayeredConfigSource {
        static_config: config.static_distribution_config(),
        managed_identity: config.managed_identity,
        persisted,
    })
}

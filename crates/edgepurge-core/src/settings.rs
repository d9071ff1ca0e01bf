//! Distribution settings and their precedence.
//!
//! Settings come from three layers, highest first:
//!
//! 1. static configuration (environment / [`PurgeConfig`](crate::PurgeConfig)),
//! 2. host-managed identity mode, which withholds keys so that credentials
//!    come from the instance role,
//! 3. settings persisted by the host (`settings.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::types::{DistributionId, DistributionTarget};

/// One layer of distribution settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConfig {
    /// Distribution ID.
    #[serde(default)]
    pub distribution_id: Option<String>,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for DistributionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionConfig")
            .field("distribution_id", &self.distribution_id)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl DistributionConfig {
    /// The key pair, if both halves are present and non-empty.
    #[must_use]
    pub fn key_pair(&self) -> Option<(&str, &str)> {
        match (self.access_key_id.as_deref(), self.secret_access_key.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key, secret))
            }
            _ => None,
        }
    }

    /// Resolve the distribution this configuration points at.
    pub fn target(&self) -> CoreResult<DistributionTarget> {
        let id = self
            .distribution_id
            .as_deref()
            .ok_or_else(|| CoreError::Config("no distribution ID configured".to_owned()))?;
        Ok(DistributionTarget::new(DistributionId::new(id)?))
    }
}

/// Source of the effective distribution settings.
pub trait DistributionConfigSource: Send + Sync + std::fmt::Debug {
    /// The effective settings for the next operation.
    fn get_distribution_config(&self) -> DistributionConfig;
}

impl DistributionConfigSource for DistributionConfig {
    fn get_distribution_config(&self) -> DistributionConfig {
        self.clone()
    }
}

/// Combines the three settings layers according to their precedence.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfigSource {
    /// Statically configured settings.
    pub static_config: DistributionConfig,
    /// Host-managed identity mode.
    pub managed_identity: bool,
    /// Settings persisted by the host.
    pub persisted: Option<DistributionConfig>,
}

impl DistributionConfigSource for LayeredConfigSource {
    fn get_distribution_config(&self) -> DistributionConfig {
        let persisted = self.persisted.clone().unwrap_or_default();

        let distribution_id = self
            .static_config
            .distribution_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or(persisted.distribution_id.clone());

        let (access_key_id, secret_access_key) = if let Some((key, secret)) =
            self.static_config.key_pair()
        {
            (Some(key.to_owned()), Some(secret.to_owned()))
        } else if self.managed_identity {
            (None, None)
        } else if let Some((key, secret)) = persisted.key_pair() {
            (Some(key.to_owned()), Some(secret.to_owned()))
        } else {
            (None, None)
        };

        DistributionConfig {
            distribution_id,
            access_key_id,
            secret_access_key,
        }
    }
}

/// Load host-persisted settings from a JSON file.
///
/// A missing file yields `Ok(None)`; an unreadable document is logged and
/// ignored.
pub fn load_persisted_settings(path: &Path) -> CoreResult<Option<DistributionConfig>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CoreError::StoreIo {
                key: path.display().to_string(),
                source,
            });
        }
    };

    match serde_json::from_str(&raw) {
        Ok(settings) => Ok(Some(settings)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
            Ok(None)
        }
    }
}

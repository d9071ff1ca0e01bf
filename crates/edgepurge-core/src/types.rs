//! Common type definitions shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CloudFront distribution ID (e.g. `E2QWRUHAPOMQZL`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionId(String);

impl DistributionId {
    /// Create a new distribution ID from a string.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    /// Returns an error if the ID is empty or contains non-alphanumeric characters.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::CoreError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(crate::CoreError::InvalidDistributionId(id));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Get the distribution ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The distribution an operation acts on.
///
/// Resolved once per operation from configuration and not changed while the
/// operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTarget {
    /// Distribution to invalidate.
    pub distribution_id: DistributionId,
}

impl DistributionTarget {
    /// Create a target for the given distribution.
    #[must_use]
    pub fn new(distribution_id: DistributionId) -> Self {
        Self { distribution_id }
    }
}

/// Whether the credential resolver may query the instance metadata service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceMetadataMode {
    /// Query the metadata service only when running on detected EC2 hardware.
    #[default]
    Auto,
    /// Always query the metadata service.
    Enabled,
    /// Never query the metadata service.
    Disabled,
}

impl FromStr for InstanceMetadataMode {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "enabled" | "true" | "1" => Ok(Self::Enabled),
            "disabled" | "false" | "0" => Ok(Self::Disabled),
            other => Err(crate::CoreError::Config(format!(
                "invalid instance metadata mode: {other}"
            ))),
        }
    }
}

//! Configuration for edgepurge.
//!
//! Provides [`PurgeConfig`]. Values are loaded from environment variables and
//! every field has a default, so a bare environment yields a usable (if
//! distribution-less) configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::settings::DistributionConfig;
use crate::state::MAX_TTL_SECS;
use crate::types::InstanceMetadataMode;

/// edgepurge configuration.
///
/// # Examples
///
/// ```
/// use edgepurge_core::PurgeConfig;
///
/// let config = PurgeConfig::default();
/// assert_eq!(config.debounce_window_secs, 60);
/// assert_eq!(config.max_items, 10);
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PurgeConfig {
    /// Distribution to invalidate, when configured statically.
    #[builder(default, setter(strip_option))]
    pub distribution_id: Option<String>,

    /// Static access key ID.
    #[builder(default, setter(strip_option))]
    pub access_key_id: Option<String>,

    /// Static secret access key. Never serialized.
    #[serde(skip_serializing, default)]
    #[builder(default, setter(strip_option))]
    pub secret_access_key: Option<String>,

    /// Host-managed identity mode: credentials come from the instance role
    /// rather than persisted keys.
    #[builder(default = false)]
    pub managed_identity: bool,

    /// Public home URL of the site; always invalidated alongside content paths.
    #[builder(default = String::from("/"))]
    pub home_url: String,

    /// CloudFront control-plane endpoint.
    #[builder(default = String::from("https://cloudfront.amazonaws.com"))]
    pub endpoint: String,

    /// CloudFront API version used in resource paths.
    #[builder(default = String::from("2020-05-31"))]
    pub api_version: String,

    /// Signing region.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Timeout for control-plane requests, in seconds.
    #[builder(default = 30)]
    pub request_timeout_secs: u64,

    /// Instance metadata service base URL.
    #[builder(default = String::from("http://169.254.169.254"))]
    pub metadata_endpoint: String,

    /// Timeout for each instance metadata request, in seconds.
    #[builder(default = 5)]
    pub metadata_timeout_secs: u64,

    /// Whether instance metadata credentials may be used.
    #[builder(default)]
    pub instance_metadata: InstanceMetadataMode,

    /// How long after an immediate submission further submissions are merged.
    #[builder(default = 60)]
    pub debounce_window_secs: u64,

    /// Delay before a deferred batch is retried.
    #[builder(default = 60)]
    pub retry_interval_secs: u64,

    /// Largest batch sent path by path; larger batches become `/*`.
    #[builder(default = 10)]
    pub max_items: usize,

    /// Whether submissions inside the debounce window are deferred at all.
    #[builder(default = true)]
    pub deferral_enabled: bool,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Emit a trace of retry scheduling decisions.
    #[builder(default = false)]
    pub log_task_scheduling: bool,

    /// Emit the parameters of every control-plane request.
    #[builder(default = false)]
    pub log_request_params: bool,

    /// Directory holding persisted state and `settings.json`.
    #[builder(default = String::from("/var/lib/edgepurge"))]
    pub data_dir: String,
}

impl std::fmt::Debug for PurgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeConfig")
            .field("distribution_id", &self.distribution_id)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("managed_identity", &self.managed_identity)
            .field("home_url", &self.home_url)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("region", &self.region)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("metadata_endpoint", &self.metadata_endpoint)
            .field("metadata_timeout_secs", &self.metadata_timeout_secs)
            .field("instance_metadata", &self.instance_metadata)
            .field("debounce_window_secs", &self.debounce_window_secs)
            .field("retry_interval_secs", &self.retry_interval_secs)
            .field("max_items", &self.max_items)
            .field("deferral_enabled", &self.deferral_enabled)
            .field("log_level", &self.log_level)
            .field("log_task_scheduling", &self.log_task_scheduling)
            .field("log_request_params", &self.log_request_params)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PurgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `EDGEPURGE_DISTRIBUTION_ID` | *(unset)* |
    /// | `EDGEPURGE_ACCESS_KEY_ID` / `AWS_ACCESS_KEY_ID` | *(unset)* |
    /// | `EDGEPURGE_SECRET_ACCESS_KEY` / `AWS_SECRET_ACCESS_KEY` | *(unset)* |
    /// | `EDGEPURGE_MANAGED_IDENTITY` | `false` |
    /// | `EDGEPURGE_HOME_URL` | `/` |
    /// | `EDGEPURGE_ENDPOINT` | `https://cloudfront.amazonaws.com` |
    /// | `EDGEPURGE_REQUEST_TIMEOUT` | `30` |
    /// | `EDGEPURGE_METADATA_ENDPOINT` | `http://169.254.169.254` |
    /// | `EDGEPURGE_INSTANCE_METADATA` | `auto` |
    /// | `EDGEPURGE_DEBOUNCE_WINDOW` | `60` |
    /// | `EDGEPURGE_RETRY_INTERVAL` | `60` |
    /// | `EDGEPURGE_MAX_ITEMS` | `10` |
    /// | `EDGEPURGE_DEFERRAL` | `true` |
    /// | `EDGEPURGE_LOG_TASK_SCHEDULING` | `false` |
    /// | `EDGEPURGE_LOG_REQUEST_PARAMS` | `false` |
    /// | `EDGEPURGE_DATA_DIR` | `/var/lib/edgepurge` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = non_empty_var("EDGEPURGE_DISTRIBUTION_ID") {
            config.distribution_id = Some(v);
        }
        if let Some(v) =
            non_empty_var("EDGEPURGE_ACCESS_KEY_ID").or_else(|| non_empty_var("AWS_ACCESS_KEY_ID"))
        {
            config.access_key_id = Some(v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_SECRET_ACCESS_KEY")
            .or_else(|| non_empty_var("AWS_SECRET_ACCESS_KEY"))
        {
            config.secret_access_key = Some(v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_MANAGED_IDENTITY") {
            config.managed_identity = parse_bool(&v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_HOME_URL") {
            config.home_url = v;
        }
        if let Some(v) = non_empty_var("EDGEPURGE_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(n) = parsed_var("EDGEPURGE_REQUEST_TIMEOUT") {
            config.request_timeout_secs = n;
        }
        if let Some(v) = non_empty_var("EDGEPURGE_METADATA_ENDPOINT") {
            config.metadata_endpoint = v;
        }
        if let Some(mode) = parsed_var("EDGEPURGE_INSTANCE_METADATA") {
            config.instance_metadata = mode;
        }
        if let Some(n) = parsed_var("EDGEPURGE_DEBOUNCE_WINDOW") {
            config.debounce_window_secs = n;
        }
        if let Some(n) = parsed_var("EDGEPURGE_RETRY_INTERVAL") {
            config.retry_interval_secs = n;
        }
        if let Some(n) = parsed_var("EDGEPURGE_MAX_ITEMS") {
            config.max_items = n;
        }
        if let Some(v) = non_empty_var("EDGEPURGE_DEFERRAL") {
            config.deferral_enabled = parse_bool(&v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_LOG_TASK_SCHEDULING") {
            config.log_task_scheduling = parse_bool(&v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_LOG_REQUEST_PARAMS") {
            config.log_request_params = parse_bool(&v);
        }
        if let Some(v) = non_empty_var("EDGEPURGE_DATA_DIR") {
            config.data_dir = v;
        }
        if let Some(v) = non_empty_var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The statically configured distribution settings (highest precedence layer).
    #[must_use]
    pub fn static_distribution_config(&self) -> DistributionConfig {
        DistributionConfig {
            distribution_id: self.distribution_id.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    /// Debounce window as a [`TimeDelta`].
    #[must_use]
    pub fn debounce_window(&self) -> TimeDelta {
        secs(self.debounce_window_secs)
    }

    /// Retry interval as a [`TimeDelta`].
    #[must_use]
    pub fn retry_interval(&self) -> TimeDelta {
        secs(self.retry_interval_secs)
    }
}

fn secs(n: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(n).map_or(MAX_TTL_SECS, |n| n.min(MAX_TTL_SECS)))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_var(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable environment variable");
            None
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = PurgeConfig::default();
        assert_eq!(config.distribution_id, None);
        assert_eq!(config.home_url, "/");
        assert_eq!(config.endpoint, "https://cloudfront.amazonaws.com");
        assert_eq!(config.api_version, "2020-05-31");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.metadata_timeout_secs, 5);
        assert_eq!(config.instance_metadata, InstanceMetadataMode::Auto);
        assert_eq!(config.debounce_window(), TimeDelta::seconds(60));
        assert_eq!(config.retry_interval(), TimeDelta::seconds(60));
        assert_eq!(config.max_items, 10);
        assert!(config.deferral_enabled);
        assert!(!config.log_task_scheduling);
        assert!(!config.log_request_params);
    }

    #[test]
    fn test_should_load_from_env() {
        let config = PurgeConfig::from_env();
        assert!(!config.endpoint.is_empty());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = PurgeConfig::builder()
            .distribution_id("E2QWRUHAPOMQZL".into())
            .access_key_id("AKID".into())
            .secret_access_key("secret".into())
            .debounce_window_secs(5)
            .max_items(3)
            .deferral_enabled(false)
            .build();

        assert_eq!(config.distribution_id.as_deref(), Some("E2QWRUHAPOMQZL"));
        assert_eq!(config.debounce_window(), TimeDelta::seconds(5));
        assert_eq!(config.max_items, 3);
        assert!(!config.deferral_enabled);

        let layer = config.static_distribution_config();
        assert_eq!(layer.access_key_id.as_deref(), Some("AKID"));
        assert_eq!(layer.secret_access_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_should_never_serialize_secret() {
        let config = PurgeConfig::builder()
            .secret_access_key("super-secret".into())
            .build();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("debounceWindowSecs"));
        assert!(!json.contains("super-secret"));
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
    }

    #[test]
    fn test_should_clamp_huge_durations() {
        let max = TimeDelta::seconds(MAX_TTL_SECS);
        assert_eq!(secs(u64::MAX), max);

        let config = PurgeConfig::builder()
            .debounce_window_secs(20_000_000_000_000)
            .retry_interval_secs(20_000_000_000_000)
            .build();
        assert_eq!(config.debounce_window(), max);
        assert_eq!(config.retry_interval(), max);
    }
}

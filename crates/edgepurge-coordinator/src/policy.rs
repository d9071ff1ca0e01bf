//! Strategy traits and policy settings for the coordinator.
//!
//! The host customizes the coordinator through these rather than through
//! callbacks registered by name:
//!
//! - [`PathFilter`] rewrites the path set of a batch before it is submitted
//! - [`ShouldInvalidate`] decides whether a content change needs a purge
//! - [`PathResolver`] maps a content item to the paths that render it
//! - [`DebouncePolicy`] and [`DebugLogging`] are plain settings

use std::collections::HashMap;
use std::fmt;

use chrono::TimeDelta;
use edgepurge_core::{DEFAULT_MAX_ITEMS, InvalidationPath, PurgeConfig};
use typed_builder::TypedBuilder;

/// Content state that makes a change worth purging.
pub const PUBLISHED_STATE: &str = "publish";

/// How long a pending batch outlives its retry time, in seconds.
pub const PENDING_GRACE_SECS: i64 = 24 * 60 * 60;

/// What a [`PathFilter`] knows about the batch being built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    /// The content item that triggered the batch, if any.
    pub content_id: Option<String>,
}

/// Rewrites the paths of a batch before submission.
pub trait PathFilter: Send + Sync + fmt::Debug {
    /// Return the paths to keep. Returned paths are deduplicated again.
    fn filter(&self, items: Vec<InvalidationPath>, context: &FilterContext)
    -> Vec<InvalidationPath>;
}

/// A [`PathFilter`] that keeps every path.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepAllPaths;

impl PathFilter for KeepAllPaths {
    fn filter(&self, items: Vec<InvalidationPath>, _: &FilterContext) -> Vec<InvalidationPath> {
        items
    }
}

/// Decides whether a content state change triggers an invalidation.
pub trait ShouldInvalidate: Send + Sync + fmt::Debug {
    /// Whether moving `content_id` from `previous` to `new` needs a purge.
    fn should_invalidate(&self, previous: &str, new: &str, content_id: &str) -> bool;
}

/// Invalidate when content becomes published or stops being published.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishTransition;

impl ShouldInvalidate for PublishTransition {
    fn should_invalidate(&self, previous: &str, new: &str, _: &str) -> bool {
        previous == PUBLISHED_STATE || new == PUBLISHED_STATE
    }
}

/// Resolves the public paths a content item is rendered at.
pub trait PathResolver: Send + Sync + fmt::Debug {
    /// Paths or URLs related to `content_id`: its permalink, archives, feeds.
    fn related_paths(&self, content_id: &str) -> Vec<String>;
}

/// A [`PathResolver`] backed by a fixed map.
#[derive(Debug, Default, Clone)]
pub struct StaticPathResolver {
    paths: HashMap<String, Vec<String>>,
}

impl StaticPathResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the paths of a content item.
    #[must_use]
    pub fn with(mut self, content_id: impl Into<String>, paths: &[&str]) -> Self {
        self.paths.insert(
            content_id.into(),
            paths.iter().map(|p| (*p).to_owned()).collect(),
        );
        self
    }
}

impl PathResolver for StaticPathResolver {
    fn related_paths(&self, content_id: &str) -> Vec<String> {
        self.paths.get(content_id).cloned().unwrap_or_default()
    }
}

/// Timing and size limits of the debounce/merge/retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct DebouncePolicy {
    /// How long after an immediate submission further ones are merged.
    #[builder(default = TimeDelta::seconds(60))]
    pub debounce_window: TimeDelta,
    /// Delay before a deferred batch is retried.
    #[builder(default = TimeDelta::seconds(60))]
    pub retry_interval: TimeDelta,
    /// Largest batch sent path by path.
    #[builder(default = DEFAULT_MAX_ITEMS)]
    pub max_items: usize,
    /// Whether submissions inside the window are deferred at all.
    #[builder(default = true)]
    pub deferral_enabled: bool,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DebouncePolicy {
    /// How long a pending batch and its retry timer are kept.
    ///
    /// The retry interval plus [`PENDING_GRACE_SECS`], so that a host whose
    /// ticks arrive late still finds the batch.
    #[must_use]
    pub fn pending_ttl(&self) -> TimeDelta {
        self.retry_interval
            .checked_add(&TimeDelta::seconds(PENDING_GRACE_SECS))
            .unwrap_or(TimeDelta::MAX)
    }
}

impl From<&PurgeConfig> for DebouncePolicy {
    fn from(config: &PurgeConfig) -> Self {
        Self {
            debounce_window: config.debounce_window(),
            retry_interval: config.retry_interval(),
            max_items: config.max_items,
            deferral_enabled: config.deferral_enabled,
        }
    }
}

/// Extra trace output toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugLogging {
    /// Log every retry scheduling decision.
    pub task_scheduling: bool,
    /// Log the parameters of every control-plane request.
    pub request_params: bool,
}

impl From<&PurgeConfig> for DebugLogging {
    fn from(config: &PurgeConfig) -> Self {
        Self {
            task_scheduling: config.log_task_scheduling,
            request_params: config.log_request_params,
        }
    }
}

//! Core types, configuration, and TTL-scoped state for edgepurge.
//!
//! This crate provides the building blocks shared by the signer, the wire
//! client and the invalidation coordinator:
//!
//! - [`PurgeConfig`], loaded from environment variables
//! - [`ScopedCache`], a typed `{value, expires_at}` entry on top of a
//!   [`KeyValueStore`] (in-memory or file backed)
//! - [`InvalidationBatch`] with its overflow-to-wildcard rule
//! - [`Clock`], so that every time-dependent decision can be driven by tests
//! - distribution settings with their precedence rules

mod batch;
mod clock;
mod config;
mod error;
mod settings;
mod state;
mod types;

pub use batch::{DEFAULT_MAX_ITEMS, FULL_SITE_PATH, InvalidationBatch, InvalidationPath};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PurgeConfig;
pub use error::{CoreError, CoreResult};
pub use settings::{
    DistributionConfig, DistributionConfigSource, LayeredConfigSource, load_persisted_settings,
};
pub use state::{FileStore, KeyValueStore, MAX_TTL_SECS, MemoryStore, ScopedCache};
pub use types::{DistributionId, DistributionTarget, InstanceMetadataMode};

//! Debounced, merged and retried CloudFront invalidations.
//!
//! # Overview
//!
//! Publishing a burst of content changes should not flood the control plane
//! with one invalidation per change. The [`Coordinator`] sends the first
//! batch immediately and merges everything that arrives inside the debounce
//! window into a single pending batch, which a one-shot retry sends later.
//!
//! All state (debounce flag, pending batch, retry timer and status) lives in a
//! [`KeyValueStore`](edgepurge_core::KeyValueStore) with per-entry expiry, so
//! the coordinator survives process restarts and never runs background tasks.
//! The host drives the retry by calling [`Coordinator::tick`].
//!
//! # Modules
//!
//! - [`batch`] - Path normalization and [`BatchBuilder`]
//! - [`policy`] - Strategy traits and debounce settings
//! - [`scheduler`] - The persisted one-shot retry timer
//! - [`status`] - Status reporting

pub mod batch;
mod coordinator;
mod error;
pub mod policy;
pub mod scheduler;
pub mod status;

pub use batch::{BatchBuilder, normalize_path};
pub use coordinator::{
    Coordinator, DEBOUNCE_KEY, PENDING_KEY, PendingQueueEntry, RetryOutcome, SubmitOutcome,
};
pub use error::{CoordinatorError, CoordinatorResult};
pub use policy::{
    DebouncePolicy, DebugLogging, FilterContext, KeepAllPaths, PathFilter, PathResolver,
    PublishTransition, ShouldInvalidate, StaticPathResolver,
};
pub use scheduler::{RetryScheduler, StoreScheduler};
pub use status::{CoordinatorStatus, CurrentStatus, ErrorSnapshot, StatusTracker, SuccessSnapshot};

//! One-shot deferred retry timer.
//!
//! The coordinator never runs background tasks. A deferred retry is a
//! timestamp persisted in the state store; the host calls
//! [`Coordinator::tick`](crate::Coordinator::tick) periodically and the retry
//! runs once that timestamp has passed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use edgepurge_core::{Clock, CoreResult, KeyValueStore, ScopedCache};

/// State store key of the retry timer.
pub const NEXT_RETRY_KEY: &str = "edgepurge:next_retry";

/// Registers and reports the single deferred retry.
pub trait RetryScheduler: Send + Sync + fmt::Debug {
    /// Schedule a retry at `at`, kept for `ttl`.
    ///
    /// Returns `false` and leaves the existing timer alone if one is already
    /// scheduled.
    fn schedule(&self, at: DateTime<Utc>, ttl: TimeDelta) -> CoreResult<bool>;

    /// When the scheduled retry is due, if one exists.
    fn next_scheduled(&self) -> CoreResult<Option<DateTime<Utc>>>;

    /// Drop the scheduled retry.
    fn clear(&self) -> CoreResult<()>;
}

/// A [`RetryScheduler`] that keeps its timer in a [`KeyValueStore`].
#[derive(Debug)]
pub struct StoreScheduler {
    timer: ScopedCache<DateTime<Utc>>,
}

impl StoreScheduler {
    /// Create a scheduler over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            timer: ScopedCache::new(store, NEXT_RETRY_KEY, clock),
        }
    }
}

impl RetryScheduler for StoreScheduler {
    fn schedule(&self, at: DateTime<Utc>, ttl: TimeDelta) -> CoreResult<bool> {
        if self.timer.get()?.is_some() {
            return Ok(false);
        }
        self.timer.set(&at, ttl)?;
        Ok(true)
    }

    fn next_scheduled(&self) -> CoreResult<Option<DateTime<Utc>>> {
        self.timer.get()
    }

    fn clear(&self) -> CoreResult<()> {
        self.timer.delete()
    }
}

//! Coordinator status tracking.
//!
//! The status is assembled from three state entries (the explicit status, the
//! last success and the last error) plus the retry timer. Without an explicit
//! status the coordinator reports `scheduled` while a retry timer exists and
//! `idle` otherwise.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use edgepurge_core::{Clock, CoreResult, KeyValueStore, ScopedCache};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scheduler::RetryScheduler;

/// State store key of the explicit status.
pub const STATUS_KEY: &str = "edgepurge:status";
/// State store key of the last success snapshot.
pub const LAST_SUCCESS_KEY: &str = "edgepurge:last_success";
/// State store key of the last error snapshot.
pub const LAST_ERROR_KEY: &str = "edgepurge:last_error";

/// How long success and error snapshots are retained, in seconds.
pub const SNAPSHOT_RETENTION_SECS: i64 = 24 * 60 * 60;

/// How long a `processing` status survives a process that never finishes, in seconds.
pub const PROCESSING_TTL_SECS: i64 = 10 * 60;

/// Current coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentStatus {
    /// Nothing in flight and nothing pending.
    Idle,
    /// An invalidation request is in flight.
    Processing,
    /// A deferred retry is pending.
    Scheduled,
    /// The last attempt failed.
    Error,
}

impl fmt::Display for CurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Scheduled => "scheduled",
            Self::Error => "error",
        })
    }
}

/// The last successful invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessSnapshot {
    /// When it completed.
    pub timestamp: DateTime<Utc>,
    /// Invalidation ID returned by the control plane.
    pub invalidation_id: Option<String>,
}

/// The last failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSnapshot {
    /// When it failed.
    pub timestamp: DateTime<Utc>,
    /// What went wrong.
    pub message: String,
}

/// Snapshot returned by [`StatusTracker::get_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatus {
    /// Current state.
    pub current_status: CurrentStatus,
    /// When the deferred retry is due.
    pub next_scheduled: Option<DateTime<Utc>>,
    /// Last successful invalidation, kept for a day.
    pub last_success: Option<SuccessSnapshot>,
    /// Last failure, kept for a day.
    pub last_error: Option<ErrorSnapshot>,
}

/// Records and reports the coordinator's state.
#[derive(Debug)]
pub struct StatusTracker {
    status: ScopedCache<CurrentStatus>,
    last_success: ScopedCache<SuccessSnapshot>,
    last_error: ScopedCache<ErrorSnapshot>,
    scheduler: Arc<dyn RetryScheduler>,
    clock: Arc<dyn Clock>,
}

impl StatusTracker {
    /// Create a tracker over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn RetryScheduler>,
    ) -> Self {
        Self {
            status: ScopedCache::new(store.clone(), STATUS_KEY, clock.clone()),
            last_success: ScopedCache::new(store.clone(), LAST_SUCCESS_KEY, clock.clone()),
            last_error: ScopedCache::new(store, LAST_ERROR_KEY, clock.clone()),
            scheduler,
            clock,
        }
    }

    /// The current status.
    pub fn get_status(&self) -> CoreResult<CoordinatorStatus> {
        let next_scheduled = self.scheduler.next_scheduled()?;
        let current_status = match self.status.get()? {
            Some(status) => status,
            None if next_scheduled.is_some() => CurrentStatus::Scheduled,
            None => CurrentStatus::Idle,
        };

        Ok(CoordinatorStatus {
            current_status,
            next_scheduled,
            last_success: self.last_success.get()?,
            last_error: self.last_error.get()?,
        })
    }

    /// Mark a request as in flight.
    pub fn set_processing(&self) -> CoreResult<()> {
        self.status.set(
            &CurrentStatus::Processing,
            TimeDelta::seconds(PROCESSING_TTL_SECS),
        )
    }

    /// Record a success and clear any previous error.
    pub fn set_completed(&self, invalidation_id: Option<String>) -> CoreResult<()> {
        debug!(invalidation_id = ?invalidation_id, "recording invalidation success");
        self.status.delete()?;
        self.last_error.delete()?;
        self.last_success.set(
            &SuccessSnapshot {
                timestamp: self.clock.now(),
                invalidation_id,
            },
            TimeDelta::seconds(SNAPSHOT_RETENTION_SECS),
        )
    }

    /// Record a failure.
    pub fn set_error(&self, message: &str) -> CoreResult<()> {
        debug!(message, "recording invalidation failure");
        self.status.set(
            &CurrentStatus::Error,
            TimeDelta::seconds(SNAPSHOT_RETENTION_SECS),
        )?;
        self.last_error.set(
            &ErrorSnapshot {
                timestamp: self.clock.now(),
                message: message.to_owned(),
            },
            TimeDelta::seconds(SNAPSHOT_RETENTION_SECS),
        )
    }
}

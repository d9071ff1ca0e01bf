//! The debounce/merge/retry coordinator.
//!
//! A submission either goes out immediately or is parked:
//!
//! - If the debounce flag is set, deferral is enabled, the caller did not
//!   force the submission and the batch is not a full-site purge, the batch is
//!   merged into the pending entry and a one-shot retry is scheduled.
//! - Otherwise the debounce flag is (re)armed, the status moves to
//!   `processing` and the invalidation is sent.
//!
//! The pending entry is picked up by [`Coordinator::process_pending`], which
//! the host reaches through [`Coordinator::tick`]. A retry is attempted once
//! and the entry is cleared whatever the outcome. Late ticks still find the
//! entry for [`PENDING_GRACE_SECS`](crate::policy::PENDING_GRACE_SECS) after
//! the retry time. An entry that lapses unsent is reported as an error.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use edgepurge_client::{CloudFrontClient, InvalidationResult};
use edgepurge_core::{
    Clock, DistributionConfigSource, InvalidationBatch, KeyValueStore, MAX_TTL_SECS, ScopedCache,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::BatchBuilder;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::policy::{
    DebouncePolicy, DebugLogging, FilterContext, KeepAllPaths, PathFilter, PathResolver,
    PublishTransition, ShouldInvalidate, StaticPathResolver,
};
use crate::scheduler::{RetryScheduler, StoreScheduler};
use crate::status::{CoordinatorStatus, StatusTracker};

/// State store key of the debounce flag.
pub const DEBOUNCE_KEY: &str = "edgepurge:debounce";
/// State store key of the pending batch.
pub const PENDING_KEY: &str = "edgepurge:pending";

/// A batch waiting for its deferred retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQueueEntry {
    /// Union of every deferred batch.
    pub batch: InvalidationBatch,
    /// When the debounce window that caused the deferral closes.
    pub debounce_until: DateTime<Utc>,
}

/// What [`Coordinator::submit`] did with a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The invalidation was sent.
    Submitted(InvalidationResult),
    /// The batch was merged into the pending entry.
    Deferred {
        /// When the deferred retry is due.
        next_retry: DateTime<Utc>,
        /// Distinct paths now pending.
        pending_items: usize,
    },
}

/// What [`Coordinator::process_pending`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// There was no pending batch.
    NothingPending,
    /// The pending batch was sent.
    Submitted(InvalidationResult),
    /// The pending batch was sent and failed. It is not retried again.
    Failed {
        /// Error message, also recorded in the status.
        message: String,
    },
    /// The pending batch lapsed before any retry ran and was dropped unsent.
    Expired {
        /// Error message, also recorded in the status.
        message: String,
    },
}

/// Coordinates invalidations for one distribution.
#[derive(Debug)]
pub struct Coordinator {
    client: Arc<CloudFrontClient>,
    settings: Arc<dyn DistributionConfigSource>,
    policy: DebouncePolicy,
    debug_logging: DebugLogging,
    home_url: String,
    filter: Arc<dyn PathFilter>,
    should_invalidate: Arc<dyn ShouldInvalidate>,
    resolver: Arc<dyn PathResolver>,
    debounce: ScopedCache<bool>,
    pending: ScopedCache<PendingQueueEntry>,
    scheduler: Arc<dyn RetryScheduler>,
    status: StatusTracker,
    clock: Arc<dyn Clock>,
}

impl Coordinator {
    /// Create a coordinator keeping its state in `store`.
    #[must_use]
    pub fn new(
        client: Arc<CloudFrontClient>,
        settings: Arc<dyn DistributionConfigSource>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        policy: DebouncePolicy,
    ) -> Self {
        let scheduler: Arc<dyn RetryScheduler> =
            Arc::new(StoreScheduler::new(store.clone(), clock.clone()));
        Self {
            client,
            settings,
            policy,
            debug_logging: DebugLogging::default(),
            home_url: "/".to_owned(),
            filter: Arc::new(KeepAllPaths),
            should_invalidate: Arc::new(PublishTransition),
            resolver: Arc::new(StaticPathResolver::new()),
            debounce: ScopedCache::new(store.clone(), DEBOUNCE_KEY, clock.clone()),
            pending: ScopedCache::new(store.clone(), PENDING_KEY, clock.clone()),
            status: StatusTracker::new(store, clock.clone(), scheduler.clone()),
            scheduler,
            clock,
        }
    }

    /// Set the site home URL, invalidated with every content change.
    #[must_use]
    pub fn with_home_url(mut self, home_url: impl Into<String>) -> Self {
        self.home_url = home_url.into();
        self
    }

    /// Set the filter applied to content-change batches.
    #[must_use]
    pub fn with_path_filter(mut self, filter: Arc<dyn PathFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Set the predicate deciding which content changes are purged.
    #[must_use]
    pub fn with_should_invalidate(mut self, predicate: Arc<dyn ShouldInvalidate>) -> Self {
        self.should_invalidate = predicate;
        self
    }

    /// Set the resolver for content paths.
    #[must_use]
    pub fn with_path_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the extra trace toggles.
    #[must_use]
    pub fn with_debug_logging(mut self, debug_logging: DebugLogging) -> Self {
        self.debug_logging = debug_logging;
        self
    }

    /// The active debounce policy.
    #[must_use]
    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    /// Submit a batch, deferring it if a submission happened recently.
    pub async fn submit(
        &self,
        batch: InvalidationBatch,
        force: bool,
    ) -> CoordinatorResult<SubmitOutcome> {
        if !force
            && self.policy.deferral_enabled
            && !batch.is_full_site()
            && let Some((true, until)) = self.debounce.get_with_expiry()?
        {
            return self.defer(&batch, until);
        }

        self.submit_now(&batch).await.map(SubmitOutcome::Submitted)
    }

    /// Run the deferred retry: send the pending batch once and clear it.
    pub async fn process_pending(&self) -> CoordinatorResult<RetryOutcome> {
        if let Some(message) = self.expire_pending()? {
            return Ok(RetryOutcome::Expired { message });
        }
        self.scheduler.clear()?;
        let Some(entry) = self.pending.get()? else {
            self.trace_scheduling("retry fired with nothing pending");
            return Ok(RetryOutcome::NothingPending);
        };

        let result = self.submit_now(&entry.batch).await;
        self.pending.delete()?;

        match result {
            Ok(result) => Ok(RetryOutcome::Submitted(result)),
            Err(e) => {
                warn!(error = %e, items = entry.batch.len(), "deferred invalidation failed");
                Ok(RetryOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Host scheduler entry point: runs the deferred retry once it is due.
    ///
    /// A pending batch whose timer is gone is sent right away. Returns `None`
    /// when nothing was due.
    pub async fn tick(&self) -> CoordinatorResult<Option<RetryOutcome>> {
        if let Some(message) = self.expire_pending()? {
            return Ok(Some(RetryOutcome::Expired { message }));
        }

        let now = self.clock.now();
        match self.scheduler.next_scheduled()? {
            Some(due) if due <= now => {
                self.trace_scheduling("deferred retry is due");
                self.process_pending().await.map(Some)
            }
            Some(due) => {
                if self.debug_logging.task_scheduling {
                    info!(due = %due, "deferred retry not yet due");
                }
                Ok(None)
            }
            None if self.pending.get()?.is_some() => {
                warn!("pending invalidation has no retry timer, sending it now");
                self.process_pending().await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// React to a content state change.
    ///
    /// Returns `None` when the change does not need an invalidation.
    pub async fn on_content_change(
        &self,
        previous_state: &str,
        new_state: &str,
        content_id: &str,
    ) -> CoordinatorResult<Option<SubmitOutcome>> {
        if !self
            .should_invalidate
            .should_invalidate(previous_state, new_state, content_id)
        {
            debug!(content_id, previous_state, new_state, "content change needs no invalidation");
            return Ok(None);
        }

        let mut builder = BatchBuilder::new(self.policy.max_items);
        builder.put(&self.home_url);
        for path in self.resolver.related_paths(content_id) {
            if path.ends_with('*') {
                builder.put(&path);
            } else {
                builder.put(&format!("{path}*"));
            }
        }
        builder.apply_external_filter(
            self.filter.as_ref(),
            &FilterContext {
                content_id: Some(content_id.to_owned()),
            },
        );

        info!(content_id, items = ?builder.get_items(), "content change triggers invalidation");
        self.submit(builder.build(), false).await.map(Some)
    }

    /// Submit a batch of caller-supplied paths or URLs.
    pub async fn invalidate_paths(
        &self,
        paths: &[String],
        force: bool,
    ) -> CoordinatorResult<SubmitOutcome> {
        let mut builder = BatchBuilder::new(self.policy.max_items);
        for path in paths {
            builder.put(path);
        }
        self.submit(builder.build(), force).await
    }

    /// Invalidate the whole distribution immediately.
    pub async fn invalidate_all(&self) -> CoordinatorResult<InvalidationResult> {
        self.submit_now(&InvalidationBatch::full_site(self.policy.max_items))
            .await
    }

    /// The current status.
    pub fn get_status(&self) -> CoordinatorResult<CoordinatorStatus> {
        Ok(self.status.get_status()?)
    }

    /// The pending entry, if any.
    pub fn pending(&self) -> CoordinatorResult<Option<PendingQueueEntry>> {
        self.expire_pending()?;
        Ok(self.pending.get()?)
    }

    /// Drop a pending entry that lapsed unsent and record it as an error.
    fn expire_pending(&self) -> CoordinatorResult<Option<String>> {
        let Some(entry) = self.pending.take_expired()? else {
            return Ok(None);
        };

        let message = format!(
            "deferred invalidation of {} paths expired before its retry ran",
            entry.batch.len()
        );
        warn!(items = ?entry.batch.effective_items(), "{message}");
        self.scheduler.clear()?;
        self.status.set_error(&message)?;
        Ok(Some(message))
    }

    fn defer(
        &self,
        batch: &InvalidationBatch,
        debounce_until: DateTime<Utc>,
    ) -> CoordinatorResult<SubmitOutcome> {
        self.expire_pending()?;
        let now = self.clock.now();
        let mut entry = self.pending.get()?.unwrap_or_else(|| PendingQueueEntry {
            batch: InvalidationBatch::new(batch.max_items()),
            debounce_until,
        });
        entry.batch.merge(batch);
        entry.debounce_until = debounce_until;
        self.pending.set(&entry, self.policy.pending_ttl())?;

        let at = now
            .checked_add_signed(
                self.policy
                    .retry_interval
                    .min(TimeDelta::seconds(MAX_TTL_SECS)),
            )
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let newly_scheduled = self.scheduler.schedule(at, self.policy.pending_ttl())?;
        let next_retry = self.scheduler.next_scheduled()?.unwrap_or(at);

        if self.debug_logging.task_scheduling {
            info!(
                next_retry = %next_retry,
                newly_scheduled,
                pending_items = entry.batch.len(),
                debounce_until = %debounce_until,
                "deferred invalidation batch"
            );
        } else {
            debug!(pending_items = entry.batch.len(), "deferred invalidation batch");
        }

        Ok(SubmitOutcome::Deferred {
            next_retry,
            pending_items: entry.batch.len(),
        })
    }

    async fn submit_now(&self, batch: &InvalidationBatch) -> CoordinatorResult<InvalidationResult> {
        let target = match self.settings.get_distribution_config().target() {
            Ok(target) => target,
            Err(e) => {
                self.status.set_error(&e.to_string())?;
                return Err(e.into());
            }
        };

        self.debounce.set(&true, self.policy.debounce_window)?;
        self.status.set_processing()?;

        match self
            .client
            .create_invalidation(&target.distribution_id, batch)
            .await
        {
            Ok(result) => {
                self.status.set_completed(result.id.clone())?;
                if let Some(entry) = self.pending.get()?
                    && entry.batch == *batch
                {
                    self.pending.delete()?;
                }
                Ok(result)
            }
            Err(e) => {
                let error = CoordinatorError::from(e);
                self.status.set_error(&error.to_string())?;
                Err(error)
            }
        }
    }

    fn trace_scheduling(&self, message: &str) {
        if self.debug_logging.task_scheduling {
            info!("{message}");
        }
    }
}

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::interval;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::StalenessFilter;
use crate::async_task::spawn_task;
use crate::ControllerConfig;
use crate::ControllerMetrics;
use crate::ConvoyConfig;
use crate::Error;
use crate::EventHandler;
use crate::Notifier;
use crate::RateLimitingQueue;
use crate::ReconcileError;
use crate::ResourceKey;
use crate::Result;
use crate::Synchronizer;

/// What happened to a key that reconciled without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event was handed to the notifier
    Dispatched,
    /// The event predates the staleness reference and was skipped
    Stale,
}

/// Releases an in-flight key when dropped, whatever the reconcile outcome
struct InFlight<'a> {
    queue: &'a RateLimitingQueue,
    key: ResourceKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

/// Drives observed events from the synchronizer to the notifier.
///
/// The synchronizer reports additions through [`EventHandler`]; keys go through the rate
/// limited queue and are reconciled by a fixed pool of workers.
pub struct Controller<S, N> {
    synchronizer: Arc<S>,
    notifier: Arc<N>,
    queue: Arc<RateLimitingQueue>,
    metrics: ControllerMetrics,
    staleness: StalenessFilter,
    config: ControllerConfig,
    /// 0 means unlimited
    max_retries: u32,
    shutdown: CancellationToken,
}

impl<S, N> Controller<S, N>
where
    S: Synchronizer,
    N: Notifier,
{
    /// Builds the controller and registers it with `synchronizer`.
    ///
    /// The staleness reference instant is captured here, once.
    pub fn new(
        synchronizer: Arc<S>,
        notifier: Arc<N>,
        config: &ConvoyConfig,
        metrics: ControllerMetrics,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let staleness = StalenessFilter::from_config(&config.staleness, Utc::now());
        debug!(reference = ?staleness.reference(), "staleness filter initialised");

        let controller = Arc::new(Self {
            synchronizer,
            notifier,
            queue: Arc::new(RateLimitingQueue::with_config(&config.queue)),
            metrics,
            staleness,
            config: config.controller.clone(),
            max_retries: config.queue.max_retries,
            shutdown,
        });
        controller
            .synchronizer
            .add_event_handler(controller.clone());
        controller
    }

    pub fn queue(&self) -> &Arc<RateLimitingQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    /// Waits for the cache, runs the worker pool until cancellation, then shuts the queue down
    /// and joins every worker.
    ///
    /// # Errors
    /// `Error::CacheSyncTimeout` when the cache does not sync in time (or cancellation comes
    /// first). No worker is started in that case.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        info!("Waiting for cache sync");
        if let Err(e) = self.wait_for_cache_sync().await {
            error!("{}", e);
            self.queue.shut_down();
            return Err(e);
        }
        info!("Caches are synced");

        let mut handles = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let controller = self.clone();
            spawn_task(
                &format!("reconcile-worker-{id}"),
                move || async move {
                    controller.run_worker(id).await;
                    Ok(())
                },
                Some(&mut handles),
            );
        }
        info!(workers = self.config.workers, "controller started");

        self.shutdown.cancelled().await;
        info!("Stopping controller");
        self.queue.shut_down();

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("reconcile worker panicked: {:?}", e);
            }
        }
        info!("controller stopped");
        Ok(())
    }

    /// Polls `has_synced` until it holds, the configured timeout elapses or `shutdown` fires.
    pub async fn wait_for_cache_sync(&self) -> Result<()> {
        let started = Instant::now();
        let deadline = self.config.cache_sync_timeout().map(|timeout| started + timeout);
        let expired = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        let mut ticker = interval(self.config.cache_sync_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = &mut expired => break,
                _ = ticker.tick() => {
                    if self.synchronizer.has_synced() {
                        return Ok(());
                    }
                }
            }
        }

        Err(Error::CacheSyncTimeout {
            waited: started.elapsed(),
        })
    }

    async fn run_worker(
        &self,
        id: usize,
    ) {
        debug!(worker = id, "reconcile worker started");
        while self.process_next_work_item().await {}
        debug!(worker = id, "reconcile worker stopped");
    }

    /// Handles one key. Returns false once the queue has shut down.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        let _in_flight = InFlight {
            queue: &self.queue,
            key: key.clone(),
        };
        self.record_queue_depth();

        match self.reconcile(&key).await {
            Ok(ReconcileOutcome::Dispatched) => {
                debug!(%key, "event dispatched");
                self.metrics.events_processed.inc();
                self.queue.forget(&key);
            }
            Ok(ReconcileOutcome::Stale) => {
                debug!(%key, "skipping stale event");
                self.metrics.events_stale.inc();
                self.queue.forget(&key);
            }
            Err(e) => self.handle_error(&key, e),
        }
        true
    }

    /// Resolves `key` against the cache and dispatches the event if it is fresh.
    pub async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> std::result::Result<ReconcileOutcome, ReconcileError> {
        let (namespace, name) = key.split()?;

        let event = self
            .synchronizer
            .get(namespace, name)
            .map_err(|source| ReconcileError::Lookup {
                key: key.clone(),
                source,
            })?
            .ok_or_else(|| ReconcileError::NotFound { key: key.clone() })?;

        if self.staleness.is_stale(&event) {
            return Ok(ReconcileOutcome::Stale);
        }

        self.notifier
            .dispatch(&event)
            .await
            .map_err(|source| ReconcileError::Dispatch {
                key: key.clone(),
                source,
            })?;
        Ok(ReconcileOutcome::Dispatched)
    }

    fn handle_error(
        &self,
        key: &ResourceKey,
        e: ReconcileError,
    ) {
        if !e.is_retryable() {
            match e {
                ReconcileError::NotFound { .. } => debug!("{}", e),
                _ => error!("{}", e),
            }
            self.queue.forget(key);
            return;
        }

        if matches!(e, ReconcileError::Dispatch { .. }) {
            self.metrics.dispatch_failures.inc();
        }

        let requeues = self.queue.num_requeues(key);
        if self.max_retries > 0 && requeues >= self.max_retries {
            warn!(%key, requeues, "dropping key after repeated failures: {}", e);
            self.metrics.items_dropped.inc();
            self.queue.forget(key);
            return;
        }

        warn!(%key, requeues, "error syncing, requeuing: {}", e);
        self.metrics.retries.inc();
        self.queue.add_rate_limited(key.clone());
        self.record_queue_depth();
    }

    fn record_queue_depth(&self) {
        let depth = self.queue.len() + self.queue.waiting_len();
        self.metrics.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

impl<S, N> EventHandler for Controller<S, N>
where
    S: Synchronizer,
    N: Notifier,
{
    fn on_add(
        &self,
        key: ResourceKey,
    ) {
        if self.queue.is_shutting_down() {
            debug!(%key, "queue is shutting down, ignoring event");
            return;
        }
        self.queue.add_rate_limited(key);
        self.metrics.events_queued.inc();
        self.record_queue_depth();
    }
}

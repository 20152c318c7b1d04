//! Controller observability counters.
//!
//! The counters live in an explicitly owned [`ControllerMetrics`] value with its own
//! prometheus [`Registry`]; nothing here is process-global. The registry can be served to a
//! scraper with [`start_server`].

use std::net::SocketAddr;

use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Error;
use crate::Result;


const METRICS_NAMESPACE: &str = "convoy";

#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,

    /// Keys handed to the queue by the synchronizer
    pub events_queued: IntCounter,
    /// Events successfully dispatched to the sink
    pub events_processed: IntCounter,
    /// Events dropped by the staleness filter
    pub events_stale: IntCounter,
    pub dispatch_failures: IntCounter,
    /// Rate-limited re-adds after a retryable failure
    pub retries: IntCounter,
    /// Keys given up on after exhausting `queue.max_retries`
    pub items_dropped: IntCounter,
    /// Keys ready for a worker at the last dequeue
    pub queue_depth: IntGauge,
}

impl std::fmt::Debug for ControllerMetrics {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ControllerMetrics")
            .field("events_queued", &self.events_queued.get())
            .field("events_processed", &self.events_processed.get())
            .finish_non_exhaustive()
    }
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some(METRICS_NAMESPACE.to_string()), None)
            .map_err(metrics_error)?;

        let metrics = Self {
            events_queued: IntCounter::with_opts(Opts::new(
                "events_queued_total",
                "Events enqueued for reconciliation",
            ))
            .map_err(metrics_error)?,
            events_processed: IntCounter::with_opts(Opts::new(
                "events_processed_total",
                "Events dispatched to the notification sink",
            ))
            .map_err(metrics_error)?,
            events_stale: IntCounter::with_opts(Opts::new(
                "events_stale_total",
                "Events dropped because they were created before the reference instant",
            ))
            .map_err(metrics_error)?,
            dispatch_failures: IntCounter::with_opts(Opts::new(
                "dispatch_failures_total",
                "Failed notification sink dispatches",
            ))
            .map_err(metrics_error)?,
            retries: IntCounter::with_opts(Opts::new(
                "retries_total",
                "Rate limited re-adds after a retryable failure",
            ))
            .map_err(metrics_error)?,
            items_dropped: IntCounter::with_opts(Opts::new(
                "items_dropped_total",
                "Keys dropped after exhausting the retry budget",
            ))
            .map_err(metrics_error)?,
            queue_depth: IntGauge::with_opts(Opts::new(
                "queue_depth",
                "Keys ready or scheduled for a worker",
            ))
            .map_err(metrics_error)?,
            registry,
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> Result<()> {
        let collectors: [Box<dyn prometheus::core::Collector>; 7] = [
            Box::new(self.events_queued.clone()),
            Box::new(self.events_processed.clone()),
            Box::new(self.events_stale.clone()),
            Box::new(self.dispatch_failures.clone()),
            Box::new(self.retries.clone()),
            Box::new(self.items_dropped.clone()),
            Box::new(self.queue_depth.clone()),
        ];
        for collector in collectors {
            self.registry.register(collector).map_err(metrics_error)?;
        }
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!("could not encode controller metrics: {}", e);
        }
        match String::from_utf8(buffer) {
            Ok(v) => v,
            Err(e) => {
                error!("controller metrics could not be from_utf8'd: {}", e);
                String::default()
            }
        }
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Fatal(format!("metric can not be created: {e}"))
}

fn metrics_route(
    metrics: ControllerMetrics
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("metrics")
        .and(warp::get())
        .map(move || metrics.clone())
        .and_then(metrics_handler)
}

async fn metrics_handler(metrics: ControllerMetrics) -> std::result::Result<impl Reply, Rejection> {
    Ok(metrics.encode())
}

/// Serves `GET /metrics` until `shutdown` is cancelled
pub async fn start_server(
    metrics: ControllerMetrics,
    addr: SocketAddr,
    shutdown: CancellationToken,
) {
    info!("metrics server listening on {}", addr);
    let (_, server) = warp::serve(metrics_route(metrics))
        .bind_with_graceful_shutdown(addr, async move {
            shutdown.cancelled().await;
        });
    server.await;
}

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use convoy::file_io;
use convoy::start_server;
use convoy::ChannelListWatch;
use convoy::Controller;
use convoy::ControllerMetrics;
use convoy::ConvoyConfig;
use convoy::Error;
use convoy::LogConfig;
use convoy::LogNotifier;
use convoy::Result;
use convoy::SharedInformer;
use convoy::WatchDelta;
use convoy::WatchedEvent;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Forwards fresh cluster events to an alerting sink.
///
/// The initial listing comes from `--snapshot`; live changes are read from stdin, one JSON
/// watch delta per line: `{"type":"Added","object":{...}}`.
#[derive(Parser, Debug)]
#[command(name = "convoy", version, about)]
struct Args {
    /// Configuration file (TOML or YAML), applied on top of `CONVOY_CONFIG`
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of events used as the initial listing
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = ConvoyConfig::new()?;
    if let Some(path) = &args.config {
        settings = settings.with_override_config(&path.to_string_lossy())?;
    }
    let settings = settings.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.log)?;
    info!(?settings, "configuration loaded");

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();

    let initial: Vec<WatchedEvent> = match &args.snapshot {
        Some(path) => file_io::read_json_file(path).await?,
        None => Vec::new(),
    };
    info!(objects = initial.len(), "initial listing loaded");

    let (list_watch, deltas) = ChannelListWatch::new(initial);
    let informer = Arc::new(SharedInformer::new(list_watch, &settings.informer));
    let metrics = ControllerMetrics::new()?;
    let notifier = Arc::new(LogNotifier::new(&settings.notifier));
    let controller = Controller::new(
        informer.clone(),
        notifier,
        &settings,
        metrics.clone(),
        shutdown.clone(),
    );

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(start_server(
            metrics,
            settings.monitoring.listen_addr(),
            shutdown.clone(),
        ));
    }

    let informer_task = informer.spawn(shutdown.clone());

    spawn_delta_reader(deltas)?;

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        });
    }

    // Start Controller
    if let Err(e) = controller.run().await {
        error!("controller stops: {:?}", e);
        shutdown.cancel();
        return Err(e);
    }

    match informer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => return Err(Error::Fatal(format!("informer task failed: {e}"))),
    }

    info!("Exiting program.");
    Ok(())
}

/// Feeds JSON-line watch deltas from stdin into the informer's channel.
///
/// Runs on a dedicated thread: a blocking stdin read must not hold up runtime shutdown.
/// Unparseable lines are skipped; EOF closes the channel.
fn spawn_delta_reader(deltas: mpsc::Sender<WatchDelta>) -> Result<()> {
    std::thread::Builder::new()
        .name("convoy-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("failed to read watch deltas from stdin: {:?}", e);
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WatchDelta>(&line) {
                    Ok(delta) => {
                        if deltas.blocking_send(delta).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("skipping malformed watch delta: {}", e),
                }
            }
            debug!("stdin closed, no more watch deltas");
        })?;
    Ok(())
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
        _ = shutdown.cancelled() => {
            return Ok(());
        },
    }

    info!("Shutdown server..");
    shutdown.cancel();
    Ok(())
}

pub fn init_observability(log: &LogConfig) -> Result<WorkerGuard> {
    let (non_blocking, guard) = match &log.log_dir {
        Some(log_dir) => {
            let log_file = file_io::open_file_for_append(&log_dir.join("convoy.log"))?;
            tracing_appender::non_blocking(log_file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(filter);
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use convoy::ChannelListWatch;
use convoy::Controller;
use convoy::ControllerMetrics;
use convoy::ConvoyConfig;
use convoy::DispatchError;
use convoy::EventType;
use convoy::Notifier;
use convoy::ObjectReference;
use convoy::ResourceKey;
use convoy::SharedInformer;
use convoy::WatchDelta;
use convoy::WatchedEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

pub type TestController = Controller<SharedInformer<ChannelListWatch>, FlakyNotifier>;

/// Sink failing the first `failures_per_key` dispatches of every key
#[derive(Default)]
pub struct FlakyNotifier {
    failures_per_key: u32,
    attempts: Mutex<HashMap<ResourceKey, u32>>,
    pub delivered: Mutex<Vec<ResourceKey>>,
}

impl FlakyNotifier {
    pub fn failing(failures_per_key: u32) -> Self {
        Self {
            failures_per_key,
            ..Default::default()
        }
    }

    pub fn attempts(
        &self,
        key: &ResourceKey,
    ) -> u32 {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for FlakyNotifier {
    async fn dispatch(
        &self,
        event: &WatchedEvent,
    ) -> Result<(), DispatchError> {
        let key = event.key();
        let attempt = {
            let mut attempts = self.attempts.lock();
            let attempt = attempts.entry(key.clone()).or_insert(0);
            *attempt += 1;
            *attempt
        };
        if attempt <= self.failures_per_key {
            return Err(DispatchError::Transport(format!("attempt {attempt} refused")));
        }
        self.delivered.lock().push(key);
        Ok(())
    }
}

/// Event created `offset_secs` from now
pub fn pod_event(
    namespace: &str,
    name: &str,
    offset_secs: i64,
) -> WatchedEvent {
    let mut event = WatchedEvent::new(
        namespace,
        name,
        Utc::now() + chrono::Duration::seconds(offset_secs),
    );
    event.involved_object = ObjectReference {
        kind: "Pod".to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    event.reason = "BackOff".to_string();
    event.message = "Back-off restarting failed container".to_string();
    event.event_type = EventType::Warning;
    event
}

pub fn test_config() -> ConvoyConfig {
    let mut config = ConvoyConfig::default();
    config.queue.bucket_enabled = false;
    config.controller.cache_sync_poll_interval_ms = 10;
    config
}

pub struct Pipeline {
    pub controller: Arc<TestController>,
    pub informer: Arc<SharedInformer<ChannelListWatch>>,
    pub notifier: Arc<FlakyNotifier>,
    pub deltas: mpsc::Sender<WatchDelta>,
    pub shutdown: CancellationToken,
    informer_task: JoinHandle<convoy::Result<()>>,
    controller_task: JoinHandle<convoy::Result<()>>,
}

impl Pipeline {
    /// Wires informer, controller and notifier together and starts them
    pub fn start(
        initial: Vec<WatchedEvent>,
        notifier: FlakyNotifier,
        config: &ConvoyConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (list_watch, deltas) = ChannelListWatch::new(initial);
        let informer = Arc::new(SharedInformer::new(list_watch, &config.informer));
        let notifier = Arc::new(notifier);
        let controller = Controller::new(
            informer.clone(),
            notifier.clone(),
            config,
            ControllerMetrics::new().expect("metrics"),
            shutdown.clone(),
        );

        let informer_task = informer.clone().spawn(shutdown.clone());
        let controller_task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run().await })
        };

        Self {
            controller,
            informer,
            notifier,
            deltas,
            shutdown,
            informer_task,
            controller_task,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.controller_task
            .await
            .expect("controller task")
            .expect("controller run");
        self.informer_task
            .await
            .expect("informer task")
            .expect("informer run");
    }
}

/// Polls `condition` under paused time until it holds
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

use std::time::Duration;

use convoy::ResourceKey;
use convoy::Synchronizer;
use convoy::WatchDelta;
use tokio::time;

use crate::common::eventually;
use crate::common::pod_event;
use crate::common::test_config;
use crate::common::FlakyNotifier;
use crate::common::Pipeline;
use crate::enable_logger;

#[tokio::test]
async fn test_fresh_events_reach_the_sink_and_stale_ones_do_not() {
    time::pause();
    enable_logger();
    let pipeline = Pipeline::start(
        vec![
            pod_event("default", "old", -3_600),
            pod_event("default", "fresh", 5),
        ],
        FlakyNotifier::default(),
        &test_config(),
    );

    pipeline
        .deltas
        .send(WatchDelta::Added(pod_event("kube-system", "dns", 5)))
        .await
        .unwrap();

    let notifier = pipeline.notifier.clone();
    let metrics = pipeline.controller.metrics().clone();
    eventually(|| notifier.delivered.lock().len() == 2 && metrics.events_stale.get() == 1).await;

    let mut delivered = notifier.delivered.lock().clone();
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            ResourceKey::new("default", "fresh"),
            ResourceKey::new("kube-system", "dns"),
        ]
    );
    assert_eq!(metrics.events_queued.get(), 3);
    assert_eq!(metrics.events_processed.get(), 2);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_transient_sink_failures_are_retried_until_delivered() {
    time::pause();
    let pipeline = Pipeline::start(vec![], FlakyNotifier::failing(2), &test_config());
    let key = ResourceKey::new("default", "web-1");

    pipeline
        .deltas
        .send(WatchDelta::Added(pod_event("default", "web-1", 5)))
        .await
        .unwrap();

    let notifier = pipeline.notifier.clone();
    eventually(|| notifier.delivered.lock().len() == 1).await;
    // No further attempts once delivered
    time::sleep(Duration::from_secs(5)).await;

    assert_eq!(notifier.attempts(&key), 3);
    let metrics = pipeline.controller.metrics();
    assert_eq!(metrics.retries.get(), 2);
    assert_eq!(metrics.dispatch_failures.get(), 2);
    assert_eq!(pipeline.controller.queue().num_requeues(&key), 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_object_deleted_before_processing_is_not_dispatched() {
    time::pause();
    let pipeline = Pipeline::start(vec![], FlakyNotifier::default(), &test_config());
    let informer = pipeline.informer.clone();
    eventually(|| informer.has_synced()).await;

    let event = pod_event("default", "short-lived", 5);
    pipeline
        .deltas
        .send(WatchDelta::Added(event.clone()))
        .await
        .unwrap();
    pipeline.deltas.send(WatchDelta::Deleted(event)).await.unwrap();

    time::sleep(Duration::from_secs(1)).await;

    assert!(pipeline.notifier.delivered.lock().is_empty());
    assert_eq!(pipeline.controller.metrics().events_queued.get(), 1);
    assert_eq!(pipeline.controller.metrics().retries.get(), 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_bounded_retries_drop_a_permanently_failing_key() {
    time::pause();
    let mut config = test_config();
    config.queue.max_retries = 3;
    let pipeline = Pipeline::start(
        vec![pod_event("default", "doomed", 5)],
        FlakyNotifier::failing(u32::MAX),
        &config,
    );

    let metrics = pipeline.controller.metrics().clone();
    eventually(|| metrics.items_dropped.get() == 1).await;
    time::sleep(Duration::from_secs(5)).await;

    let key = ResourceKey::new("default", "doomed");
    assert!(pipeline.notifier.delivered.lock().is_empty());
    // The observation itself counts as the first rate limited add
    assert_eq!(pipeline.notifier.attempts(&key), 3);
    assert_eq!(metrics.retries.get(), 2);
    assert_eq!(metrics.items_dropped.get(), 1);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_many_workers_deliver_each_event_once() {
    time::pause();
    let mut config = test_config();
    config.controller.workers = 4;
    let initial = (0..50)
        .map(|i| pod_event("default", &format!("pod-{i}"), 5))
        .collect();
    let pipeline = Pipeline::start(initial, FlakyNotifier::failing(1), &config);

    let notifier = pipeline.notifier.clone();
    eventually(|| notifier.delivered.lock().len() >= 50).await;
    time::sleep(Duration::from_secs(2)).await;

    let mut delivered = notifier.delivered.lock().clone();
    assert_eq!(delivered.len(), 50);
    delivered.sort();
    delivered.dedup();
    assert_eq!(delivered.len(), 50);

    pipeline.stop().await;
}

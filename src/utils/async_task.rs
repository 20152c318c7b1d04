use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;

/// Runs `task` until it succeeds, bounding each attempt with `policy.timeout()`.
///
/// Failed attempts are retried after `policy.delay_for(attempt)` plus jitter. With
/// `policy.max_retries == 0` the task is retried forever; otherwise the last error is returned
/// once the budget is spent.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P, E>(
    mut task: F,
    policy: BackoffPolicy,
) -> std::result::Result<P, E>
where
    F: FnMut() -> T,
    T: Future<Output = std::result::Result<P, E>>,
    E: From<Elapsed> + Debug,
{
    let mut attempts: usize = 0;
    loop {
        let error = match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => {
                warn!("failed with error: {:?}", &error);
                error
            }
            Err(elapsed) => {
                warn!("task_with_timeout_and_exponential_backoff timeout: {:?}", &elapsed);
                E::from(elapsed)
            }
        };

        attempts += 1;
        if !policy.allows_retry(attempts) {
            warn!("Task failed after {} attempts", attempts);
            return Err(error);
        }

        let attempt = u32::try_from(attempts - 1).unwrap_or(u32::MAX);
        sleep(with_jitter(policy.delay_for(attempt))).await;
    }
}

/// Adds up to 10% random jitter so that restarted watchers do not relist in lockstep
pub(crate) fn with_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = u64::try_from(delay.as_millis() / 10).unwrap_or(u64::MAX);
    if max_jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
}

/// Spawns `task_fn` and tracks its handle in `handles` when given.
///
/// Errors returned by the task are logged under `name`.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

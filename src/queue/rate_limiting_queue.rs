use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::default_controller_rate_limiter;
use super::RateLimiter;
use crate::QueueConfig;
use crate::ResourceKey;

/// Key scheduled for a delayed add
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct WaitingEntry {
    ready_at: Instant,
    // Tie breaker keeping equal deadlines in insertion order
    seq: u64,
    key: ResourceKey,
}

#[derive(Default)]
struct QueueState {
    /// Keys ready for a worker, in arrival order
    ready: VecDeque<ResourceKey>,
    /// Keys that need processing: everything in `ready` plus in-flight keys re-added while
    /// being processed
    dirty: HashSet<ResourceKey>,
    /// Keys currently held by a worker
    processing: HashSet<ResourceKey>,
    /// Delayed adds, earliest first. Entries superseded in `waiting_ready_at` are skipped.
    waiting: BinaryHeap<Reverse<WaitingEntry>>,
    waiting_ready_at: HashMap<ResourceKey, Instant>,
    next_seq: u64,
    shutting_down: bool,
}

impl QueueState {
    /// Returns true when the key became ready for a worker.
    fn insert(
        &mut self,
        key: ResourceKey,
    ) -> bool {
        if self.shutting_down {
            return false;
        }
        if !self.dirty.insert(key.clone()) {
            // Already waiting for a worker, or already marked for redelivery
            return false;
        }
        if self.processing.contains(&key) {
            trace!(%key, "key is in flight, marked dirty");
            return false;
        }
        self.ready.push_back(key);
        true
    }

    /// Returns true when `ready_at` became the earliest waiting deadline.
    fn schedule(
        &mut self,
        key: ResourceKey,
        ready_at: Instant,
    ) -> bool {
        if let Some(existing) = self.waiting_ready_at.get(&key) {
            if *existing <= ready_at {
                return false;
            }
        }
        let earliest = self.next_deadline().map_or(true, |deadline| ready_at < deadline);

        self.waiting_ready_at.insert(key.clone(), ready_at);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.waiting.push(Reverse(WaitingEntry { ready_at, seq, key }));
        earliest
    }

    /// Moves every due waiting key into the ready queue.
    fn promote_due(
        &mut self,
        now: Instant,
    ) {
        while let Some(Reverse(entry)) = self.waiting.peek() {
            if entry.ready_at > now {
                break;
            }
            let Some(Reverse(entry)) = self.waiting.pop() else {
                break;
            };
            if self.waiting_ready_at.get(&entry.key) != Some(&entry.ready_at) {
                // Superseded by an earlier schedule for the same key
                continue;
            }
            self.waiting_ready_at.remove(&entry.key);
            self.insert(entry.key);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.waiting.peek().map(|Reverse(entry)| entry.ready_at)
    }
}

/// Deduplicating, rate limited queue of resource keys shared by all workers.
///
/// All state sits behind one mutex that is never held across an await point; callers need no
/// locking of their own. Blocked [`get`](Self::get) calls park on a [`Notify`] and wake up when a
/// key becomes ready, the earliest delayed key is due, or the queue shuts down.
pub struct RateLimitingQueue {
    state: Mutex<QueueState>,
    /// Wakes getters
    notify: Notify,
    /// Wakes `shut_down_with_drain` when the last in-flight key is released
    drained: Notify,
    rate_limiter: Box<dyn RateLimiter>,
}

impl RateLimitingQueue {
    pub fn new(rate_limiter: Box<dyn RateLimiter>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            drained: Notify::new(),
            rate_limiter,
        }
    }

    pub fn with_config(config: &QueueConfig) -> Self {
        Self::new(default_controller_rate_limiter(config))
    }

    /// Makes `key` ready for immediate processing.
    ///
    /// No-op when the key is already queued. An in-flight key is marked dirty and redelivered after
    /// its current worker calls [`done`](Self::done). Ignored once the queue is shutting down.
    pub fn add(
        &self,
        key: ResourceKey,
    ) {
        let became_ready = self.state.lock().insert(key);
        if became_ready {
            self.notify.notify_one();
        }
    }

    /// Adds `key` once `delay` has elapsed. If the key is already waiting, the earlier deadline
    /// wins.
    pub fn add_after(
        &self,
        key: ResourceKey,
        delay: Duration,
    ) {
        if delay.is_zero() {
            return self.add(key);
        }

        let earliest = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            state.schedule(key, Instant::now() + delay)
        };
        if earliest {
            // Sleeping getters must recompute their deadline
            self.notify.notify_waiters();
        }
    }

    /// Adds `key` after the rate limiter's delay for it, recording one more failure.
    pub fn add_rate_limited(
        &self,
        key: ResourceKey,
    ) {
        if self.is_shutting_down() {
            return;
        }
        let delay = self.rate_limiter.when(&key);
        trace!(%key, ?delay, "rate limited add");
        self.add_after(key, delay);
    }

    /// Waits for the next ready key and marks it in flight.
    ///
    /// Returns `None` once the queue is shutting down; every later call returns `None` too.
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting the state so no wakeup is lost in between
            notified.as_mut().enable();

            let deadline = {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                state.promote_due(Instant::now());
                if let Some(key) = state.ready.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                state.next_deadline()
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Releases an in-flight key. A key re-added while in flight becomes ready again.
    pub fn done(
        &self,
        key: &ResourceKey,
    ) {
        let (requeued, drained) = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            let requeued = !state.shutting_down && state.dirty.contains(key);
            if requeued {
                state.ready.push_back(key.clone());
            }
            (requeued, state.processing.is_empty())
        };

        if requeued {
            trace!(%key, "dirty key requeued after done");
            self.notify.notify_one();
        }
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Clears the failure history of `key`. In-flight and dirty state are untouched.
    pub fn forget(
        &self,
        key: &ResourceKey,
    ) {
        self.rate_limiter.forget(key);
    }

    pub fn num_requeues(
        &self,
        key: &ResourceKey,
    ) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Stops the queue. Idempotent.
    ///
    /// Ready and delayed keys are discarded and later adds are ignored; every blocked and future
    /// `get` returns `None`. In-flight keys are left to finish and may still call `done`.
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
            let discarded = state.ready.len() + state.waiting_ready_at.len();
            state.ready.clear();
            state.dirty.clear();
            state.waiting.clear();
            state.waiting_ready_at.clear();
            debug!(
                discarded,
                in_flight = state.processing.len(),
                "work queue shutting down"
            );
        }
        self.notify.notify_waiters();
    }

    /// Shuts the queue down, then waits until no key is in flight.
    pub async fn shut_down_with_drain(&self) {
        self.shut_down();
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            let idle = self.state.lock().processing.is_empty();
            if idle {
                return;
            }
            drained.await;
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Keys ready for a worker
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys scheduled for a delayed add
    pub fn waiting_len(&self) -> usize {
        self.state.lock().waiting_ready_at.len()
    }

    /// Keys currently held by a worker
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().processing.len()
    }
}

//! Keyed periodic pollers.
//!
//! A poller runs its steps serially on a tokio task, once per interval, until a step returns
//! [`StepOutcome::Stop`], the poller is not repeating, or it is stopped. At most one poller is
//! live per key.

mod step;
pub use step::{StepOutcome, Steps, WorkflowStep};

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::CoreError,
    metrics::{MetricsHandle, noop_metrics},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    /// Registered, not started.
    Created,
    /// Ticking.
    Running,
    /// Stopped, finished, or never registered.
    Stopped,
}

struct Entry {
    generation: u64,
    interval: Duration,
    repeat: bool,
    status: PollerStatus,
    /// Present until the poller is started.
    steps: Option<Steps>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    pollers: Mutex<HashMap<String, Entry>>,
    generation: AtomicU64,
    metrics: MetricsHandle,
}

/// Registry and scheduler of pollers.
#[derive(Clone)]
pub struct PollingService {
    inner: Arc<Inner>,
}

impl PollingService {
    pub fn new() -> Self {
        Self::with_metrics(noop_metrics())
    }

    pub fn with_metrics(metrics: MetricsHandle) -> Self {
        Self {
            inner: Arc::new(Inner {
                pollers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                metrics,
            }),
        }
    }

    fn pollers(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a poller under `key`.
    ///
    /// A live poller already registered under the same key is stopped, and its in-flight tick
    /// awaited, before the new one is stored.
    #[instrument(level = "debug", skip(self, steps), fields(steps = steps.len()))]
    pub async fn create_poller(
        &self,
        key: &str,
        steps: Steps,
        interval: Duration,
        repeat: bool,
    ) -> Result<(), CoreError> {
        if interval.is_zero() {
            return Err(CoreError::Configuration(format!(
                "poller {key}: interval must be non-zero"
            )));
        }

        let previous = self.pollers().remove(key);
        if let Some(previous) = previous {
            debug!(key, "replacing live poller");
            shutdown(key, previous).await;
        }

        let entry = Entry {
            generation: self.inner.generation.fetch_add(1, Ordering::Relaxed),
            interval,
            repeat,
            status: PollerStatus::Created,
            steps: Some(steps),
            cancel: CancellationToken::new(),
            handle: None,
        };
        let displaced = self.pollers().insert(key.to_string(), entry);
        if let Some(displaced) = displaced {
            shutdown(key, displaced).await;
        }
        trace!(key, "poller created");
        Ok(())
    }

    /// Start ticking `key` on a background task. Returns immediately.
    ///
    /// Starting a running poller is a no-op.
    pub fn start_one(&self, key: &str) -> Result<(), CoreError> {
        let mut pollers = self.pollers();
        let entry = pollers
            .get_mut(key)
            .ok_or_else(|| CoreError::PollerNotFound(key.to_string()))?;

        let Some(steps) = entry.steps.take() else {
            return Ok(());
        };

        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.inner),
            key.to_string(),
            entry.generation,
            steps,
            entry.interval,
            entry.repeat,
            entry.cancel.clone(),
        ));
        entry.handle = Some(handle);
        entry.status = PollerStatus::Running;

        let active = count_running(&pollers);
        drop(pollers);
        self.inner.metrics.record_active_pollers(active);
        debug!(key, "poller started");
        Ok(())
    }

    /// Stop `key` and wait for its in-flight tick to finish.
    ///
    /// Unknown or already stopped keys are ignored. No tick starts after this returns.
    /// Must not be awaited from one of the poller's own steps; return [`StepOutcome::Stop`]
    /// instead.
    pub async fn stop_one(&self, key: &str) {
        let entry = self.pollers().remove(key);
        match entry {
            Some(entry) => {
                shutdown(key, entry).await;
                let active = count_running(&self.pollers());
                self.inner.metrics.record_active_pollers(active);
                debug!(key, "poller stopped");
            }
            None => trace!(key, "stop requested for unknown poller"),
        }
    }

    /// Stop every poller.
    pub async fn stop_all(&self) {
        let entries: Vec<(String, Entry)> = self.pollers().drain().collect();
        for (key, entry) in entries {
            shutdown(&key, entry).await;
        }
        self.inner.metrics.record_active_pollers(0);
    }

    pub fn status(&self, key: &str) -> PollerStatus {
        self.pollers()
            .get(key)
            .map(|e| e.status)
            .unwrap_or(PollerStatus::Stopped)
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.status(key) == PollerStatus::Running
    }

    /// Keys of all registered pollers, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pollers().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for PollingService {
    fn default() -> Self {
        Self::new()
    }
}

fn count_running(pollers: &HashMap<String, Entry>) -> usize {
    pollers
        .values()
        .filter(|e| e.status == PollerStatus::Running)
        .count()
}

async fn shutdown(key: &str, entry: Entry) {
    entry.cancel.cancel();
    if let Some(handle) = entry.handle
        && let Err(e) = handle.await
    {
        warn!(key, error = %e, "poller task ended abnormally");
    }
}

async fn tick_loop(
    inner: Arc<Inner>,
    key: String,
    generation: u64,
    mut steps: Steps,
    interval: Duration,
    repeat: bool,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(key, "poller cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let mut finished = false;
        for step in steps.iter_mut() {
            trace!(key, step = step.name(), "running step");
            if step.run().await == StepOutcome::Stop {
                debug!(key, step = step.name(), "step reported terminal outcome");
                finished = true;
                break;
            }
        }

        if finished || !repeat {
            break;
        }
    }

    // self-stop: drop our own registration unless a newer poller took the key
    let mut pollers = inner.pollers.lock().unwrap_or_else(PoisonError::into_inner);
    if pollers.get(&key).is_some_and(|e| e.generation == generation) {
        pollers.remove(&key);
    }
    let active = count_running(&pollers);
    drop(pollers);
    inner.metrics.record_active_pollers(active);
    debug!(key, "poller finished");
}

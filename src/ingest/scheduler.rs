// src/ingest/scheduler.rs
//! Process-wide timer that runs `Pipeline::commit` on a fixed interval.
//!
//! Lifecycle: `Uninitialized → Running → Stopped`. `start` while running is a
//! no-op, `stop` aborts the task and clears the handle. Nothing is persisted:
//! a restarted process begins a fresh interval and never backfills missed ticks.

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::ingest::pipeline::Pipeline;

/// Time source for the scheduler loop.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick; `false` ends the loop.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker. First tick fires one full period after creation.
pub struct IntervalTicker {
    inner: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut inner = interval_at(Instant::now() + period, period);
        inner.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { inner }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.inner.tick().await;
        true
    }
}

/// Ticks on demand; dropping every sender ends the loop.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    pub fn channel() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Running,
    Stopped,
}

pub struct IngestScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    runs: Arc<watch::Sender<u64>>,
}

impl Default for IngestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestScheduler {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            task: Mutex::new(None),
            started: AtomicBool::new(false),
            runs: Arc::new(tx),
        }
    }

    /// Start the loop. Returns `false` without side effects if already running.
    pub fn start<T>(&self, pipeline: Arc<Pipeline>, ticker: T) -> bool
    where
        T: Ticker + 'static,
    {
        let mut slot = self.task.lock().expect("scheduler mutex poisoned");
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!(target: "ingest", "scheduler already running; start ignored");
            return false;
        }

        let runs = self.runs.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = ticker;
            while ticker.tick().await {
                counter!("ingest_scheduler_ticks_total").increment(1);

                // Own task per run: a panicking run must not take the timer down.
                let p = pipeline.clone();
                match tokio::spawn(async move { p.commit().await }).await {
                    Ok(r) => tracing::info!(
                        target: "ingest",
                        success = r.success,
                        created = r.articles_created,
                        errors = r.errors.len(),
                        "scheduled ingest tick"
                    ),
                    Err(e) => tracing::error!(target: "ingest", error = %e, "scheduled ingest run failed"),
                }
                runs.send_modify(|n| *n += 1);
            }
            tracing::info!(target: "ingest", "scheduler ticker closed");
        });

        *slot = Some(handle);
        self.started.store(true, Ordering::SeqCst);
        tracing::info!(target: "ingest", "scheduler started");
        true
    }

    /// Abort the loop and clear the handle. Returns whether it was running.
    pub fn stop(&self) -> bool {
        let handle = self.task.lock().expect("scheduler mutex poisoned").take();
        match handle {
            Some(h) => {
                let was_running = !h.is_finished();
                h.abort();
                tracing::info!(target: "ingest", "scheduler stopped");
                was_running
            }
            None => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if !self.started.load(Ordering::SeqCst) {
            return SchedulerState::Uninitialized;
        }
        let slot = self.task.lock().expect("scheduler mutex poisoned");
        match slot.as_ref() {
            Some(h) if !h.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Completed runs since creation (including runs that panicked).
    pub fn runs_completed(&self) -> u64 {
        *self.runs.borrow()
    }

    pub fn subscribe_runs(&self) -> watch::Receiver<u64> {
        self.runs.subscribe()
    }
}

static GLOBAL: Lazy<IngestScheduler> = Lazy::new(IngestScheduler::new);

/// The process-wide scheduler.
pub fn global() -> &'static IngestScheduler {
    &GLOBAL
}

/// Start the process-wide scheduler on a wall-clock interval (idempotent).
pub fn initialize(pipeline: Arc<Pipeline>, period: Duration) -> bool {
    global().start(pipeline, IntervalTicker::new(period))
}

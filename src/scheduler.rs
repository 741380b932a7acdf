//! Named periodic background tasks.
//!
//! Each registered task gets its own tokio loop. A loop awaits the task
//! before waiting for its next tick, so one task never runs concurrently
//! with itself, and ticks missed while it was busy are skipped rather than
//! replayed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct Scheduler {
    cancel: CancellationToken,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` every `every`, first one period after registration.
    pub fn schedule_recurring<F, Fut>(
        &self,
        name: impl Into<String>,
        every: Duration,
        task: F,
    ) -> anyhow::Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        anyhow::ensure!(!every.is_zero(), "interval for task {} must be non-zero", name);
        anyhow::ensure!(!self.cancel.is_cancelled(), "scheduler is stopped");

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.contains_key(&name) {
            anyhow::bail!("task {} is already scheduled", name);
        }

        let cancel = self.cancel.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(task = %task_name, every_ms = every.as_millis() as u64, "recurring task started");

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                debug!(task = %task_name, "tick");
                task().await;
            }
            info!(task = %task_name, "recurring task stopped");
        });

        tasks.insert(name, handle);
        Ok(())
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }

    /// Prevent any further invocations. A task already running finishes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for every loop to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain().collect()
        };
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!(task = %name, error = %e, "recurring task ended abnormally");
            }
        }
    }
}

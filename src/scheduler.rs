//! Periodic batch scheduling.
//!
//! The schedule is an owned value: a fixed interval anchored at the start time
//! and then at each fire. `next_fire_time` is a pure function of that state, so
//! it can be reported and tested without running the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fixed-interval schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    interval: Duration,
    started_at: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
}

impl Scheduler {
    /// Creates a schedule anchored at the current time.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Utc::now())
    }

    /// Creates a schedule anchored at `started_at`.
    pub fn starting_at(interval: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            interval,
            started_at,
            last_fire: None,
        }
    }

    /// Interval between fires.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time of the last fire, if the schedule has fired.
    pub fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.last_fire
    }

    /// `last_fire` (or the start time) plus the interval.
    pub fn next_fire_time(&self) -> DateTime<Utc> {
        let anchor = self.last_fire.unwrap_or(self.started_at);
        TimeDelta::from_std(self.interval)
            .ok()
            .and_then(|delta| anchor.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Marks the schedule as fired at `at`.
    pub fn record_fire(&mut self, at: DateTime<Utc>) {
        self.last_fire = Some(at);
    }

    /// Runs `job` at every fire on a background task until `cancel` fires.
    ///
    /// The job is awaited before the next wait starts, so fires never overlap.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, job: F) -> SchedulerHandle
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let state = Arc::new(Mutex::new(self));
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                let wait = {
                    let schedule = task_state.lock().await;
                    let next = schedule.next_fire_time();
                    debug!("Next scheduled batch at {}", next.to_rfc3339());
                    (next - Utc::now()).to_std().unwrap_or(Duration::ZERO)
                };

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                task_state.lock().await.record_fire(Utc::now());
                job().await;
            }
            info!("Scheduler stopped");
        });
        SchedulerHandle { state, task }
    }
}

/// Handle to a running schedule.
pub struct SchedulerHandle {
    state: Arc<Mutex<Scheduler>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Next planned fire.
    pub async fn next_fire_time(&self) -> DateTime<Utc> {
        self.state.lock().await.next_fire_time()
    }

    /// Time of the last fire.
    pub async fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_fire()
    }

    /// Whether the background loop is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Waits for the loop to exit after cancellation.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("Scheduler task failed: {e}");
        }
    }
}

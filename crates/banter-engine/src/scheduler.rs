//! # Periodic task scheduler
//!
//! Owns named periodic tasks with independent periods and independent
//! cancellation, instead of one ad hoc background loop per feature. Tasks
//! fire as [`SchedulerEvent`]s; the consumer decides what a label means.
//!
//! A freshly added task is due immediately, then every `period` thereafter.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, mpsc};
use tracing::{debug, info, warn};

/// A named recurring task.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    /// Unique label; also the dedupe key.
    pub label: String,
    pub period: Duration,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub fire_count: u64,
    pub last_fired: Option<DateTime<Utc>>,
}

/// Emitted when a task should fire.
#[derive(Debug, Clone)]
pub struct SchedulerEvent {
    pub label: String,
}

/// The periodic scheduler.
pub struct Scheduler {
    tasks: Arc<TokioMutex<HashMap<String, PeriodicTask>>>,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

fn is_due(task: &PeriodicTask, now: DateTime<Utc>) -> bool {
    match task.last_fired {
        None => true,
        Some(last) => now
            .signed_duration_since(last)
            .to_std()
            .map(|elapsed| elapsed >= task.period)
            .unwrap_or(false),
    }
}

impl Scheduler {
    /// Create a new scheduler. Returns the scheduler and a receiver for its
    /// events.
    pub fn new() -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let scheduler = Self {
            tasks: Arc::new(TokioMutex::new(HashMap::new())),
            event_tx,
        };
        (scheduler, event_rx)
    }

    /// A handle for adding/removing tasks from other async contexts.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tasks: self.tasks.clone(),
        }
    }

    /// Run the scheduler loop. Spawn this as a background task; dropping
    /// the spawned task at shutdown cancels every schedule with it.
    pub async fn run(self) {
        let check_interval = Duration::from_secs(10);
        info!("scheduler started — checking every 10s");

        loop {
            tokio::time::sleep(check_interval).await;

            let now = Utc::now();
            let mut tasks = self.tasks.lock().await;

            for task in tasks.values_mut() {
                if !task.active || !is_due(task, now) {
                    continue;
                }

                debug!(
                    label = %task.label,
                    fire_count = task.fire_count + 1,
                    "scheduler firing task"
                );

                let event = SchedulerEvent {
                    label: task.label.clone(),
                };
                if self.event_tx.send(event).await.is_err() {
                    warn!("scheduler event channel closed — shutting down");
                    return;
                }

                task.fire_count += 1;
                task.last_fired = Some(now);
            }
        }
    }
}

/// A clone-able handle for managing scheduled tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    tasks: Arc<TokioMutex<HashMap<String, PeriodicTask>>>,
}

impl SchedulerHandle {
    /// Add a periodic task. If an active task with the same label exists,
    /// this is a no-op.
    pub async fn add_periodic(&self, label: impl Into<String>, period: Duration) {
        let label = label.into();
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(&label) {
            if existing.active {
                info!(%label, "periodic task already exists — skipping");
                return;
            }
        }
        info!(%label, period_secs = period.as_secs(), "scheduled periodic task");
        tasks.insert(
            label.clone(),
            PeriodicTask {
                label,
                period,
                created_at: Utc::now(),
                active: true,
                fire_count: 0,
                last_fired: None,
            },
        );
    }

    /// Remove a task by label.
    pub async fn remove(&self, label: &str) -> bool {
        self.tasks.lock().await.remove(label).is_some()
    }

    /// List all tasks.
    pub async fn list(&self) -> Vec<PeriodicTask> {
        self.tasks.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(period_secs: u64, last_fired: Option<DateTime<Utc>>) -> PeriodicTask {
        PeriodicTask {
            label: "t".into(),
            period: Duration::from_secs(period_secs),
            created_at: Utc::now(),
            active: true,
            fire_count: 0,
            last_fired,
        }
    }

    #[test]
    fn fresh_task_is_due_immediately() {
        assert!(is_due(&task(1200, None), Utc::now()));
    }

    #[test]
    fn task_is_due_after_period_elapses() {
        let now = Utc::now();
        let recent = task(1200, Some(now - chrono::Duration::seconds(60)));
        let stale = task(1200, Some(now - chrono::Duration::seconds(1201)));
        assert!(!is_due(&recent, now));
        assert!(is_due(&stale, now));
    }

    #[tokio::test]
    async fn add_periodic_dedupes_by_label() {
        let (scheduler, _rx) = Scheduler::new();
        let handle = scheduler.handle();
        handle.add_periodic("proactive", Duration::from_secs(60)).await;
        handle.add_periodic("proactive", Duration::from_secs(999)).await;
        let tasks = handle.list().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].period, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn remove_cancels_one_task_independently() {
        let (scheduler, _rx) = Scheduler::new();
        let handle = scheduler.handle();
        handle.add_periodic("a", Duration::from_secs(60)).await;
        handle.add_periodic("b", Duration::from_secs(60)).await;
        assert!(handle.remove("a").await);
        assert!(!handle.remove("a").await);
        let tasks = handle.list().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].label, "b");
    }
}

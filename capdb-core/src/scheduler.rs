//! Periodic task scheduling for the header-flush hook

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// A periodic task
pub type Task = Box<dyn Fn() + Send + Sync>;

/// Driver for periodic tasks; the store schedules its header flush here
pub trait Scheduler: Send + Sync {
    /// Run `task` repeatedly with a fixed delay of `period` between runs
    fn schedule(&self, period: Duration, task: Task);
}

/// Scheduler backed by plain threads, one per task
///
/// Tasks stop running when the scheduler is dropped.
pub struct ThreadScheduler {
    running: Arc<AtomicBool>,
}

impl ThreadScheduler {
    /// Create a new thread scheduler
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, period: Duration, task: Task) {
        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name("capdb-scheduler".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    thread::sleep(period);
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    task();
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn scheduler thread: {}", e);
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_periodic_task_runs() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);

        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                task_count.fetch_add(1, Ordering::Relaxed);
            }),
        );

        thread::sleep(Duration::from_millis(100));
        assert!(count.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn test_tasks_stop_on_drop() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);

        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                task_count.fetch_add(1, Ordering::Relaxed);
            }),
        );

        thread::sleep(Duration::from_millis(50));
        drop(scheduler);
        thread::sleep(Duration::from_millis(20));

        let settled = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        // at most one in-flight run after drop
        assert!(count.load(Ordering::Relaxed) <= settled + 1);
    }
}

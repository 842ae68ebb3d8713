// Scheduler backed by tokio interval timers
use crate::application::scheduler::{ScheduleHandle, Scheduler, TickCallback};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Default)]
pub struct TokioScheduler {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<ScheduleHandle, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.len())
            .unwrap_or_default()
    }
}

impl Scheduler for TokioScheduler {
    /// Must be called from within a tokio runtime. The first tick fires
    /// immediately, later ticks follow `interval`; late ticks are skipped
    /// rather than bunched up.
    fn every(&self, interval: Duration, callback: TickCallback) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback();
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(handle, task);
        }
        handle
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let task = self
            .tasks
            .lock()
            .ok()
            .and_then(|mut tasks| tasks.remove(&handle));

        match task {
            Some(task) => {
                task.abort();
                tracing::debug!("Cancelled schedule {:?}", handle);
            }
            None => tracing::warn!("Cancel for unknown schedule {:?}", handle),
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

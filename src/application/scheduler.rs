// Polling timer abstraction
use std::time::Duration;

pub type TickCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(pub u64);

pub trait Scheduler: Send + Sync {
    /// Invoke `callback` every `interval` until cancelled.
    fn every(&self, interval: Duration, callback: TickCallback) -> ScheduleHandle;

    fn cancel(&self, handle: ScheduleHandle);
}

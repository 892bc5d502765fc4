use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::event::{Event, EventSender};

/// Cancellable handle to the pending "no activity while the door is closed"
/// timer.
///
/// The delayed action is a spawned task that sleeps and then delivers
/// [`Event::TimerElapsed`] back through the engine's own channel, so expiry
/// is serialized with every other state transition. The generation number
/// lets the engine discard an expiry message that was already queued when the
/// timer got cancelled.
pub struct InactivityTimer {
    generation: u64,
    started: Instant,
    task: JoinHandle<()>,
}

impl InactivityTimer {
    /// Arm a timer that fires after `delay`.
    pub fn arm(generation: u64, delay: Duration, started: Instant, events: EventSender) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A closed channel means the engine is gone; nothing to deliver.
            let _ = events.send(Event::TimerElapsed { generation }).await;
        });
        Self {
            generation,
            started,
            task,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The instant this timer was armed, used for debounce comparison.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Cancel the delayed action. Idempotent: aborting a task that already
    /// finished or was already aborted is a no-op.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

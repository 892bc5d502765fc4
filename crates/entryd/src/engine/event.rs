//! Type-safe message set for the engine.
//!
//! Everything that can change controller state arrives as an [`Event`] on a
//! single bounded channel, which is what serializes the state machine.

use std::fmt;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;

/// Channel types for events INTO the engine. Bounded so a runaway producer
/// applies backpressure instead of exhausting memory.
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

/// The two watched input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorLine {
    Door,
    Motion,
}

impl fmt::Display for SensorLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorLine::Door => write!(f, "door"),
            SensorLine::Motion => write!(f, "motion"),
        }
    }
}

/// A single edge read failed at the hardware layer. The event it came with is
/// discarded; the next successful read supersedes it.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SensorFault(pub String);

/// Messages consumed by the engine loop.
#[derive(Debug)]
pub enum Event {
    /// An edge notification from one of the input lines. `reading` is the raw
    /// electrical value before any polarity inversion; `at` is the arrival
    /// timestamp used for debounce-window comparison.
    Sensor {
        line: SensorLine,
        reading: Result<bool, SensorFault>,
        at: Instant,
    },

    /// The inactivity timer with this generation ran to completion.
    TimerElapsed { generation: u64 },

    /// Stop the engine loop after cancelling any pending timer.
    Shutdown,
}

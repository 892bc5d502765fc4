//! Hardware adapters: indicator outputs and edge-watched sensor inputs.

mod indicators;
mod sensors;

pub use indicators::GpioIndicators;
pub use sensors::SensorPins;

use thiserror::Error;

/// The three indicator output lines owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Door,
    Motion,
    Timer,
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Indicator::Door => write!(f, "door"),
            Indicator::Motion => write!(f, "motion"),
            Indicator::Timer => write!(f, "timer"),
        }
    }
}

/// An indicator write failed. Non-fatal: the engine logs it and carries on.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct IndicatorError(pub String);

/// Synchronous sink for the indicator lines.
///
/// Writes happen inside the engine's event handlers, before the next event is
/// processed.
pub trait IndicatorSink: Send {
    fn set(&mut self, line: Indicator, on: bool) -> Result<(), IndicatorError>;
}

/// Recording sink for engine tests: remembers every write, shared through a
/// cloneable handle so tests can inspect after handing the sink over.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    writes: std::sync::Arc<std::sync::Mutex<Vec<(Indicator, bool)>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(Indicator, bool)> {
        self.writes.lock().unwrap().clone()
    }

    /// The most recent value written to `line`, if any.
    pub fn last(&self, line: Indicator) -> Option<bool> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(l, _)| *l == line)
            .map(|(_, on)| *on)
    }
}

#[cfg(test)]
impl IndicatorSink for RecordingSink {
    fn set(&mut self, line: Indicator, on: bool) -> Result<(), IndicatorError> {
        self.writes.lock().unwrap().push((line, on));
        Ok(())
    }
}

//! The network light boundary: a trait for the device, an MQTT
//! implementation, and the task that owns the client and drains the engine's
//! command queue.

mod mqtt;

pub use mqtt::MqttLight;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;

/// How long a single set-state command may take before it is abandoned.
/// Generous enough for a slow broker, short enough that the command task
/// keeps up with fresh decisions.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// A state-change request for the light, enqueued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightCommand {
    pub on: bool,
}

/// Channel types for commands OUT of the engine. Unbounded: the engine must
/// never block on a slow network.
pub type LightCommandSender = mpsc::UnboundedSender<LightCommand>;
pub type LightCommandReceiver = mpsc::UnboundedReceiver<LightCommand>;

#[derive(Debug, Error)]
pub enum LightError {
    /// The device could not be reached during the startup handshake.
    #[error("light device resolution failed: {0}")]
    Connect(String),

    /// A command was attempted before `resolve()` succeeded.
    #[error("light device not resolved")]
    NotResolved,

    /// A set-state command was rejected or lost.
    #[error("light command failed: {0}")]
    Command(String),
}

/// On/off control of the entry light.
///
/// Implementations may be slow or flaky; callers treat every command as
/// best-effort and idempotent (sending "on" while already on is harmless).
#[async_trait]
pub trait LightClient: Send {
    /// One-time startup handshake with the device. Failure here is fatal to
    /// the process.
    async fn resolve(&mut self) -> Result<(), LightError>;

    /// Command the light on or off. Safe to repeat.
    async fn set_state(&mut self, on: bool) -> Result<(), LightError>;
}

/// Owns the light client and drains the engine's command queue, one command
/// at a time so two commands can never race for the same decision.
///
/// Failures are logged and dropped: the next state-changing event re-issues
/// the desired state, so there is nothing useful to retry here.
pub async fn run_commands<C: LightClient>(mut client: C, mut rx: LightCommandReceiver) {
    while let Some(cmd) = rx.recv().await {
        match tokio::time::timeout(COMMAND_TIMEOUT, client.set_state(cmd.on)).await {
            Ok(Ok(())) => debug!("light set to {}", if cmd.on { "on" } else { "off" }),
            Ok(Err(e)) => error!("connection error to light device: {}", e),
            Err(_) => error!("light command timed out after {:?}", COMMAND_TIMEOUT),
        }
    }
}

/// Mock light client for testing: records commands, optionally failing them.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MockLight {
    commands: std::sync::Arc<std::sync::Mutex<Vec<bool>>>,
    pub fail_commands: bool,
    pub fail_resolve: bool,
    pub resolved: bool,
}

#[cfg(test)]
impl MockLight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<bool> {
        self.commands.lock().unwrap().clone()
    }

    /// Handle onto the shared command log, for inspection after the mock has
    /// been moved into a task.
    pub fn command_log(&self) -> std::sync::Arc<std::sync::Mutex<Vec<bool>>> {
        self.commands.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LightClient for MockLight {
    async fn resolve(&mut self) -> Result<(), LightError> {
        if self.fail_resolve {
            return Err(LightError::Connect("mock resolve failure".to_string()));
        }
        self.resolved = true;
        Ok(())
    }

    async fn set_state(&mut self, on: bool) -> Result<(), LightError> {
        if self.fail_commands {
            return Err(LightError::Command("mock command failure".to_string()));
        }
        self.commands.lock().unwrap().push(on);
        Ok(())
    }
}

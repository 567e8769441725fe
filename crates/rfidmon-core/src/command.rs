// ── Command channel ──
//
// The single outbound operation: ask the sensor to deactivate its alarm.
// Fire-and-forget. A command issued while the link is down is dropped
// with a warning; nothing is queued or retried.

use std::sync::{Mutex, PoisonError};

use rfidmon_api::{ConnectionManager, DeviceCommand, Error};
use tracing::{info, warn};

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Handed to the open socket.
    Sent,
    /// No open connection; nothing was transmitted.
    NotConnected,
    /// The link was open but the command could not be queued.
    Failed,
}

impl CommandOutcome {
    pub fn is_sent(self) -> bool {
        self == Self::Sent
    }
}

/// Warnings raised by a source, held until a consumer collects them.
#[derive(Debug, Default)]
pub struct Warnings {
    pending: Mutex<Vec<String>>,
}

impl Warnings {
    pub fn push(&self, warning: impl Into<String>) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.into());
    }

    /// Drain every pending warning, oldest first.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Routes device commands to the live connection.
pub struct CommandChannel {
    manager: ConnectionManager,
    warnings: Warnings,
}

impl CommandChannel {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            warnings: Warnings::default(),
        }
    }

    /// Send `{"command":"deactivate"}` if the link is open.
    pub fn send_deactivate(&self) -> CommandOutcome {
        let result = self.manager.send(DeviceCommand::Deactivate);
        self.record(result)
    }

    fn record(&self, result: Result<(), Error>) -> CommandOutcome {
        match result {
            Ok(()) => {
                info!(url = %self.manager.url(), "deactivate command sent");
                CommandOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "deactivate command not sent");
                self.warnings.push(format!("deactivate not sent: {e}"));
                if matches!(e, Error::NotConnected) {
                    CommandOutcome::NotConnected
                } else {
                    CommandOutcome::Failed
                }
            }
        }
    }

    pub fn take_warnings(&self) -> Vec<String> {
        self.warnings.take()
    }
}

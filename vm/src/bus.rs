use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Severity {
    #[display("info")]
    Info,
    #[display("success")]
    Success,
    #[display("warning")]
    Warning,
    #[display("error")]
    Error,
}

/// Coarse status shown next to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Status {
    #[display("Program loaded")]
    ProgramLoaded,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("[{severity}] {message}")]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub label: Status,
    pub severity: Severity,
}

/// Producer half of the event streams. Owned by the machine.
#[derive(Debug)]
pub struct Bus {
    log_tx: Sender<LogEvent>,
    status_tx: Sender<StatusEvent>,
    events: Events,
}

/// Consumer half, polled by whoever presents the machine
#[derive(Debug, Clone)]
pub struct Events {
    log_rx: Receiver<LogEvent>,
    status_rx: Receiver<StatusEvent>,
}

impl Default for Bus {
    fn default() -> Self {
        let (log_tx, log_rx) = unbounded();
        let (status_tx, status_rx) = unbounded();
        Self {
            log_tx,
            status_tx,
            events: Events { log_rx, status_rx },
        }
    }
}

impl Bus {
    pub fn events(&self) -> Events {
        self.events.clone()
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => error!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Success => info!("{message}"),
            Severity::Info => debug!("{message}"),
        }
        // We hold a receiver ourselves so this can't be disconnected
        let _ = self.log_tx.send(LogEvent { severity, message });
    }

    pub fn status(&self, label: Status, severity: Severity) {
        debug!(%label, %severity, "status");
        let _ = self.status_tx.send(StatusEvent { label, severity });
    }
}

impl Events {
    /// Everything logged since the last drain, oldest first
    pub fn drain_log(&self) -> Vec<LogEvent> {
        self.log_rx.try_iter().collect()
    }

    pub fn drain_status(&self) -> Vec<StatusEvent> {
        self.status_rx.try_iter().collect()
    }
}

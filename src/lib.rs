//! Host side of the emulator: runs a [vm::Machine] on its own fixed-rate thread and hands
//! the presenter snapshots and events.
//!
//! ```text
//!   presenter ── Command ──► MachineThread ── Snapshot (triple buffer) ──► presenter
//!                               │ step() once per tick
//!                               └── Events (log, status) ─────────────────► presenter
//! ```
pub mod render;
pub mod threads;
pub mod trace;

use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use threads::{Command, MachineComms, MachineThread};
use tracing::instrument;
use triple_buffer::Output;
use vm::{Config, ConfigError, Events, Machine, Snapshot};

/// Handle to a running machine thread
#[derive(derive_more::Debug)]
pub struct Emulator {
    commands: Sender<Command>,
    pub events: Events,
    #[debug(ignore)]
    snapshots: Output<Snapshot>,
    handle: Option<JoinHandle<()>>,
}

/// Build a machine for `config` and start ticking it
#[instrument]
pub fn launch(config: Config) -> Result<Emulator, ConfigError> {
    let machine = Machine::new(config)?;
    let events = machine.events();
    let (tx, rx) = unbounded();
    let MachineComms { snapshots, handle } = MachineThread::new(machine, rx).spawn();
    Ok(Emulator {
        commands: tx,
        events,
        snapshots,
        handle: Some(handle),
    })
}

impl Emulator {
    fn send(&self, command: Command) {
        // Only fails once the thread is gone, and then there's nobody to tell
        let _ = self.commands.send(command);
    }

    pub fn load(&self, bytes: Vec<u8>) {
        self.send(Command::Load(bytes));
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Latest published state
    pub fn snapshot(&mut self) -> &Snapshot {
        self.snapshots.read()
    }

    /// Whether a snapshot newer than the last [Emulator::snapshot] call is waiting
    pub fn updated(&self) -> bool {
        self.snapshots.updated()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.send(Command::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.join();
    }
}

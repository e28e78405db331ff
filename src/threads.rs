use std::{
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, trace};
use triple_buffer::{triple_buffer, Output};
use vm::{Machine, Snapshot};

/// Requests from the presenter. Applied at the start of the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(Vec<u8>),
    Start,
    Pause,
    Stop,
    Shutdown,
}

/// Sole owner of the [Machine]: steps it once per tick and publishes a [Snapshot] after each
pub struct MachineThread {
    machine: Machine,
    tick: Duration,
    rx: Receiver<Command>,
}

pub struct MachineComms {
    pub snapshots: Output<Snapshot>,
    pub handle: JoinHandle<()>,
}

impl MachineThread {
    pub fn new(machine: Machine, rx: Receiver<Command>) -> Self {
        Self {
            tick: machine.config().tick_period(),
            machine,
            rx,
        }
    }

    /// Apply everything queued. Returns `false` once the loop should end.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(Command::Load(bytes)) => self.machine.load(&bytes),
                Ok(Command::Start) => self.machine.start(),
                Ok(Command::Pause) => self.machine.pause(),
                Ok(Command::Stop) => self.machine.stop(),
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    pub fn spawn(mut self) -> MachineComms {
        let (mut snapshot_in, snapshot_out) = triple_buffer(&self.machine.snapshot());
        let handle = thread::spawn(move || {
            #[cfg(feature = "tracing")]
            tracy_client::set_thread_name!("machine tick loop");
            let mut deadline = Instant::now();
            loop {
                if !self.drain_commands() {
                    debug!("machine thread shutting down");
                    break;
                }
                self.machine.step();
                snapshot_in.write(self.machine.snapshot());

                deadline += self.tick;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    // Running behind, don't try to catch up
                    trace!(behind = ?(now - deadline), "missed tick deadline");
                    deadline = now;
                }
            }
        });

        MachineComms {
            snapshots: snapshot_out,
            handle,
        }
    }
}

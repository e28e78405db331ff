//! A small fixed-width instruction-set emulator.
//!
//! ```text
//!   bytes ─► Machine::load ─► Memory ◄──────────────┐
//!                               │ fetch at pc       │ LOAD/STORE/SETPIXEL
//!                               ▼                   │
//!                          Op::decode ─► Vm::run_op ┘ ─► pc advance / jump
//!                                            │
//!                                            └─► Bus ─► Events (log, status)
//! ```
//!
//! Word width, register count, memory size, framebuffer geometry and the bit layout of
//! every instruction are all [config::Config], not separate machines.
pub mod bus;
pub mod config;
pub mod errors;
pub mod interpret;
pub mod machine;
pub mod memory;
pub mod op;
pub mod state;

pub use bus::{Events, LogEvent, Severity, Status, StatusEvent};
pub use config::{Config, ConfigError};
pub use machine::{Machine, RunState, Snapshot};

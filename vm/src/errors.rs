use thiserror::Error;

use crate::bus::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Access {
    #[display("read")]
    Read,
    #[display("write")]
    Write,
}

/// Everything that can go wrong while a program runs.
///
/// None of these stop the host: each one is reported on the event bus and resolved in a
/// fixed way (no-op, zero read, refusal, or an orderly halt).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),
    #[error("Out of bounds {access} of {width} bytes at 0x{address:x}")]
    OutOfBoundsAccess {
        access: Access,
        address: u64,
        width: usize,
    },
    #[error("No program loaded!")]
    ProgramNotLoaded,
    #[error("Program counter 0x{0:x} ran past the end of memory")]
    MemoryExhausted(u64),
}

impl Fault {
    pub fn severity(&self) -> Severity {
        match self {
            Fault::OutOfBoundsAccess { .. } => Severity::Warning,
            Fault::UnknownOpcode(_) | Fault::ProgramNotLoaded | Fault::MemoryExhausted(_) => {
                Severity::Error
            }
        }
    }
}

use tracing::{instrument, trace};

use crate::{
    bus::Bus,
    config::{Config, PixelLayout},
    errors::{Access, Fault},
    memory::Memory,
    op::{Address, Op},
    state::CpuState,
};

/// What the program counter should do after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Move on by one instruction width
    Advance,
    /// The instruction already set `pc`
    Jumped,
}

/// Fetch/decode/execute core: the CPU state plus the memory it runs against
#[derive(Clone, Debug)]
pub struct Vm {
    config: Config,
    pub state: CpuState,
    pub memory: Memory,
}

impl Vm {
    pub fn new(config: Config) -> Self {
        Self {
            state: CpuState::new(config.register_count, config.word),
            memory: Memory::new(config.memory_size),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the instruction at `pc` and move `pc` on
    #[instrument(skip(self, bus), fields(pc = self.state.pc))]
    pub fn step(&mut self, bus: &Bus) -> Flow {
        #[cfg(feature = "tracing")]
        tracy_client::plot!("PC", self.state.pc as f64);

        let op = self.parse_op();
        trace!(?op);
        let flow = self.run_op(op, bus);
        if flow == Flow::Advance {
            self.increment();
        }
        flow
    }

    /// Fetches and decodes the word at `pc`. Past the end of memory this reads as a NOP.
    fn parse_op(&self) -> Op {
        let word = self.memory.read(self.state.pc, self.config.word.bytes());
        Op::decode(word, &self.config.encoding)
    }

    fn run_op(&mut self, op: Op, bus: &Bus) -> Flow {
        let width = self.config.word.bytes();
        let regs = &mut self.state.registers;
        match op {
            Op::Nop => {}
            Op::Mov { dst, src } => regs.set(dst, regs.get(src)),
            Op::Add { dst, lhs, rhs } => regs.set(dst, regs.get(lhs).wrapping_add(regs.get(rhs))),
            Op::Load { dst, addr } => {
                let address = self.address(addr);
                self.check_access(Access::Read, address, bus);
                let value = self.memory.read(address, width);
                self.state.registers.set(dst, value);
            }
            Op::Store { src, addr } => {
                let address = self.address(addr);
                self.check_access(Access::Write, address, bus);
                self.memory
                    .write(address, self.state.registers.get(src), width);
            }
            Op::SetPixel { x, y, rgba } => {
                let channels = self.config.encoding.pixel.channels;
                if let Some(address) = self.config.framebuffer.address(x, y) {
                    let mut px = [0u8; 4];
                    for ((out, raw), channel) in px.iter_mut().zip(rgba).zip(channels) {
                        *out = PixelLayout::scale(channel, raw);
                    }
                    self.memory.write_bytes(address as u64, &px);
                }
            }
            Op::Jump(target) => {
                self.state.pc = target;
                return Flow::Jumped;
            }
            Op::BranchEq { a, b, offset } => {
                if regs.get(a) == regs.get(b) {
                    let size = self.config.memory_size as u64;
                    self.state.pc = ((self.state.pc as u128 + offset as u128) % size as u128) as u64;
                    return Flow::Jumped;
                }
            }
            Op::Unknown(raw) => {
                let fault = Fault::UnknownOpcode(raw);
                bus.log(fault.severity(), fault.to_string());
            }
        }
        Flow::Advance
    }

    fn address(&self, addr: Address) -> u64 {
        match addr {
            Address::Register(r) => self.state.registers.get(r),
            Address::Direct(a) => a,
        }
    }

    fn check_access(&self, access: Access, address: u64, bus: &Bus) {
        let width = self.config.word.bytes();
        if !self.memory.contains(address, width) {
            let fault = Fault::OutOfBoundsAccess {
                access,
                address,
                width,
            };
            bus.log(fault.severity(), fault.to_string());
        }
    }

    fn increment(&mut self) {
        self.state.pc = self
            .state
            .pc
            .saturating_add(self.config.word.bytes() as u64);
    }

    /// Back to `pc = 0`. Registers and memory are left alone.
    pub fn reset(&mut self) {
        self.state.pc = 0;
    }
}

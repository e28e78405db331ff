use itertools::Itertools;
use tracing::{debug, instrument};

use crate::{
    bus::{Bus, Events, Severity, Status},
    config::{Config, ConfigError},
    errors::Fault,
    interpret::Vm,
    memory::{Framebuffer, Memory},
    state::Registers,
};

/// How many registers a [Snapshot] carries
pub const SNAPSHOT_REGISTERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Halted,
}

/// Owned copy of everything a presenter draws
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub run_state: RunState,
    pub pc: u64,
    pub registers: Vec<u64>,
    pub framebuffer: Vec<u8>,
}

/// The emulator: a [Vm] plus its lifecycle and event streams.
///
/// ```text
///            start (loaded)            pause
///   Idle ─────────────────► Running ─────────► Paused
///     │                      │   ▲                │
///     │                      │   └────────────────┘ start
///     └──────── stop ────────┴─────► Halted ◄── stop / pc past memory
/// ```
#[derive(Debug)]
pub struct Machine {
    vm: Vm,
    run_state: RunState,
    loaded: bool,
    bus: Bus,
}

impl Machine {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            vm: Vm::new(config),
            run_state: RunState::Idle,
            loaded: false,
            bus: Bus::default(),
        })
    }

    /// The consumer half of the log and status streams
    pub fn events(&self) -> Events {
        self.bus.events()
    }

    pub fn config(&self) -> &Config {
        self.vm.config()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pc(&self) -> u64 {
        self.vm.state.pc
    }

    pub fn registers(&self) -> &Registers {
        &self.vm.state.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.vm.memory
    }

    /// Always `Some` for a validated config
    pub fn framebuffer(&self) -> Option<Framebuffer<&[u8]>> {
        self.vm.memory.framebuffer(self.config().framebuffer)
    }

    /// Copy program bytes into memory from address 0, one word at a time.
    ///
    /// A trailing partial word is padded with zeroes. Words past the end of memory are dropped.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn load(&mut self, bytes: &[u8]) {
        self.bus.log(Severity::Warning, "Loading program...");
        let width = self.config().word.bytes();
        for (i, chunk) in bytes.chunks(width).enumerate() {
            let word = chunk
                .iter()
                .copied()
                .pad_using(width, |_| 0)
                .collect_vec();
            self.vm.memory.write_bytes((i * width) as u64, &word);
        }
        self.loaded = true;
        self.bus.log(Severity::Success, "Program loaded successfully.");
        self.bus.status(Status::ProgramLoaded, Severity::Success);
    }

    pub fn start(&mut self) {
        if !self.loaded {
            let fault = Fault::ProgramNotLoaded;
            self.bus.log(fault.severity(), fault.to_string());
            return;
        }
        self.run_state = RunState::Running;
        self.bus.log(Severity::Success, "Emulator started.");
        self.bus.status(Status::Running, Severity::Success);
    }

    pub fn pause(&mut self) {
        self.run_state = RunState::Paused;
        self.bus.log(Severity::Warning, "Emulator paused.");
        self.bus.status(Status::Paused, Severity::Warning);
    }

    /// Halt and rewind `pc` to 0. Reported at error severity, like any other halt.
    pub fn stop(&mut self) {
        self.run_state = RunState::Halted;
        self.vm.reset();
        self.bus.log(Severity::Error, "Emulator stopped.");
        self.bus.status(Status::Stopped, Severity::Error);
    }

    /// Execute one instruction. Does nothing unless running.
    #[instrument(skip(self), fields(pc = self.vm.state.pc))]
    pub fn step(&mut self) {
        if self.run_state != RunState::Running {
            return;
        }
        self.vm.step(&self.bus);

        let pc = self.vm.state.pc;
        if pc >= self.config().memory_size as u64 {
            debug!(pc, "pc left memory");
            let fault = Fault::MemoryExhausted(pc);
            self.bus.log(fault.severity(), fault.to_string());
            self.stop();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let regs = self.registers().as_slice();
        Snapshot {
            run_state: self.run_state,
            pc: self.pc(),
            registers: regs[..regs.len().min(SNAPSHOT_REGISTERS)].to_vec(),
            framebuffer: self
                .framebuffer()
                .map(|fb| fb.as_bytes().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Op;

    fn program(config: &Config, ops: &[Op]) -> Vec<u8> {
        let width = config.word.bytes();
        ops.iter()
            .flat_map(|op| op.encode(&config.encoding).to_le_bytes()[..width].to_vec())
            .collect()
    }

    #[test]
    fn test_start_before_load_is_refused() {
        let mut machine = Machine::new(Config::packed()).unwrap();
        let events = machine.events();
        machine.start();

        assert_eq!(machine.run_state(), RunState::Idle);
        let log = events.drain_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, Severity::Error);
        assert_eq!(log[0].message, "No program loaded!");
        assert!(events.drain_status().is_empty());
    }

    #[test]
    fn test_load_writes_whole_words() {
        let mut machine = Machine::new(Config::packed()).unwrap();
        let bytes: Vec<u8> = (1..=12).collect();
        machine.load(&bytes);

        assert!(machine.is_loaded());
        let memory = machine.memory();
        assert_eq!(memory.read(0, 4), u32::from_le_bytes([1, 2, 3, 4]) as u64);
        assert_eq!(memory.read(4, 4), u32::from_le_bytes([5, 6, 7, 8]) as u64);
        assert_eq!(memory.read(8, 4), u32::from_le_bytes([9, 10, 11, 12]) as u64);
        assert_eq!(memory.read(12, 4), 0);
    }

    #[test]
    fn test_load_pads_trailing_word() {
        let mut machine = Machine::new(Config::wide()).unwrap();
        machine.load(&[0xFF; 11]);
        assert_eq!(machine.memory().read(0, 8), u64::MAX);
        assert_eq!(machine.memory().read(8, 8), 0x00FF_FFFF);
    }

    #[test]
    fn test_load_events() {
        let mut machine = Machine::new(Config::packed()).unwrap();
        let events = machine.events();
        machine.load(&[0; 4]);

        let log = events.drain_log();
        assert_eq!(
            log.iter().map(|e| (e.severity, e.message.as_str())).collect_vec(),
            [
                (Severity::Warning, "Loading program..."),
                (Severity::Success, "Program loaded successfully."),
            ]
        );
        assert_eq!(events.drain_status()[0].label, Status::ProgramLoaded);
    }

    #[test]
    fn test_lifecycle_events() {
        let mut machine = Machine::new(Config::packed()).unwrap();
        let events = machine.events();
        machine.load(&[0; 4]);
        machine.start();
        machine.pause();
        machine.stop();

        let log = events.drain_log();
        assert_eq!(
            log.iter().map(|e| (e.severity, e.message.as_str())).collect_vec(),
            [
                (Severity::Warning, "Loading program..."),
                (Severity::Success, "Program loaded successfully."),
                (Severity::Success, "Emulator started."),
                (Severity::Warning, "Emulator paused."),
                (Severity::Error, "Emulator stopped."),
            ]
        );
        assert_eq!(
            events
                .drain_status()
                .iter()
                .map(|s| (s.label, s.severity))
                .collect_vec(),
            [
                (Status::ProgramLoaded, Severity::Success),
                (Status::Running, Severity::Success),
                (Status::Paused, Severity::Warning),
                (Status::Stopped, Severity::Error),
            ]
        );
    }

    #[test]
    fn test_stop_resets_pc_and_is_idempotent() {
        let config = Config::packed();
        let mut machine = Machine::new(config.clone()).unwrap();
        machine.load(&program(&config, &[Op::Nop, Op::Nop, Op::Nop]));
        machine.start();
        machine.step();
        machine.step();
        assert_eq!(machine.pc(), 8);

        machine.stop();
        let once = (machine.run_state(), machine.pc(), machine.snapshot());
        machine.stop();
        let twice = (machine.run_state(), machine.pc(), machine.snapshot());

        assert_eq!(once, twice);
        assert_eq!(machine.pc(), 0);
        assert_eq!(machine.run_state(), RunState::Halted);
    }

    #[test]
    fn test_stop_logs_at_error_severity() {
        let mut machine = Machine::new(Config::packed()).unwrap();
        let events = machine.events();
        machine.stop();
        let log = events.drain_log();
        assert_eq!(log[0].severity, Severity::Error);
        assert_eq!(log[0].message, "Emulator stopped.");
    }

    #[test]
    fn test_step_only_while_running() {
        let config = Config::packed();
        let mut machine = Machine::new(config.clone()).unwrap();
        machine.load(&program(&config, &[Op::Nop, Op::Nop]));
        machine.step();
        assert_eq!(machine.pc(), 0);

        machine.start();
        machine.step();
        assert_eq!(machine.pc(), 4);

        machine.pause();
        assert_eq!(machine.run_state(), RunState::Paused);
        machine.step();
        assert_eq!(machine.pc(), 4);

        machine.start();
        machine.step();
        assert_eq!(machine.pc(), 8);
    }

    #[test]
    fn test_running_off_the_end_halts() {
        let config = Config::packed();
        let end = config.memory_size as u64;
        let mut machine = Machine::new(config.clone()).unwrap();
        machine.load(&program(&config, &[Op::Jump(end - 4)]));
        let events = machine.events();
        machine.start();
        machine.step();
        assert_eq!(machine.pc(), end - 4);
        assert_eq!(machine.run_state(), RunState::Running);

        machine.step();
        assert_eq!(machine.run_state(), RunState::Halted);
        assert_eq!(machine.pc(), 0);
        let messages = events.drain_log().into_iter().map(|e| e.message).collect_vec();
        assert_eq!(messages.last().map(String::as_str), Some("Emulator stopped."));
    }

    #[test]
    fn test_three_pixels() {
        let config = Config::wide();
        let mut machine = Machine::new(config.clone()).unwrap();
        machine.load(&program(
            &config,
            &[
                Op::SetPixel {
                    x: 10,
                    y: 10,
                    rgba: [255, 0, 0, 255],
                },
                Op::SetPixel {
                    x: 20,
                    y: 20,
                    rgba: [0, 255, 0, 255],
                },
                Op::SetPixel {
                    x: 30,
                    y: 30,
                    rgba: [0, 0, 255, 255],
                },
            ],
        ));
        machine.start();
        for _ in 0..3 {
            machine.step();
        }

        let fb = machine.framebuffer().unwrap();
        assert_eq!(fb.pixel(10, 10), Some([255, 0, 0, 255]));
        assert_eq!(fb.pixel(20, 20), Some([0, 255, 0, 255]));
        assert_eq!(fb.pixel(30, 30), Some([0, 0, 255, 255]));
        assert_eq!(machine.pc(), 24);
    }

    #[test]
    fn test_snapshot_registers() {
        let mut machine = Machine::new(Config::wide()).unwrap();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.registers.len(), SNAPSHOT_REGISTERS);
        assert_eq!(snapshot.framebuffer.len(), 64 * 64 * 4);
        assert_eq!(snapshot.run_state, RunState::Idle);
        machine.stop();
        assert_eq!(machine.snapshot().run_state, RunState::Halted);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = Config::packed();
        config.register_count = 0;
        assert_eq!(Machine::new(config).unwrap_err(), ConfigError::NoRegisters);
    }
}

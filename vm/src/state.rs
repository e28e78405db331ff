use crate::config::WordWidth;

/// Register file: `count` registers of one word each.
///
/// Indices past the end are clamped to the last register instead of faulting, so a
/// register field wider than the file can never reach outside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    regs: Vec<u64>,
    mask: u64,
}

impl Registers {
    pub fn new(count: usize, word: WordWidth) -> Self {
        Self {
            regs: vec![0; count.max(1)],
            mask: word.mask(),
        }
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    fn clamp(&self, idx: usize) -> usize {
        idx.min(self.regs.len() - 1)
    }

    pub fn get(&self, idx: usize) -> u64 {
        self.regs[self.clamp(idx)]
    }

    /// Values are truncated to the word width
    pub fn set(&mut self, idx: usize, value: u64) {
        let idx = self.clamp(idx);
        self.regs[idx] = value & self.mask;
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.regs
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuState {
    /// Byte address of the next instruction.
    ///
    /// Advanced by one word after each instruction, unless a [crate::op::Op::Jump] or a taken
    /// [crate::op::Op::BranchEq] has already set it.
    pub pc: u64,
    pub registers: Registers,
}

impl CpuState {
    pub fn new(register_count: usize, word: WordWidth) -> Self {
        Self {
            pc: 0,
            registers: Registers::new(register_count, word),
        }
    }
}

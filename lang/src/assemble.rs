use itertools::Itertools;
use thiserror::Error;
use tracing::instrument;
use vm::{
    config::{Addressing, Config, Field},
    op::{Address, Op, Opcode},
};

use crate::parse::Stmt;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("Register r{1} for `{0}` is out of range, the machine has {2} registers")]
    Register(&'static str, usize, usize),
    #[error("Value {1} for `{0}` doesn't fit in {2} bits")]
    Value(&'static str, u64, u32),
    #[error("`{0}` can't use {1} addressing on this machine")]
    Addressing(&'static str, &'static str),
    #[error("Program is {0} bytes but memory only holds {1}")]
    TooLarge(usize, usize),
}

struct Checker<'c> {
    config: &'c Config,
    name: &'static str,
}

impl Checker<'_> {
    fn reg(&self, field: Field, idx: usize) -> Result<u64, AssembleError> {
        let limit = self.config.register_count.min(field.max() as usize + 1);
        if idx >= limit {
            return Err(AssembleError::Register(self.name, idx, limit));
        }
        Ok(idx as u64)
    }

    fn value(&self, field: Field, value: u64) -> Result<u64, AssembleError> {
        if !field.fits(value) {
            return Err(AssembleError::Value(self.name, value, field.bits));
        }
        Ok(value)
    }

    fn addr(&self, addr: &Address) -> Result<(), AssembleError> {
        let enc = &self.config.encoding;
        match (addr, enc.addressing) {
            (Address::Register(r), Addressing::Indirect) => self.reg(enc.reg_b, *r).map(drop),
            (Address::Direct(a), Addressing::Direct) => self.value(enc.address, *a).map(drop),
            (Address::Register(_), Addressing::Direct) => {
                Err(AssembleError::Addressing(self.name, "register"))
            }
            (Address::Direct(_), Addressing::Indirect) => {
                Err(AssembleError::Addressing(self.name, "direct"))
            }
        }
    }

    fn op(&self, op: &Op) -> Result<(), AssembleError> {
        let enc = &self.config.encoding;
        match op {
            Op::Nop => {}
            Op::Mov { dst, src } => {
                self.reg(enc.reg_a, *dst)?;
                self.reg(enc.reg_b, *src)?;
            }
            Op::Add { dst, lhs, rhs } => {
                self.reg(enc.reg_a, *dst)?;
                self.reg(enc.reg_b, *lhs)?;
                self.reg(enc.reg_c, *rhs)?;
            }
            Op::Load { dst: reg, addr } | Op::Store { src: reg, addr } => {
                self.reg(enc.reg_a, *reg)?;
                self.addr(addr)?;
            }
            Op::SetPixel { x, y, rgba } => {
                self.value(enc.pixel.x, *x)?;
                self.value(enc.pixel.y, *y)?;
                for (channel, value) in enc.pixel.channels.iter().zip(rgba) {
                    self.value(*channel, *value)?;
                }
            }
            Op::Jump(target) => {
                self.value(enc.address, *target)?;
            }
            Op::BranchEq { a, b, offset } => {
                self.reg(enc.reg_a, *a)?;
                self.reg(enc.reg_b, *b)?;
                self.value(enc.offset, *offset)?;
            }
            Op::Unknown(raw) => {
                self.value(enc.opcode, *raw as u64)?;
            }
        }
        Ok(())
    }
}

/// Encode statements into little-endian words for `config`.
///
/// Every statement is checked, so all problems are reported together.
#[instrument(skip_all)]
pub fn assemble<'a>(
    stmts: impl IntoIterator<Item = &'a Stmt>,
    config: &Config,
) -> Result<Vec<u8>, Vec<AssembleError>> {
    let width = config.word.bytes();
    let words = stmts.into_iter().map(|stmt| match stmt {
        Stmt::Op(op) => {
            let checker = Checker {
                config,
                name: op.opcode().map_or("unknown", Opcode::mnemonic),
            };
            checker.op(op)?;
            Ok(op.encode(&config.encoding))
        }
        Stmt::Word(value) => {
            let checker = Checker {
                config,
                name: "word",
            };
            checker.value(Field::new(0, config.word.bits()), *value)
        }
    });
    let (words, errs): (Vec<u64>, Vec<AssembleError>) = words.partition_result();
    if !errs.is_empty() {
        return Err(errs);
    }

    let bytecode = words
        .into_iter()
        .flat_map(|word| word.to_le_bytes().into_iter().take(width))
        .collect_vec();
    if bytecode.len() > config.memory_size {
        return Err(vec![AssembleError::TooLarge(
            bytecode.len(),
            config.memory_size,
        )]);
    }
    Ok(bytecode)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vm::{config::Config, op::Op};

    use super::{assemble, AssembleError};
    use crate::parse::{parse, Stmt};

    #[test]
    fn test_assembles_little_endian_words() {
        let stmts = parse("jmp 16\nword 0x01020304").unwrap();
        let bytecode = assemble(&stmts, &Config::packed()).unwrap();
        assert_eq!(bytecode, [16, 0, 0, 0x60, 4, 3, 2, 1]);
    }

    #[test]
    fn test_wide_words_are_eight_bytes() {
        let stmts = parse("nop\npixel 1 2 3 4 5 6").unwrap();
        let bytecode = assemble(&stmts, &Config::wide()).unwrap();
        assert_eq!(bytecode.len(), 16);
        assert_eq!(bytecode[8..], [0, 6, 5, 4, 3, 2, 1, 5]);
    }

    #[test]
    fn test_collects_every_error() {
        let stmts = parse("mov r16 r0\npixel 16 0 0 0 0 0\nload r0 @12\nnop").unwrap();
        let errs = assemble(&stmts, &Config::nibble()).unwrap_err();
        assert_eq!(
            errs,
            [
                AssembleError::Register("mov", 16, 16),
                AssembleError::Value("pixel", 16, 4),
                AssembleError::Addressing("load", "direct"),
            ]
        );
    }

    #[test]
    fn test_register_count_limits_indices() {
        let mut config = Config::wide();
        config.register_count = 8;
        let stmts = parse("add r7 r8 r0").unwrap();
        assert_eq!(
            assemble(&stmts, &config).unwrap_err(),
            [AssembleError::Register("add", 8, 8)]
        );
    }

    #[test]
    fn test_rejects_program_bigger_than_memory() {
        let config = Config::nibble();
        let stmts = vec![Stmt::Op(Op::Nop); config.memory_size / 4 + 1];
        assert!(matches!(
            assemble(&stmts, &config).unwrap_err()[..],
            [AssembleError::TooLarge(..)]
        ));
    }

    proptest! {
        #[test]
        fn test_jump_targets_in_range_assemble(target in 0u64..(1 << 24)) {
            let stmts = [Stmt::Op(Op::Jump(target))];
            let bytecode = assemble(&stmts, &Config::packed()).unwrap();
            let word = u32::from_le_bytes([bytecode[0], bytecode[1], bytecode[2], bytecode[3]]);
            prop_assert_eq!(word as u64 & 0xFF_FFFF, target);
        }
    }
}

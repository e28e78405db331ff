use crate::config::{Addressing, Encoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum Opcode {
    /// Do nothing
    Nop,
    /// `reg[dst] = reg[src]`
    Mov,
    /// `reg[dst] = reg[lhs] + reg[rhs]`, wrapping at the word width
    Add,
    /// `reg[dst] = memory[address]`, one word
    Load,
    /// `memory[address] = reg[src]`, one word
    Store,
    /// Write one scaled RGBA pixel into the framebuffer
    SetPixel,
    /// `pc = address`
    Jump,
    /// `pc = (pc + offset) % memory_size` when `reg[a] == reg[b]`
    BranchEq,
}

/// Indexed by opcode number
const OPCODES: [Opcode; 8] = [
    Opcode::Nop,
    Opcode::Mov,
    Opcode::Add,
    Opcode::Load,
    Opcode::Store,
    Opcode::SetPixel,
    Opcode::Jump,
    Opcode::BranchEq,
];

impl Opcode {
    pub fn parse(num: u8) -> Option<Opcode> {
        OPCODES.get(num as usize).copied()
    }

    pub fn all() -> &'static [Opcode] {
        &OPCODES
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Mov => "mov",
            Opcode::Add => "add",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::SetPixel => "pixel",
            Opcode::Jump => "jmp",
            Opcode::BranchEq => "beq",
        }
    }
}

/// Source of a LOAD/STORE address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Held in a register
    Register(usize),
    /// Taken from the instruction word
    Direct(u64),
}

/// A decoded instruction. Operands are raw field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Mov { dst: usize, src: usize },
    Add { dst: usize, lhs: usize, rhs: usize },
    Load { dst: usize, addr: Address },
    Store { src: usize, addr: Address },
    /// Channels are unscaled, in R, G, B, A order
    SetPixel { x: u64, y: u64, rgba: [u64; 4] },
    Jump(u64),
    BranchEq { a: usize, b: usize, offset: u64 },
    Unknown(u8),
}

impl Op {
    /// Split an instruction word into an [Op]. Never fails: unassigned opcodes become [Op::Unknown].
    pub fn decode(word: u64, enc: &Encoding) -> Op {
        let raw = enc.opcode.extract(word) as u8;
        let Some(opcode) = Opcode::parse(raw) else {
            return Op::Unknown(raw);
        };
        let reg = |field: crate::config::Field| field.extract(word) as usize;
        let addr = || match enc.addressing {
            Addressing::Indirect => Address::Register(reg(enc.reg_b)),
            Addressing::Direct => Address::Direct(enc.address.extract(word)),
        };

        match opcode {
            Opcode::Nop => Op::Nop,
            Opcode::Mov => Op::Mov {
                dst: reg(enc.reg_a),
                src: reg(enc.reg_b),
            },
            Opcode::Add => Op::Add {
                dst: reg(enc.reg_a),
                lhs: reg(enc.reg_b),
                rhs: reg(enc.reg_c),
            },
            Opcode::Load => Op::Load {
                dst: reg(enc.reg_a),
                addr: addr(),
            },
            Opcode::Store => Op::Store {
                src: reg(enc.reg_a),
                addr: addr(),
            },
            Opcode::SetPixel => {
                let px = &enc.pixel;
                Op::SetPixel {
                    x: px.x.extract(word),
                    y: px.y.extract(word),
                    rgba: px.channels.map(|c| c.extract(word)),
                }
            }
            Opcode::Jump => Op::Jump(enc.address.extract(word)),
            Opcode::BranchEq => Op::BranchEq {
                a: reg(enc.reg_a),
                b: reg(enc.reg_b),
                offset: enc.offset.extract(word),
            },
        }
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            Op::Nop => Opcode::Nop,
            Op::Mov { .. } => Opcode::Mov,
            Op::Add { .. } => Opcode::Add,
            Op::Load { .. } => Opcode::Load,
            Op::Store { .. } => Opcode::Store,
            Op::SetPixel { .. } => Opcode::SetPixel,
            Op::Jump(_) => Opcode::Jump,
            Op::BranchEq { .. } => Opcode::BranchEq,
            Op::Unknown(_) => return None,
        })
    }

    /// Pack into an instruction word. Operands wider than their field are truncated, and
    /// an address form the encoding doesn't use is dropped; check with the assembler first.
    pub fn encode(&self, enc: &Encoding) -> u64 {
        let opcode = match self {
            Op::Unknown(raw) => *raw as u64,
            op => op.opcode().map_or(0, |o| o as u64),
        };
        let addr = |addr: &Address| match (addr, enc.addressing) {
            (Address::Register(r), Addressing::Indirect) => enc.reg_b.insert(*r as u64),
            (Address::Direct(a), Addressing::Direct) => enc.address.insert(*a),
            _ => 0,
        };

        enc.opcode.insert(opcode)
            | match self {
                Op::Nop | Op::Unknown(_) => 0,
                Op::Mov { dst, src } => {
                    enc.reg_a.insert(*dst as u64) | enc.reg_b.insert(*src as u64)
                }
                Op::Add { dst, lhs, rhs } => {
                    enc.reg_a.insert(*dst as u64)
                        | enc.reg_b.insert(*lhs as u64)
                        | enc.reg_c.insert(*rhs as u64)
                }
                Op::Load { dst, addr: a } => enc.reg_a.insert(*dst as u64) | addr(a),
                Op::Store { src, addr: a } => enc.reg_a.insert(*src as u64) | addr(a),
                Op::SetPixel { x, y, rgba } => {
                    let px = &enc.pixel;
                    px.channels
                        .iter()
                        .zip(rgba)
                        .fold(px.x.insert(*x) | px.y.insert(*y), |word, (c, v)| {
                            word | c.insert(*v)
                        })
                }
                Op::Jump(target) => enc.address.insert(*target),
                Op::BranchEq { a, b, offset } => {
                    enc.reg_a.insert(*a as u64)
                        | enc.reg_b.insert(*b as u64)
                        | enc.offset.insert(*offset)
                }
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lookup_table_matches_discriminants() {
        for (num, opcode) in OPCODES.iter().enumerate() {
            assert_eq!(*opcode as usize, num);
        }
        assert_eq!(Opcode::parse(8), None);
        assert_eq!(Opcode::parse(0xFF), None);
    }

    #[test]
    fn test_decode_packed_setpixel() {
        // x=10, y=20, r=7, g=0, b=3, a=7
        let word = (5 << 28) | (10 << 20) | (20 << 12) | (7 << 9) | (3 << 3) | 7;
        assert_eq!(
            Op::decode(word, &Encoding::packed()),
            Op::SetPixel {
                x: 10,
                y: 20,
                rgba: [7, 0, 3, 7]
            }
        );
    }

    #[test]
    fn test_decode_indirect_and_direct_addressing() {
        let narrow = (3 << 24) | (2 << 20) | (9 << 16);
        assert_eq!(
            Op::decode(narrow, &Encoding::nibble()),
            Op::Load {
                dst: 2,
                addr: Address::Register(9)
            }
        );

        let wide = (4u64 << 56) | (200 << 48) | 0x1234;
        assert_eq!(
            Op::decode(wide, &Encoding::wide()),
            Op::Store {
                src: 200,
                addr: Address::Direct(0x1234)
            }
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(Op::decode(0x2A00_0000, &Encoding::nibble()), Op::Unknown(0x2A));
        assert_eq!(Op::Unknown(0x2A).encode(&Encoding::nibble()), 0x2A00_0000);
        assert_eq!(Op::decode(0xC000_0000, &Encoding::packed()), Op::Unknown(0xC));
    }

    #[test]
    fn test_jump_field() {
        let word = Op::Jump(16).encode(&Encoding::packed());
        assert_eq!(word, (6 << 28) | 16);
    }

    proptest! {
        #[test]
        fn test_opcode_survives_encoding(opcode: Opcode, word in any::<u64>()) {
            let enc = Encoding::wide();
            let word = (word & !(0xFF << 56)) | ((opcode as u64) << 56);
            let op = Op::decode(word, &enc);
            prop_assert_eq!(op.opcode(), Some(opcode));
            prop_assert_eq!(Op::decode(op.encode(&enc), &enc), op);
        }
    }
}

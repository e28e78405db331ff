use rand::prelude::*;
use tracing::instrument;
use vm::{
    config::{Addressing, Config, Field},
    op::{Address, Op, Opcode},
};

/// Random, assemblable source for `config`. Handy for shaking out the machine.
pub fn generate(config: &Config, len: usize) -> String {
    generate_with(&mut thread_rng(), config, len)
}

#[instrument(skip(rng, config))]
pub fn generate_with(rng: &mut impl Rng, config: &Config, len: usize) -> String {
    (0..len)
        .map(|_| {
            let opcode = *Opcode::all().choose(rng).unwrap_or(&Opcode::Nop);
            render(&random_op(rng, config, opcode, len))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn random_op(rng: &mut impl Rng, config: &Config, opcode: Opcode, len: usize) -> Op {
    let enc = &config.encoding;
    let width = config.word.bytes() as u64;
    let reg = |rng: &mut dyn RngCore, field: Field| {
        let limit = config.register_count.min(field.max() as usize + 1);
        rng.gen_range(0..limit)
    };
    let value = |rng: &mut dyn RngCore, field: Field| rng.gen_range(0..=field.max());

    match opcode {
        Opcode::Nop => Op::Nop,
        Opcode::Mov => Op::Mov {
            dst: reg(rng, enc.reg_a),
            src: reg(rng, enc.reg_b),
        },
        Opcode::Add => Op::Add {
            dst: reg(rng, enc.reg_a),
            lhs: reg(rng, enc.reg_b),
            rhs: reg(rng, enc.reg_c),
        },
        Opcode::Load | Opcode::Store => {
            let r = reg(rng, enc.reg_a);
            let addr = match enc.addressing {
                Addressing::Indirect => Address::Register(reg(rng, enc.reg_b)),
                Addressing::Direct => {
                    let limit = (config.memory_size as u64).min(enc.address.max());
                    Address::Direct(rng.gen_range(0..=limit))
                }
            };
            if opcode == Opcode::Load {
                Op::Load { dst: r, addr }
            } else {
                Op::Store { src: r, addr }
            }
        }
        Opcode::SetPixel => Op::SetPixel {
            x: value(rng, enc.pixel.x),
            y: value(rng, enc.pixel.y),
            rgba: enc.pixel.channels.map(|c| value(rng, c)),
        },
        // Keep control flow inside the program so it keeps running
        Opcode::Jump => Op::Jump(rng.gen_range(0..len.max(1) as u64) * width),
        Opcode::BranchEq => Op::BranchEq {
            a: reg(rng, enc.reg_a),
            b: reg(rng, enc.reg_b),
            offset: rng.gen_range(1..=4) * width,
        },
    }
}

fn render(op: &Op) -> String {
    let addr = |addr: &Address| match addr {
        Address::Register(r) => format!("[r{r}]"),
        Address::Direct(a) => format!("@{a:#x}"),
    };
    match op {
        Op::Nop | Op::Unknown(_) => "nop".to_string(),
        Op::Mov { dst, src } => format!("mov r{dst} r{src}"),
        Op::Add { dst, lhs, rhs } => format!("add r{dst} r{lhs} r{rhs}"),
        Op::Load { dst, addr: a } => format!("load r{dst} {}", addr(a)),
        Op::Store { src, addr: a } => format!("store r{src} {}", addr(a)),
        Op::SetPixel { x, y, rgba: [r, g, b, a] } => format!("pixel {x} {y} {r} {g} {b} {a}"),
        Op::Jump(target) => format!("jmp {target}"),
        Op::BranchEq { a, b, offset } => format!("beq r{a} r{b} {offset}"),
    }
}

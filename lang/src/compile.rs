use eyre::eyre;
use itertools::Itertools;
use tracing::debug;
use vm::Config;

use crate::{assemble::assemble, parse::parse};

/// Assembly source to a loadable program image
pub fn compile(source: &str, config: &Config) -> Result<Vec<u8>, eyre::Report> {
    let stmts = parse(source)
        .map_err(|errs| eyre!("Failed to parse program:\n{}", errs.iter().join("\n")))?;
    debug!(statements = stmts.len(), "parsed");

    assemble(&stmts, config)
        .map_err(|errs| eyre!("Failed to assemble program:\n{}", errs.iter().join("\n")))
}

#[cfg(test)]
mod tests {
    use vm::{Config, Machine, RunState};

    use super::*;

    #[test]
    fn test_compiled_program_runs() {
        let config = Config::nibble();
        let source = "
            ; r1 stays 0, so the branch always takes
            pixel 1 1 15 15 15 15
            beq r0 r1 8
            pixel 2 2 15 0 0 15   ; skipped
            pixel 3 3 0 15 0 15
        ";
        let bytecode = compile(source, &config).unwrap();
        let mut machine = Machine::new(config).unwrap();
        machine.load(&bytecode);
        machine.start();
        for _ in 0..3 {
            machine.step();
        }

        let fb = machine.framebuffer().unwrap();
        assert_eq!(fb.pixel(1, 1), Some([255; 4]));
        assert_eq!(fb.pixel(2, 2), Some([0; 4]));
        assert_eq!(fb.pixel(3, 3), Some([0, 255, 0, 255]));
        assert_eq!(machine.run_state(), RunState::Running);
    }

    #[test]
    fn test_errors_are_reported() {
        let err = compile("pixel 99 0 0 0 0 0", &Config::nibble()).unwrap_err();
        assert!(err.to_string().contains("doesn't fit in 4 bits"));
        assert!(compile("jump 4", &Config::nibble()).is_err());
    }
}

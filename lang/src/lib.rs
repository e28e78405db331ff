//! Assembly tooling for the emulator: a text syntax, an assembler that encodes it for a
//! given [vm::Config], built-in demos and a random program generator.
pub mod assemble;
pub mod compile;
pub mod demos;
pub mod generate;
pub mod parse;

pub use compile::compile;
pub use demos::Demo;

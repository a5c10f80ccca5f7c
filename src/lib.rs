//! A miniature assembly interpreter.
//!
//! Programs are recorded with a [`ProgramBuilder`] (directly, through the
//! [`asm`] closure form, or from text via [`parser`]) and then executed by an
//! [`Engine`] over four integer registers `ax`, `bx`, `cx` and `dx`.

pub mod builder;
pub mod engine;
pub mod error;
pub mod ir;
pub mod parser;

pub use builder::{asm, ProgramBuilder};
pub use engine::{Engine, RunReport, State};
pub use error::{AsmError, Fault, Limits, Result};
pub use ir::{Instruction, Opcode, Operand, Program, Register, RegisterSnapshot};

/// Checks `source` against `limits`, parses it and runs it to completion.
pub fn run_source(source: &str, limits: &Limits) -> Result<RunReport> {
    limits.validate()?;
    limits.check_source_size(source.len())?;
    let program = parser::parse(source)?;
    limits.check_instruction_count(program.len())?;
    Engine::with_limits(&program, limits.clone()).run()
}

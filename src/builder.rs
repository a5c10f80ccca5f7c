//! Program Builder
//!
//! Records instruction and label declarations into an immutable [`Program`].
//! Nothing is validated here: malformed instructions only surface when the
//! engine executes them.

use crate::engine::Engine;
use crate::error::Result;
use crate::ir::{Instruction, Opcode, Operand, Program, REGISTER_COUNT};
use std::collections::HashMap;
use tracing::debug;

/// Name of the pseudo-call that declares a label through [`ProgramBuilder::call`].
pub const LABEL_CALL: &str = "label";

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    ignored: usize,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `(op, operands)` as the next instruction.
    pub fn emit(&mut self, op: Opcode, operands: Vec<Operand>) -> &mut Self {
        self.instructions.push(Instruction::new(op, operands));
        self
    }

    /// Points `name` at the next instruction to be appended. Redeclaring a
    /// name overwrites the earlier index.
    pub fn label(&mut self, name: &str) -> &mut Self {
        self.labels.insert(name.to_string(), self.instructions.len());
        self
    }

    /// Dispatches a call by name.
    ///
    /// `label` declares a label, the eleven mnemonics emit an instruction, and
    /// every other name is accepted and dropped without recording anything.
    /// That fallback is intentionally permissive: a misspelled mnemonic does
    /// not fail here. [`ProgramBuilder::ignored`] reports how many calls took it.
    pub fn call(&mut self, name: &str, operands: Vec<Operand>) -> &mut Self {
        if name == LABEL_CALL {
            match operands.first() {
                Some(Operand::Sym(label)) => {
                    let label = label.clone();
                    return self.label(&label);
                }
                Some(Operand::Imm(value)) => {
                    let label = value.to_string();
                    return self.label(&label);
                }
                None => {}
            }
        } else if let Some(op) = Opcode::from_mnemonic(name) {
            return self.emit(op, operands);
        }

        debug!(call = name, operands = operands.len(), "ignoring unrecognized builder call");
        self.ignored += 1;
        self
    }

    pub fn mov(&mut self, dst: impl Into<Operand>, src: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Mov, vec![dst.into(), src.into()])
    }

    pub fn inc(&mut self, dst: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Inc, vec![dst.into()])
    }

    pub fn inc_by(&mut self, dst: impl Into<Operand>, n: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Inc, vec![dst.into(), n.into()])
    }

    pub fn dec(&mut self, dst: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Dec, vec![dst.into()])
    }

    pub fn dec_by(&mut self, dst: impl Into<Operand>, n: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Dec, vec![dst.into(), n.into()])
    }

    pub fn cmp(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Cmp, vec![a.into(), b.into()])
    }

    pub fn jmp(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jmp, vec![target.into()])
    }

    pub fn je(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Je, vec![target.into()])
    }

    pub fn jne(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jne, vec![target.into()])
    }

    pub fn jg(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jg, vec![target.into()])
    }

    pub fn jge(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jge, vec![target.into()])
    }

    pub fn jl(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jl, vec![target.into()])
    }

    pub fn jle(&mut self, target: impl Into<Operand>) -> &mut Self {
        self.emit(Opcode::Jle, vec![target.into()])
    }

    /// Number of calls dropped by the permissive fallback.
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn build(self) -> Program {
        Program::new(self.instructions, self.labels)
    }
}

/// Builds a program from a closure and runs it to completion.
///
/// ```
/// let regs = miniasm::asm(|p| {
///     p.label("loop").inc("ax").cmp("ax", 5).jl("loop");
/// })
/// .unwrap();
/// assert_eq!(regs, [5, 0, 0, 0]);
/// ```
pub fn asm<F>(block: F) -> Result<[i64; REGISTER_COUNT]>
where
    F: FnOnce(&mut ProgramBuilder),
{
    let mut builder = ProgramBuilder::new();
    block(&mut builder);
    let program = builder.build();
    let report = Engine::new(&program).run()?;
    Ok(report.registers.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_points_at_next_instruction() {
        let mut b = ProgramBuilder::new();
        b.label("start").mov("ax", 1).inc("ax").label("middle").dec("ax");
        b.label("end");
        let program = b.build();
        assert_eq!(program.len(), 3);
        assert_eq!(program.label("start"), Some(0));
        assert_eq!(program.label("middle"), Some(2));
        assert_eq!(program.label("end"), Some(3));
        assert_eq!(program.label("missing"), None);
    }

    #[test]
    fn test_label_redeclaration_last_wins() {
        let mut b = ProgramBuilder::new();
        b.label("x").inc("ax").label("x").inc("bx");
        let program = b.build();
        assert_eq!(program.label("x"), Some(1));
        assert_eq!(program.labels().len(), 1);
    }

    #[test]
    fn test_emit_records_without_validation() {
        let mut b = ProgramBuilder::new();
        b.cmp("ax", 1);
        b.emit(Opcode::Cmp, vec!["ax".into()]);
        b.mov("ex", "zz");
        let program = b.build();
        assert_eq!(program.len(), 3);
        assert_eq!(program.instructions()[1].operands, vec![Operand::Sym("ax".into())]);
        assert_eq!(program.instructions()[2].to_string(), "mov ex, zz");
    }

    #[test]
    fn test_call_dispatch() {
        let mut b = ProgramBuilder::new();
        b.call("mov", vec!["ax".into(), 3.into()]);
        b.call("label", vec!["here".into()]);
        b.call("jle", vec!["here".into()]);
        let program = b.build();
        assert_eq!(program.len(), 2);
        assert_eq!(program.instructions()[1].op, Opcode::Jle);
        assert_eq!(program.label("here"), Some(1));
    }

    // Deliberately permissive: unknown calls are swallowed, not rejected.
    #[test]
    fn test_unknown_call_is_ignored() {
        let mut b = ProgramBuilder::new();
        b.call("mvo", vec!["ax".into(), 1.into()]);
        b.call("push", vec![]);
        b.call("label", vec![]);
        assert!(b.is_empty());
        assert_eq!(b.ignored(), 3);
        let program = b.build();
        assert!(program.is_empty());
        assert!(program.labels().is_empty());
    }

    #[test]
    fn test_asm_block() {
        let regs = asm(|p| {
            p.mov("ax", 5).mov("bx", "ax").inc("bx").dec_by("cx", 2).inc_by("dx", "bx");
        })
        .unwrap();
        assert_eq!(regs, [5, 6, -2, 6]);
    }
}

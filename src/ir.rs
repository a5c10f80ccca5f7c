use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of slots in the register file.
pub const REGISTER_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Ax,
    Bx,
    Cx,
    Dx,
}

impl Register {
    /// Registers in reporting order.
    pub const ALL: [Register; REGISTER_COUNT] =
        [Register::Ax, Register::Bx, Register::Cx, Register::Dx];

    /// Maps a register name to its slot. Anything outside the four names is `None`.
    pub fn from_name(name: &str) -> Option<Register> {
        match name {
            "ax" => Some(Register::Ax),
            "bx" => Some(Register::Bx),
            "cx" => Some(Register::Cx),
            "dx" => Some(Register::Dx),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Ax => "ax",
            Register::Bx => "bx",
            Register::Cx => "cx",
            Register::Dx => "dx",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Imm(i64),    // Literal integer
    Sym(String), // Register name or label name, depending on position
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Imm(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Imm(value as i64)
    }
}

impl From<&str> for Operand {
    fn from(name: &str) -> Self {
        Operand::Sym(name.to_string())
    }
}

impl From<String> for Operand {
    fn from(name: String) -> Self {
        Operand::Sym(name)
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Sym(reg.name().to_string())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "{}", v),
            Operand::Sym(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Mov dest, src (dest = src)
    Mov,
    /// Inc dest[, n] (dest += n, n defaults to 1)
    Inc,
    /// Dec dest[, n] (dest -= n, n defaults to 1)
    Dec,
    /// Compare two operands (sets the flag)
    Cmp,
    /// Unconditional Jump
    Jmp,
    /// Jump Equal
    Je,
    /// Jump Not Equal
    Jne,
    /// Jump Greater
    Jg,
    /// Jump Greater or Equal
    Jge,
    /// Jump Less
    Jl,
    /// Jump Less or Equal
    Jle,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Mov,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Cmp,
        Opcode::Jmp,
        Opcode::Je,
        Opcode::Jne,
        Opcode::Jg,
        Opcode::Jge,
        Opcode::Jl,
        Opcode::Jle,
    ];

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Inc => "inc",
            Opcode::Dec => "dec",
            Opcode::Cmp => "cmp",
            Opcode::Jmp => "jmp",
            Opcode::Je => "je",
            Opcode::Jne => "jne",
            Opcode::Jg => "jg",
            Opcode::Jge => "jge",
            Opcode::Jl => "jl",
            Opcode::Jle => "jle",
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jmp
                | Opcode::Je
                | Opcode::Jne
                | Opcode::Jg
                | Opcode::Jge
                | Opcode::Jl
                | Opcode::Jle
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(op: Opcode, operands: Vec<Operand>) -> Self {
        Self { op, operands }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        Ok(())
    }
}

/// A finished program: the instruction sequence plus the label table.
///
/// Only [`crate::builder::ProgramBuilder::build`] creates one, and nothing
/// mutates it afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub(crate) fn new(instructions: Vec<Instruction>, labels: HashMap<String, usize>) -> Self {
        Self {
            instructions,
            labels,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    /// Index recorded for `name`, if it was declared.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

// Listing used by `--dump`: labels are printed before the instruction they point at.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_index: Vec<(&String, usize)> =
            self.labels.iter().map(|(name, &idx)| (name, idx)).collect();
        by_index.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut labels = by_index.into_iter().peekable();
        for (idx, instr) in self.instructions.iter().enumerate() {
            while let Some((name, _)) = labels.next_if(|&(_, at)| at <= idx) {
                writeln!(f, "{}:", name)?;
            }
            writeln!(f, "{:>4}: {}", idx, instr)?;
        }
        for (name, _) in labels {
            writeln!(f, "{}:", name)?;
        }
        Ok(())
    }
}

/// Final register values, reported in `ax, bx, cx, dx` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub ax: i64,
    pub bx: i64,
    pub cx: i64,
    pub dx: i64,
}

impl From<[i64; REGISTER_COUNT]> for RegisterSnapshot {
    fn from(regs: [i64; REGISTER_COUNT]) -> Self {
        let [ax, bx, cx, dx] = regs;
        Self { ax, bx, cx, dx }
    }
}

impl From<RegisterSnapshot> for [i64; REGISTER_COUNT] {
    fn from(snap: RegisterSnapshot) -> Self {
        [snap.ax, snap.bx, snap.cx, snap.dx]
    }
}

impl fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ax={} bx={} cx={} dx={}",
            self.ax, self.bx, self.cx, self.dx
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        for reg in Register::ALL {
            assert_eq!(Register::from_name(reg.name()), Some(reg));
        }
        assert_eq!(Register::from_name("ex"), None);
        assert_eq!(Register::from_name("AX"), None);
        assert_eq!(Register::Cx.index(), 2);
    }

    #[test]
    fn test_mnemonics() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("label"), None);
        assert_eq!(Opcode::from_mnemonic("add"), None);
        assert!(Opcode::Jle.is_jump());
        assert!(!Opcode::Cmp.is_jump());
    }

    #[test]
    fn test_instruction_display() {
        let instr = Instruction::new(Opcode::Mov, vec!["ax".into(), Operand::Imm(-3)]);
        assert_eq!(instr.to_string(), "mov ax, -3");
    }

    #[test]
    fn test_program_listing() {
        let mut labels = HashMap::new();
        labels.insert("top".to_string(), 0);
        labels.insert("end".to_string(), 2);
        let program = Program::new(
            vec![
                Instruction::new(Opcode::Inc, vec!["ax".into()]),
                Instruction::new(Opcode::Jmp, vec!["end".into()]),
            ],
            labels,
        );
        let listing = program.to_string();
        assert_eq!(listing, "top:\n   0: inc ax\n   1: jmp end\nend:\n");
    }
}

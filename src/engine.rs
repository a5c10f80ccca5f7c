//! Execution Engine
//!
//! Runs a [`Program`] against the four-slot register file. The engine owns
//! all per-run state (registers, comparison flag, program counter) and is
//! used for one run at a time; call [`Engine::reset`] before reusing it.

use crate::error::{AsmError, Fault, Limits, Result};
use crate::ir::{Instruction, Opcode, Operand, Program, Register, RegisterSnapshot, REGISTER_COUNT};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Program counter is inside the instruction sequence
    Running,
    /// Program counter reached or passed the end
    Halted,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub registers: RegisterSnapshot,
    /// Instructions executed, jumps included
    pub steps: u64,
}

/// What the fetch loop does after a handler returns.
enum Flow {
    Advance,
    Jump(usize),
}

pub struct Engine<'p> {
    program: &'p Program,
    limits: Limits,
    registers: [i64; REGISTER_COUNT],
    flag: Ordering,
    pc: usize,
    steps: u64,
}

impl<'p> Engine<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self::with_limits(program, Limits::default())
    }

    pub fn with_limits(program: &'p Program, limits: Limits) -> Self {
        Self {
            program,
            limits,
            registers: [0; REGISTER_COUNT],
            flag: Ordering::Equal,
            pc: 0,
            steps: 0,
        }
    }

    /// Restores the initial machine state so the program can run again.
    pub fn reset(&mut self) {
        self.registers = [0; REGISTER_COUNT];
        self.flag = Ordering::Equal;
        self.pc = 0;
        self.steps = 0;
    }

    pub fn state(&self) -> State {
        if self.pc < self.program.len() {
            State::Running
        } else {
            State::Halted
        }
    }

    pub fn registers(&self) -> [i64; REGISTER_COUNT] {
        self.registers
    }

    pub fn register(&self, reg: Register) -> i64 {
        self.registers[reg.index()]
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn flag(&self) -> Ordering {
        self.flag
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs until the program counter leaves the program.
    pub fn run(&mut self) -> Result<RunReport> {
        debug!(
            instructions = self.program.len(),
            labels = self.program.labels().len(),
            "starting run"
        );
        while self.state() == State::Running {
            self.step()?;
        }
        debug!(steps = self.steps, pc = self.pc, "halted");
        Ok(self.report())
    }

    /// Executes the instruction under the program counter. A halted engine is
    /// left untouched.
    pub fn step(&mut self) -> Result<State> {
        let program = self.program;
        let Some(instr) = program.instructions().get(self.pc) else {
            return Ok(State::Halted);
        };

        if let Some(limit) = self.limits.max_steps {
            if self.steps >= limit {
                return Err(self.fail(instr.op, Fault::StepLimitExceeded(limit)));
            }
        }

        trace!(pc = self.pc, instr = %instr, "step");
        let flow = match self.execute(instr) {
            Ok(flow) => flow,
            Err(fault) => return Err(self.fail(instr.op, fault)),
        };
        self.steps += 1;
        self.pc = match flow {
            Flow::Advance => self.pc + 1,
            Flow::Jump(target) => target,
        };
        Ok(self.state())
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            registers: self.registers.into(),
            steps: self.steps,
        }
    }

    fn fail(&self, opcode: Opcode, fault: Fault) -> AsmError {
        warn!(index = self.pc, %opcode, %fault, "run aborted");
        AsmError::Fault {
            index: self.pc,
            opcode,
            fault,
            registers: self.registers.into(),
        }
    }

    fn execute(&mut self, instr: &Instruction) -> std::result::Result<Flow, Fault> {
        let ops = instr.operands.as_slice();
        match instr.op {
            Opcode::Mov => self.exec_mov(ops),
            Opcode::Inc => self.exec_add(ops, 1),
            Opcode::Dec => self.exec_add(ops, -1),
            Opcode::Cmp => self.exec_cmp(ops),
            Opcode::Jmp => self.exec_jump(ops, |_| true),
            Opcode::Je => self.exec_jump(ops, Ordering::is_eq),
            Opcode::Jne => self.exec_jump(ops, Ordering::is_ne),
            Opcode::Jg => self.exec_jump(ops, Ordering::is_gt),
            Opcode::Jge => self.exec_jump(ops, Ordering::is_ge),
            Opcode::Jl => self.exec_jump(ops, Ordering::is_lt),
            Opcode::Jle => self.exec_jump(ops, Ordering::is_le),
        }
    }

    fn exec_mov(&mut self, ops: &[Operand]) -> std::result::Result<Flow, Fault> {
        let [dst, src] = ops else {
            return Err(arity("2", ops));
        };
        let dst = destination(dst)?;
        self.registers[dst.index()] = self.resolve(src)?;
        Ok(Flow::Advance)
    }

    // Shared by inc (sign = 1) and dec (sign = -1).
    fn exec_add(&mut self, ops: &[Operand], sign: i64) -> std::result::Result<Flow, Fault> {
        let (dst, amount) = match ops {
            [dst] => (dst, 1),
            [dst, n] => (dst, self.resolve(n)?),
            _ => return Err(arity("1 or 2", ops)),
        };
        let slot = &mut self.registers[destination(dst)?.index()];
        *slot = slot.wrapping_add(amount.wrapping_mul(sign));
        Ok(Flow::Advance)
    }

    fn exec_cmp(&mut self, ops: &[Operand]) -> std::result::Result<Flow, Fault> {
        let [a, b] = ops else {
            return Err(arity("2", ops));
        };
        self.flag = self.resolve(a)?.cmp(&self.resolve(b)?);
        Ok(Flow::Advance)
    }

    fn exec_jump(
        &mut self,
        ops: &[Operand],
        taken: fn(Ordering) -> bool,
    ) -> std::result::Result<Flow, Fault> {
        let [target] = ops else {
            return Err(arity("1", ops));
        };
        // Resolve even when not taken so a bad target fails deterministically.
        let target = self.target(target)?;
        if taken(self.flag) {
            Ok(Flow::Jump(target))
        } else {
            Ok(Flow::Advance)
        }
    }

    fn resolve(&self, operand: &Operand) -> std::result::Result<i64, Fault> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Sym(name) => Register::from_name(name)
                .map(|reg| self.registers[reg.index()])
                .ok_or_else(|| Fault::UnknownRegister(name.clone())),
        }
    }

    fn target(&self, operand: &Operand) -> std::result::Result<usize, Fault> {
        match operand {
            Operand::Imm(value) => {
                usize::try_from(*value).map_err(|_| Fault::InvalidTarget(*value))
            }
            Operand::Sym(name) => self
                .program
                .label(name)
                .ok_or_else(|| Fault::UnresolvedLabel(name.clone())),
        }
    }
}

fn destination(operand: &Operand) -> std::result::Result<Register, Fault> {
    match operand {
        Operand::Sym(name) => {
            Register::from_name(name).ok_or_else(|| Fault::UnknownRegister(name.clone()))
        }
        Operand::Imm(value) => Err(Fault::ExpectedRegister(*value)),
    }
}

fn arity(expected: &'static str, ops: &[Operand]) -> Fault {
    Fault::Arity {
        expected,
        found: ops.len(),
    }
}

//! Error Types for miniasm
//!
//! Provides a unified error type for parsing, configuration and execution,
//! plus the resource limits a caller can place on a run.

use crate::ir::{Opcode, RegisterSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an instruction could not execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Operand names a register outside `ax`, `bx`, `cx`, `dx`
    UnknownRegister(String),
    /// Jump target names a label that was never declared
    UnresolvedLabel(String),
    /// Wrong number of operands for the opcode
    Arity {
        expected: &'static str,
        found: usize,
    },
    /// A literal appeared where a destination register is required
    ExpectedRegister(i64),
    /// Literal jump target that cannot be an instruction index
    InvalidTarget(i64),
    /// The configured step budget ran out
    StepLimitExceeded(u64),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::UnknownRegister(name) => write!(f, "unknown register '{}'", name),
            Fault::UnresolvedLabel(name) => write!(f, "unresolved label '{}'", name),
            Fault::Arity { expected, found } => {
                write!(f, "expected {} operand(s), found {}", expected, found)
            }
            Fault::ExpectedRegister(value) => {
                write!(f, "expected a register, found literal {}", value)
            }
            Fault::InvalidTarget(value) => write!(f, "invalid jump target {}", value),
            Fault::StepLimitExceeded(limit) => write!(f, "step limit of {} exceeded", limit),
        }
    }
}

/// Unified error type for miniasm operations
#[derive(Debug, Clone, PartialEq)]
pub enum AsmError {
    /// Failed to parse assembly source
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },
    /// A run aborted; carries the offending instruction and the machine state at failure
    Fault {
        index: usize,
        opcode: Opcode,
        fault: Fault,
        registers: RegisterSnapshot,
    },
    /// I/O operation failed
    IoError(String),
    /// Invalid configuration
    ConfigError(String),
    /// Resource limit exceeded before the run started
    ResourceLimitExceeded(String),
}

impl AsmError {
    /// The fault behind a failed run, if this is one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            AsmError::Fault { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::ParseError { line, col, message } => {
                write!(f, "Parse error at line {}:{}: {}", line, col, message)
            }
            AsmError::Fault {
                index,
                opcode,
                fault,
                registers,
            } => write!(
                f,
                "Execution error at instruction {} ({}): {} [{}]",
                index, opcode, fault, registers
            ),
            AsmError::IoError(msg) => write!(f, "I/O error: {}", msg),
            AsmError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AsmError::ResourceLimitExceeded(msg) => {
                write!(f, "Resource limit exceeded: {}", msg)
            }
        }
    }
}

impl std::error::Error for AsmError {}

/// Result type alias for miniasm operations
pub type Result<T> = std::result::Result<T, AsmError>;

impl From<std::io::Error> for AsmError {
    fn from(err: std::io::Error) -> Self {
        AsmError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AsmError {
    fn from(err: serde_json::Error) -> Self {
        AsmError::ConfigError(format!("JSON error: {}", err))
    }
}

/// Resource limits for loading and running a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum assembly source size in bytes
    pub max_source_size: usize,
    /// Maximum number of instructions in a program
    pub max_instructions: usize,
    /// Maximum executed instructions per run; `None` runs until halt
    pub max_steps: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_source_size: 1024 * 1024, // 1 MB
            max_instructions: 100_000,
            max_steps: None,
        }
    }
}

impl Limits {
    /// Create strict limits for untrusted programs
    pub fn strict() -> Self {
        Self {
            max_source_size: 64 * 1024, // 64 KB
            max_instructions: 1000,
            max_steps: Some(100_000),
        }
    }

    /// Create relaxed limits for trusted programs
    pub fn trusted() -> Self {
        Self {
            max_source_size: 16 * 1024 * 1024, // 16 MB
            max_instructions: 10_000_000,
            max_steps: None,
        }
    }

    /// Check if source size is within limits
    pub fn check_source_size(&self, size: usize) -> Result<()> {
        if size > self.max_source_size {
            return Err(AsmError::ResourceLimitExceeded(format!(
                "Source size {} bytes exceeds limit {} bytes",
                size, self.max_source_size
            )));
        }
        Ok(())
    }

    /// Check if instruction count is within limits
    pub fn check_instruction_count(&self, count: usize) -> Result<()> {
        if count > self.max_instructions {
            return Err(AsmError::ResourceLimitExceeded(format!(
                "Instruction count {} exceeds limit {}",
                count, self.max_instructions
            )));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == Some(0) {
            return Err(AsmError::ConfigError(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AsmError::ParseError {
            line: 3,
            col: 7,
            message: "unexpected ','".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error at line 3:7: unexpected ','");

        let err = AsmError::Fault {
            index: 4,
            opcode: Opcode::Mov,
            fault: Fault::UnknownRegister("ex".to_string()),
            registers: [1, 0, 0, 0].into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("instruction 4 (mov)"));
        assert!(msg.contains("unknown register 'ex'"));
        assert_eq!(
            err.fault(),
            Some(&Fault::UnknownRegister("ex".to_string()))
        );
    }

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_steps, None);
        assert!(limits.check_source_size(1000).is_ok());
        assert!(limits.check_source_size(10 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_limits_strict() {
        let limits = Limits::strict();
        assert!(limits.check_instruction_count(1000).is_ok());
        assert!(limits.check_instruction_count(1001).is_err());
        assert!(limits.max_steps.is_some());
    }

    #[test]
    fn test_limits_from_partial_json() {
        let limits: Limits = serde_json::from_str(r#"{ "max_steps": 50 }"#).unwrap();
        assert_eq!(limits.max_steps, Some(50));
        assert_eq!(limits.max_instructions, Limits::default().max_instructions);

        let bad: Limits = serde_json::from_str(r#"{ "max_steps": 0 }"#).unwrap();
        assert!(matches!(bad.validate(), Err(AsmError::ConfigError(_))));
    }
}

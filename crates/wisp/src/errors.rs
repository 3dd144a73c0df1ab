//! Pipeline error types.
//!
//! Compile-time failures (lexer, parser, type checker) all converge on
//! [`CompileError`] and share its `"[line N] message"` rendering; runtime
//! failures are a separate [`RuntimeError`], since by the time the VM is
//! running, compilation has already fully succeeded.

use std::fmt;

use crate::parser::ParseError;

/// One compile-time failure, carrying the source line it was detected on.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub line: i32,
    pub message: String,
}

impl CompileError {
    #[must_use]
    pub fn new(line: i32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(error: ParseError) -> Self {
        Self {
            line: error.line,
            message: error.message,
        }
    }
}

/// Sorts and renders a batch of compile errors the way `SPEC_FULL.md` §6
/// requires: one `"[line N] message"` per line, ascending by line.
#[must_use]
pub fn render_errors(mut errors: Vec<CompileError>) -> String {
    errors.sort_by_key(|e| e.line);
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/// A failure detected while executing already-compiled bytecode.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// More than 256 active call frames or stack slots (§7).
    StackOverflow,
    DivisionByZero,
    BadIndex { message: String },
    /// A native function's own precondition failed (e.g. opening a
    /// nonexistent file).
    Native { message: String },
    /// An opcode observed state the compiler should have prevented
    /// (indicates a compiler bug, not a user error).
    Internal { message: String },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow => write!(f, "stack overflow"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::BadIndex { message } | Self::Native { message } | Self::Internal { message } => {
                write!(f, "{message}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

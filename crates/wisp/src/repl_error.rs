//! Error type unifying the three pipeline stages a REPL line can fail at.

use std::fmt;

use crate::errors::{CompileError, RuntimeError, render_errors};

/// A failure from any pipeline stage, carrying enough to render the
/// `"[line N] message"` diagnostics `SPEC_FULL.md` §6/§7 specify.
#[derive(Debug, Clone)]
pub enum ReplError {
    /// Parsing failed; one or more syntax errors were accumulated before
    /// synchronization gave up.
    Parse(Vec<CompileError>),
    /// Parsing succeeded but type-checking/compilation found one or more
    /// errors.
    Compile(Vec<CompileError>),
    /// Compilation succeeded but the VM failed while executing the result.
    Runtime(RuntimeError),
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(errors) | Self::Compile(errors) => write!(f, "{}", render_errors(errors.clone())),
            Self::Runtime(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReplError {}

impl From<RuntimeError> for ReplError {
    fn from(error: RuntimeError) -> Self {
        Self::Runtime(error)
    }
}

//! End-to-end pipeline: source text in, a printed program and its final
//! value out.
//!
//! [`Runner`] owns nothing across calls — each [`Runner::run`] lexes,
//! parses, compiles, and executes one complete program in its own fresh
//! [`Heap`]/[`Interner`]/[`VM`]. For running several statements against one
//! persistent VM (a REPL), see [`crate::repl::ReplSession`] instead.

use crate::{
    bytecode::{Compiler, VM},
    errors::{CompileError, render_errors},
    heap::Heap,
    intern::Interner,
    io::PrintWriter,
    parser::Parser,
    repl_error::ReplError,
    value::Value,
};

/// Runs one program to completion, printing through `P` and returning its
/// final value.
#[derive(Debug)]
pub struct Runner<P: PrintWriter> {
    print: P,
}

impl<P: PrintWriter + Default> Default for Runner<P> {
    fn default() -> Self {
        Self { print: P::default() }
    }
}

impl<P: PrintWriter + Default> Runner<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: PrintWriter> Runner<P> {
    #[must_use]
    pub fn with_print(print: P) -> Self {
        Self { print }
    }

    /// Lexes, parses, type-checks/compiles, and runs `source`.
    ///
    /// # Errors
    ///
    /// Returns the accumulated parse errors, compile errors, or the single
    /// runtime error that ended execution, whichever stage failed first.
    pub fn run(self, source: &str) -> Result<RunOutcome<P>, ReplError> {
        let (ast, parse_errors) = Parser::new(source).parse_program();
        if !parse_errors.is_empty() {
            let errors = parse_errors
                .into_iter()
                .map(|e| CompileError::new(e.line, e.message))
                .collect();
            return Err(ReplError::Parse(errors));
        }
        let mut heap = Heap::new();
        let mut interner = Interner::new();
        let function = Compiler::compile_program(ast, &mut heap, &mut interner).map_err(ReplError::Compile)?;
        let mut vm = VM::with_heap(self.print, heap, interner);
        let value = vm.run_program(function)?;
        Ok(RunOutcome { value, print: vm.into_print() })
    }
}

/// What a completed [`Runner::run`] produced.
#[derive(Debug)]
pub struct RunOutcome<P: PrintWriter> {
    pub value: Value,
    pub print: P,
}

/// Renders accumulated parse/compile errors the way the CLI and REPL print
/// them: one `"[line N] message"` per line, ascending by line.
#[must_use]
pub fn render_diagnostics(error: &ReplError) -> String {
    match error {
        ReplError::Parse(errors) | ReplError::Compile(errors) => render_errors(errors.clone()),
        ReplError::Runtime(err) => err.to_string(),
    }
}

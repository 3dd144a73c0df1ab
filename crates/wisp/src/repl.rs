//! Persistent REPL session support.
//!
//! `ReplSession` keeps one heap, intern table, and value stack alive across
//! `execute()` calls — matching `original_source/main.c`'s `repl()`, which
//! compiles each line as its own independent top-level script but never
//! re-initializes the VM between lines. A failed statement is recovered from
//! by discarding it; the session's heap and previously defined structs/enums
//! from *successful* lines are untouched (each line's `Compiler` starts with
//! fresh locals, the same way `init_compiler` does in the original).

use crate::{
    bytecode::{Compiler, VM},
    io::PrintWriter,
    parser::Parser,
    repl_error::ReplError,
    value::Value,
};

/// One interactive session: parses, compiles, and runs one line at a time
/// against a VM that persists across calls.
pub struct ReplSession<P: PrintWriter> {
    vm: VM<P>,
}

impl<P: PrintWriter> ReplSession<P> {
    #[must_use]
    pub fn new(print: P) -> Self {
        Self { vm: VM::new(print) }
    }

    /// Compiles and runs one line.
    ///
    /// # Errors
    ///
    /// Returns parse errors, compile errors, or a single runtime error. Any
    /// of these leaves the session ready for the next line: a compile
    /// failure never reaches the VM, and a runtime failure clears whatever
    /// frames and stack slots the aborted statement left behind.
    pub fn execute(&mut self, line: &str) -> Result<Value, ReplError> {
        let (ast, parse_errors) = Parser::new(line).parse_program();
        if !parse_errors.is_empty() {
            let errors = parse_errors
                .into_iter()
                .map(|e| crate::errors::CompileError::new(e.line, e.message))
                .collect();
            return Err(ReplError::Parse(errors));
        }
        let function = Compiler::compile_program(ast, &mut self.vm.heap, &mut self.vm.interner).map_err(ReplError::Compile)?;
        let result = self.vm.run_program(function);
        if result.is_err() {
            self.vm.reset_execution_state();
        }
        result.map_err(ReplError::from)
    }

    #[must_use]
    pub fn print(&self) -> &P {
        self.vm.print()
    }

    #[must_use]
    pub fn into_print(self) -> P {
        self.vm.into_print()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;

    #[test]
    fn recovers_from_a_failed_line() {
        let mut session = ReplSession::new(CollectStringPrint::new());
        assert!(session.execute("1 +").is_err());
        assert!(session.execute("print(\"still alive\")").is_ok());
        assert!(session.print().output().contains("still alive"));
    }

    #[test]
    fn shares_the_heap_across_lines() {
        let mut session = ReplSession::new(CollectStringPrint::new());
        session.execute("print(\"a\")").unwrap();
        session.execute("print(\"b\")").unwrap();
        assert_eq!(session.into_print().into_output(), "a\nb\n");
    }
}

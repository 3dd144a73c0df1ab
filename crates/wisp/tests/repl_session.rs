//! Interactive-session behavior: one line at a time against a persistent VM.

use pretty_assertions::assert_eq;
use wisp::{CollectStringPrint, ReplSession};

#[test]
fn each_line_is_independently_compiled_but_shares_the_heap() {
    let mut session = ReplSession::new(CollectStringPrint::new());
    session.execute("greeting : string = \"hi\"").unwrap();
    // `greeting` does not persist as a named binding across lines (each line
    // is its own top-level script, mirroring `original_source/main.c`'s
    // `repl()`), but the session's heap and VM state do.
    let err = session.execute("print(greeting)").unwrap_err();
    assert!(wisp::render_diagnostics(&err).contains("Undeclared identifier"));
}

#[test]
fn a_failed_line_does_not_poison_later_lines() {
    let mut session = ReplSession::new(CollectStringPrint::new());
    assert!(session.execute("1 / 0").is_err());
    assert!(session.execute("print(\"ok\")").is_ok());
    assert!(session.execute("print(string(1 + 1))").is_ok());
    assert_eq!(session.print().output(), "ok\n2\n");
}

#[test]
fn parse_failures_also_recover() {
    let mut session = ReplSession::new(CollectStringPrint::new());
    assert!(session.execute("x : int = ").is_err());
    assert!(session.execute("print(string(42))").is_ok());
    assert_eq!(session.print().output(), "42\n");
}

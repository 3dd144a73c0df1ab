//! Failing programs: parse errors, compile errors, and their rendering.

use pretty_assertions::assert_eq;
use wisp::{CollectStringPrint, Runner, render_diagnostics};

fn run_err(source: &str) -> String {
    let err = Runner::with_print(CollectStringPrint::new())
        .run(source)
        .err()
        .unwrap_or_else(|| panic!("expected {source:?} to fail"));
    render_diagnostics(&err)
}

#[test]
fn unterminated_binary_expression_is_a_parse_error() {
    let message = run_err("x : int = 1 +");
    assert!(message.starts_with("[line 1]"), "got: {message}");
}

#[test]
fn unknown_variable_reference_is_reported() {
    let message = run_err("print(string(undefined_name))");
    assert!(message.starts_with("[line 1]"), "got: {message}");
}

#[test]
fn binary_operand_type_mismatch_is_reported() {
    let message = run_err("x : int = 1 + \"two\"");
    assert_eq!(message, "[line 1] Operand types of binary expression must match.");
}

#[test]
fn assignment_type_mismatch_is_reported() {
    let source = "
        x : int = 1
        x = \"two\"
    ";
    let message = run_err(source);
    assert!(message.contains("Assignment type must match the variable's declared type."), "got: {message}");
}

#[test]
fn errors_are_rendered_in_ascending_line_order_regardless_of_detection_order() {
    // Both lines fail independently; the renderer must sort by line even
    // though whichever detection order the compiler visits them in may
    // differ from source order.
    let source = "
        a : int = \"one\"
        b : int = \"two\"
    ";
    let message = run_err(source);
    let lines: Vec<&str> = message.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("[line 2]"));
    assert!(lines[1].starts_with("[line 3]"));
}

#[test]
fn division_by_zero_is_a_runtime_error_not_a_compile_error() {
    let message = run_err("x : int = 1 / 0 print(string(x))");
    assert_eq!(message, "division by zero");
}

#[test]
fn when_blocks_are_rejected_at_parse_time() {
    // `when` is lexed (`TokenKind::When`) and `Node::When` exists in the AST
    // for completeness, but the parser has no production that builds one —
    // it is unreachable from any program the parser can produce, and a
    // `when` block fails here with an ordinary "expect expression" syntax
    // error rather than reaching the compiler's dead `Node::When` arm.
    let message = run_err("when x { }");
    assert!(message.starts_with("[line 1]"), "got: {message}");
    assert!(message.contains("Expect expression."), "got: {message}");
}

//! End-to-end program scenarios, run through the public `Runner` API.

use pretty_assertions::assert_eq;
use wisp::{CollectStringPrint, Runner};

fn run(source: &str) -> String {
    Runner::with_print(CollectStringPrint::new())
        .run(source)
        .unwrap_or_else(|err| panic!("expected {source:?} to run, got {err}"))
        .print
        .into_output()
}

#[test]
fn arithmetic_and_precedence() {
    let output = run("x : int = 1 + 2 * 3 - 4 print(string(x))");
    assert_eq!(output, "3\n");
}

#[test]
fn lexical_closure_capture() {
    let source = "
        make : () -> (() -> int) = () -> () -> int {
            c : int = 0
            return () -> int {
                c = c + 1
                return c
            }
        }
        f : () -> int = make()
        print(string(f()))
        print(string(f()))
        print(string(f()))
    ";
    assert_eq!(run(source), "1\n2\n3\n");
}

#[test]
fn struct_inheritance_and_override() {
    let source = "
        A : struct = struct { x : int = 1 }
        B : struct = struct < A { x : int = 2 y : int = 3 }
        b : B = B()
        print(string(b.x))
        print(string(b.y))
    ";
    assert_eq!(run(source), "2\n3\n");
}

#[test]
fn overriding_a_property_with_a_mismatched_type_is_a_compile_error() {
    let source = "
        A : struct = struct { x : int = 1 }
        B : struct = struct < A { x : string = \"nope\" }
    ";
    let err = Runner::with_print(CollectStringPrint::new()).run(source).unwrap_err();
    let message = wisp::render_diagnostics(&err);
    assert!(message.contains("Overwritten property must of same type"), "got: {message}");
}

#[test]
fn foreach_desugars_and_iterates_in_order() {
    let source = "
        xs : List<int> = List<int>()
        xs.size = 3
        xs[0] = 10
        xs[1] = 20
        xs[2] = 30
        foreach v : int in xs {
            print(string(v))
        }
    ";
    assert_eq!(run(source), "10\n20\n30\n");
}

#[test]
fn type_mismatch_produces_a_line_sorted_diagnostic_and_fails() {
    let err = Runner::with_print(CollectStringPrint::new()).run("x : int = \"hello\"").unwrap_err();
    let message = wisp::render_diagnostics(&err);
    assert_eq!(message, "[line 1] Declaration type and right hand side type must match.");
}

#[test]
fn garbage_collection_across_many_allocations_preserves_semantics() {
    // Each loop iteration interns a fresh, immediately-unreachable string,
    // pushing the heap well past its initial growth threshold and forcing
    // several real collections mid-run. The loop counter must survive them
    // untouched.
    let source = "
        i : int = 0
        while i < 2000 {
            string(i)
            i = i + 1
        }
        print(string(i))
    ";
    assert_eq!(run(source), "2000\n");
}

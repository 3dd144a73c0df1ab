// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise (for flamegraphs)
#[cfg(codspeed)]
use codspeed_criterion_compat::{Bencher, Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use wisp::{NoPrint, Runner, Value};

/// Runs `source` to completion and asserts its final value, then measures the
/// full lex/parse/compile/run pipeline per iteration.
///
/// Non-foldable bodies (locals assigned at runtime, loops) are used so the
/// measured time reflects actual bytecode execution rather than the compiler
/// short-circuiting a constant expression.
fn run_wisp(bench: &mut Bencher, source: &str, expected: i32) {
    let value = Runner::with_print(NoPrint).run(source).unwrap().value;
    assert!(matches!(value, Value::Int(n) if n == expected));

    bench.iter(|| {
        let value = Runner::with_print(NoPrint).run(black_box(source)).unwrap().value;
        black_box(value);
    });
}

/// Two locals added at runtime.
const ADD_TWO_LOCALS: &str = "
x : int = 1
y : int = 2
return x + y
";

/// Tight arithmetic loop over local ints.
const ADD_TWO_LOOP_1000: &str = "
x : int = 1
y : int = 2
total : int = 0
i : int = 0
while i < 1000 {
    total = total + x + y
    i = i + 1
}
return total
";

/// Configures the non-foldable arithmetic benchmark group.
fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("add_two_locals", |b| run_wisp(b, ADD_TWO_LOCALS, 3));
    c.bench_function("add_two_loop_1000", |b| run_wisp(b, ADD_TWO_LOOP_1000, 3000));
}

// Use pprof flamegraph profiler when running locally (not on CodSpeed)
#[cfg(not(codspeed))]
criterion_group!(benches, criterion_benchmark);

// Use default config when running on CodSpeed
#[cfg(codspeed)]
criterion_group!(benches, criterion_benchmark);

criterion_main!(benches);

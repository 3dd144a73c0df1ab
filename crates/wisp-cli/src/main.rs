use std::{
    env, fs,
    io::{self, Write as _},
    process::ExitCode,
};

use wisp::{ReplSession, Runner, StdPrint, render_diagnostics};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1) {
        Some(path) => run_file(path),
        None => run_repl(),
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    match Runner::with_print(StdPrint).run(&source) {
        Ok(_outcome) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_diagnostics(&err));
            ExitCode::FAILURE
        }
    }
}

fn run_repl() -> ExitCode {
    let mut session = ReplSession::new(StdPrint);
    let mut line = String::new();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }
        line.clear();
        let bytes_read = match io::stdin().read_line(&mut line) {
            Ok(n) => n,
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                return ExitCode::FAILURE;
            }
        };
        if bytes_read == 0 || line.starts_with('q') {
            break;
        }
        if let Err(err) = session.execute(&line) {
            eprintln!("{}", render_diagnostics(&err));
        }
    }
    ExitCode::SUCCESS
}

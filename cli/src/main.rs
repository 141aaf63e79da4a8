mod args;

use std::{fs, path::PathBuf, process::exit};

use args::Action;
use colored::Colorize;
use embers_compiler::{compile, Heap};
use embers_vm::Vm;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

fn main() {
    match args::get_action() {
        Ok(Action::RunFile(path)) => run_file(path),
        Ok(Action::Repl) => run_repl(),
        Err(err) => {
            eprintln!("{err}");
            exit(exitcode::USAGE);
        }
    }
}

fn run_file(path: PathBuf) {
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("Could not open file \"{}\".", path.display());
            exit(exitcode::IOERR);
        }
    };

    match run_source(&source) {
        Ok(()) => exit(exitcode::OK),
        Err(Outcome::CompileError) => exit(exitcode::DATAERR),
        Err(Outcome::RuntimeError) => exit(exitcode::SOFTWARE),
    }
}

fn run_repl() {
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let _ = run_source(&line);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                eprintln!("{err}");
                break;
            }
        }
    }
}

enum Outcome {
    CompileError,
    RuntimeError,
}

fn run_source(source: &str) -> Result<(), Outcome> {
    let mut heap = Heap::new();
    let function = compile(source, &mut heap).map_err(|errors| {
        for err in errors {
            eprintln!("{err}");
        }
        Outcome::CompileError
    })?;

    let mut vm = Vm::new(heap);
    vm.run(function).map_err(|err| {
        eprintln!("{}", err.message.red());
        eprint!("{}", err.backtrace);
        Outcome::RuntimeError
    })
}

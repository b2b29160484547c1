// File: src/main.rs
//
// Main entry point for the Mica interpreter.
// Handles command-line argument parsing and dispatches to the
// appropriate subcommand (run, repl, or dis).

mod ast;
mod builtins;
mod bytecode;
mod compiler;
mod disassembler;
mod errors;
mod globals;
mod lexer;
mod parser;
mod repl;
mod value;
mod vm;

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(
    name = "mica",
    about = "Mica: a small expression-oriented scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Run a Mica script file
    Run {
        /// Path to the .mica file
        file: PathBuf,

        /// Print the disassembly before executing
        #[arg(long)]
        disassemble: bool,
    },

    /// Launch the interactive Mica REPL
    Repl,

    /// Disassemble a Mica script without running it
    Dis {
        /// Path to the .mica file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, disassemble } => {
            let source = read_source(&file);
            let mut vm = vm::Vm::new();
            let code = match vm.compile(&source) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(1);
                }
            };
            if disassemble || std::env::var("MICA_DIS").is_ok() {
                let dis = disassembler::Disassembler::new(vm.globals());
                eprint!("{}", dis.disassemble_all(&code));
            }
            if let Err(err) = vm.run(code) {
                eprintln!("{}", err);
                process::exit(1);
            }
        }

        Commands::Repl => match repl::Repl::new() {
            Ok(mut repl) => {
                if let Err(err) = repl.run() {
                    eprintln!("REPL error: {}", err);
                    process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("Failed to start REPL: {}", err);
                process::exit(1);
            }
        },

        Commands::Dis { file } => {
            let source = read_source(&file);
            let mut vm = vm::Vm::new();
            match vm.compile(&source) {
                Ok(code) => {
                    let dis = disassembler::Disassembler::new(vm.globals());
                    print!("{}", dis.disassemble_all(&code));
                }
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(1);
                }
            }
        }
    }
}

fn read_source(file: &Path) -> String {
    match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Failed to read {}: {}", file.display(), err);
            process::exit(1);
        }
    }
}

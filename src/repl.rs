// File: src/repl.rs
//
// Interactive REPL (Read-Eval-Print Loop) for Mica.
// Provides an interactive shell with multi-line input for functions
// and control structures, command history, special commands, and a
// persistent VM so globals survive across inputs.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::value::Value;
use crate::vm::Vm;

/// REPL session holding the VM state and the line editor.
pub struct Repl {
    vm: Vm,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { vm: Vm::new(), editor })
    }

    fn show_banner(&self) {
        println!("{}", format!("Mica {} interactive shell", env!("CARGO_PKG_VERSION")).bright_cyan());
        println!(
            "  Type {} for commands, {} to exit. Unclosed braces continue on the next line.",
            ":help".bright_yellow(),
            ":quit".bright_yellow()
        );
        println!();
    }

    /// Starts the REPL loop
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "mica> ".bright_green().to_string()
            } else {
                "....> ".bright_blue().to_string()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_input_complete(&buffer) {
                        self.eval_input(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (:quit to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles special REPL commands starting with ':'.
    /// Returns true to continue, false to quit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" | ":exit" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":clear" | ":c" => {
                print!("\x1B[2J\x1B[1;1H");
                self.show_banner();
                true
            }
            ":globals" | ":g" => {
                self.show_globals();
                true
            }
            ":reset" | ":r" => {
                self.vm = Vm::new();
                println!("{}", "Environment reset".bright_green());
                true
            }
            _ => {
                println!(
                    "{} Unknown command: {}. Type {} for available commands.",
                    "Error:".bright_red(),
                    cmd.bright_yellow(),
                    ":help".bright_yellow()
                );
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "REPL commands:".bright_cyan().bold());
        println!("  {}    or :h   Display this help message", ":help".bright_yellow());
        println!("  {}    or :q   Exit the REPL", ":quit".bright_yellow());
        println!("  {}   or :c   Clear the screen", ":clear".bright_yellow());
        println!("  {} or :g   List global variables", ":globals".bright_yellow());
        println!("  {}   or :r   Reset the VM state", ":reset".bright_yellow());
        println!();
        println!("{}", "Examples:".bright_cyan().bold());
        println!("  {}", "mica> var x = 42;".dimmed());
        println!("  {}", "mica> func greet(name) {".dimmed());
        println!("  {}", "....>     print(\"Hello, \" + name);".dimmed());
        println!("  {}", "....> }".dimmed());
        println!("  {}", "mica> greet(\"World\");".dimmed());
        println!();
    }

    fn show_globals(&self) {
        println!();
        for var in self.vm.globals().iter() {
            println!("  {} = {}", var.name.bright_yellow(), var.value.repr());
        }
        println!();
    }

    /// Executes accumulated input and displays the result value.
    fn eval_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }
        match self.vm.exec(input) {
            // Statements that produce nothing stay quiet
            Ok(Value::Nil) => {}
            Ok(value) => println!("{} {}", "=>".bright_blue(), value.repr().bright_white()),
            Err(err) => eprintln!("{}", err),
        }
    }
}

/// True when all delimiters are balanced outside strings and comments,
/// so the accumulated buffer forms a complete input.
fn is_input_complete(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return true;
    }

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut prev = '\0';
    let mut in_comment = false;

    for ch in trimmed.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                prev = '\0';
            }
            continue;
        }
        if escape_next {
            escape_next = false;
            prev = '\0';
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '/' if !in_string && prev == '/' => {
                in_comment = true;
                prev = '\0';
                continue;
            }
            '{' | '[' | '(' if !in_string => depth += 1,
            '}' | ']' | ')' if !in_string => depth -= 1,
            _ => {}
        }
        prev = ch;
    }

    !in_string && depth <= 0
}

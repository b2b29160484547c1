// File: src/errors.rs
//
// Error handling and reporting for the Mica interpreter.
// Provides the structured error type shared by the lexer, parser,
// compiler, and VM, with pretty-printed messages for the CLI and REPL.

use colored::Colorize;
use std::fmt;

/// Categories of failure, split between compile time and run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    UndefinedVariable,
    Redeclaration,
    UnknownOperator,
    TooManyConstants,
    TooManyLocals,
    TooManyGlobals,
    MalformedAst,
    TypeError,
    DivisionByZero,
    IndexOutOfRange,
    NotCallable,
    ArityMismatch,
    StackOverflow,
    StackUnderflow,
    FrameOverflow,
    UndefinedOpcode,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Parse => write!(f, "Parse Error"),
            ErrorKind::UndefinedVariable => write!(f, "Undefined Variable"),
            ErrorKind::Redeclaration => write!(f, "Redeclaration"),
            ErrorKind::UnknownOperator => write!(f, "Unknown Operator"),
            ErrorKind::TooManyConstants => write!(f, "Too Many Constants"),
            ErrorKind::TooManyLocals => write!(f, "Too Many Locals"),
            ErrorKind::TooManyGlobals => write!(f, "Too Many Globals"),
            ErrorKind::MalformedAst => write!(f, "Malformed AST"),
            ErrorKind::TypeError => write!(f, "Type Error"),
            ErrorKind::DivisionByZero => write!(f, "Division By Zero"),
            ErrorKind::IndexOutOfRange => write!(f, "Index Out Of Range"),
            ErrorKind::NotCallable => write!(f, "Not Callable"),
            ErrorKind::ArityMismatch => write!(f, "Arity Mismatch"),
            ErrorKind::StackOverflow => write!(f, "Stack Overflow"),
            ErrorKind::StackUnderflow => write!(f, "Stack Underflow"),
            ErrorKind::FrameOverflow => write!(f, "Frame Overflow"),
            ErrorKind::UndefinedOpcode => write!(f, "Undefined Opcode"),
            ErrorKind::Runtime => write!(f, "Runtime Error"),
        }
    }
}

/// A structured interpreter error.
///
/// Compile-time errors carry the offending symbol in the message; VM
/// errors carry the code-object name and byte offset in `context`.
#[derive(Debug, Clone)]
pub struct MicaError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Option<String>,
}

impl MicaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Create a parse error anchored to a source position
    pub fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(ErrorKind::Parse, message).with_context(format!("{}:{}", line, column))
    }

    /// Create an undefined variable error
    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("variable '{}' is not defined", name))
    }

    /// Create a redeclaration error
    pub fn redeclaration(name: &str) -> Self {
        Self::new(
            ErrorKind::Redeclaration,
            format!("variable '{}' already exists in this scope", name),
        )
    }

    /// Create an unknown operator error
    pub fn unknown_operator(op: &str) -> Self {
        Self::new(ErrorKind::UnknownOperator, format!("unknown operator '{}'", op))
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Create a division by zero error
    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero")
    }

    /// Create an index out of range error
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("index {} out of range for array of length {}", index, len),
        )
    }

    /// Create an arity mismatch error
    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("{}() expects {} arguments, got {}", name, expected, got),
        )
    }
}

impl fmt::Display for MicaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind_str = format!("{}", self.kind);
        write!(f, "{}: {}", kind_str.red().bold(), self.message.bold())?;
        if let Some(ref context) = self.context {
            write!(f, "\n{}", format!("  --> {}", context).bright_blue())?;
        }
        Ok(())
    }
}

impl std::error::Error for MicaError {}

// File: src/builtins.rs
//
// Built-in native functions registered on every VM.
// Each builtin is a plain Rust function bound to a global slot as a
// native value; the CALL instruction invokes it without pushing a frame.

use std::rc::Rc;

use rand::Rng;

use crate::errors::MicaError;
use crate::globals::Globals;
use crate::value::{NativeFn, NativeFunction, Value};

pub struct BuiltinDef {
    pub name: &'static str,
    /// Expected argument count; `None` accepts any arity.
    pub arity: Option<usize>,
    pub func: NativeFn,
}

/// The default builtin set registered by `Vm::new`.
pub const DEFAULT_BUILTINS: &[BuiltinDef] = &[
    BuiltinDef { name: "print", arity: None, func: print },
    BuiltinDef { name: "random", arity: Some(1), func: random },
    BuiltinDef { name: "len", arity: Some(1), func: len },
    BuiltinDef { name: "push", arity: Some(2), func: push },
];

pub fn register_defaults(globals: &mut Globals) {
    for def in DEFAULT_BUILTINS {
        globals.define_value(
            def.name,
            Value::Native(Rc::new(NativeFunction {
                name: def.name.to_string(),
                arity: def.arity,
                func: def.func,
            })),
        );
    }
}

/// `print(args...)` writes a human-readable rendering of each argument,
/// space-separated and newline-terminated. Returns nil.
fn print(args: &[Value]) -> Result<Value, MicaError> {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Nil)
}

/// `random(max)` returns a number uniform in `[-max, max]`.
fn random(args: &[Value]) -> Result<Value, MicaError> {
    match args.first() {
        Some(Value::Number(max)) if max.is_finite() && *max >= 0.0 => {
            let mut rng = rand::thread_rng();
            Ok(Value::Number(rng.gen_range(-max..=*max)))
        }
        _ => Err(MicaError::type_error("random(max) expects a non-negative number")),
    }
}

/// `len(x)` returns the element count of an array or the character
/// count of a string.
fn len(args: &[Value]) -> Result<Value, MicaError> {
    match args.first() {
        Some(Value::Array(elements)) => Ok(Value::Number(elements.borrow().len() as f64)),
        Some(Value::Str(s)) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(MicaError::type_error("len() expects an array or a string")),
    }
}

/// `push(arr, value)` appends to an array and returns the array.
fn push(args: &[Value]) -> Result<Value, MicaError> {
    match (args.first(), args.get(1)) {
        (Some(Value::Array(elements)), Some(value)) => {
            elements.borrow_mut().push(value.clone());
            Ok(Value::Array(Rc::clone(elements)))
        }
        _ => Err(MicaError::type_error("push() expects an array and a value")),
    }
}

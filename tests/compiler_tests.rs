// Compiler and bytecode-level tests for Mica
//
// These tests compile programs without running them and inspect the
// emitted code objects: exact instruction encodings, big-endian jump
// patching, constant-pool deduplication, local slot allocation, and
// the disassembler output.

use std::collections::HashSet;
use std::rc::Rc;

use mica::ast::{Expr, Stmt};
use mica::bytecode::{CodeObject, OpCode};
use mica::compiler::Compiler;
use mica::disassembler::Disassembler;
use mica::errors::{ErrorKind, MicaError};
use mica::globals::Globals;
use mica::lexer::tokenize;
use mica::parser::Parser;
use mica::value::Value;

fn compile_with_globals(source: &str) -> (Rc<CodeObject>, Globals) {
    let tokens = tokenize(source).expect("source should tokenize");
    let program = Parser::new(tokens).parse().expect("source should parse");
    let mut globals = Globals::new();
    let code = Compiler::new(&mut globals).compile(&program).expect("source should compile");
    (code, globals)
}

fn compile(source: &str) -> Rc<CodeObject> {
    compile_with_globals(source).0
}

fn compile_err(source: &str) -> MicaError {
    let tokens = tokenize(source).expect("source should tokenize");
    let program = Parser::new(tokens).parse().expect("source should parse");
    let mut globals = Globals::new();
    Compiler::new(&mut globals)
        .compile(&program)
        .expect_err("compilation should fail")
}

/// Find the nested function code object with the given name.
fn nested_fn(code: &CodeObject, name: &str) -> Rc<CodeObject> {
    code.constants
        .iter()
        .find_map(|c| match c {
            Value::Code(co) if co.name == name => Some(Rc::clone(co)),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no nested code object named '{}'", name))
}

// --- Opcode encoding ---

#[test]
fn opcode_bytes_roundtrip() {
    let ops = [
        OpCode::Halt,
        OpCode::Const,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Compare,
        OpCode::JumpIfFalse,
        OpCode::Jump,
        OpCode::GetGlobal,
        OpCode::SetGlobal,
        OpCode::GetLocal,
        OpCode::SetLocal,
        OpCode::LogicalNot,
        OpCode::JumpIfFalseOrPop,
        OpCode::JumpIfTrueOrPop,
        OpCode::Dup,
        OpCode::Call,
        OpCode::Return,
        OpCode::Array,
        OpCode::ArrayGet,
        OpCode::ArraySet,
        OpCode::Nil,
    ];
    for op in ops {
        assert_eq!(OpCode::from_byte(op as u8), Some(op), "{} should roundtrip", op.mnemonic());
    }
}

#[test]
fn bytes_outside_the_set_do_not_decode() {
    assert_eq!(OpCode::from_byte(0x0A), None);
    assert_eq!(OpCode::from_byte(0xFF), None);
}

#[test]
fn jump_operands_are_two_bytes_and_others_at_most_one() {
    assert_eq!(OpCode::Jump.operand_width(), 2);
    assert_eq!(OpCode::JumpIfFalse.operand_width(), 2);
    assert_eq!(OpCode::JumpIfFalseOrPop.operand_width(), 2);
    assert_eq!(OpCode::JumpIfTrueOrPop.operand_width(), 2);
    assert_eq!(OpCode::Const.operand_width(), 1);
    assert_eq!(OpCode::Call.operand_width(), 1);
    assert_eq!(OpCode::Compare.operand_width(), 1);
    assert_eq!(OpCode::Add.operand_width(), 0);
    assert_eq!(OpCode::Halt.operand_width(), 0);
}

// --- Emission ---

#[test]
fn main_is_named_and_ends_with_halt() {
    let code = compile("1;");
    assert_eq!(code.name, "main");
    assert_eq!(code.code.last(), Some(&(OpCode::Halt as u8)));
}

#[test]
fn constant_pool_deduplicates_literals() {
    let code = compile("1; 1; 2; 1;");
    assert_eq!(code.constants.len(), 2);

    let code = compile("\"a\"; \"a\";");
    assert_eq!(code.constants.len(), 1);

    let code = compile("true; true; false;");
    assert_eq!(code.constants.len(), 2);
}

#[test]
fn if_else_emits_big_endian_back_patched_jumps() {
    let code = compile("if (true) {1;} else {2;}");
    // constants: [true, 1, 2]
    assert_eq!(
        code.code,
        vec![
            0x01, 0, // CONST true
            0x07, 0, 10, // JUMP_IF_FALSE -> else branch
            0x01, 1, // CONST 1
            0x08, 0, 12, // JUMP -> end
            0x01, 2, // CONST 2
            0x00, // HALT
        ]
    );
}

#[test]
fn if_without_else_emits_nil_on_the_false_path() {
    let code = compile("if (true) {1;}");
    assert_eq!(
        code.code,
        vec![
            0x01, 0, // CONST true
            0x07, 0, 10, // JUMP_IF_FALSE -> NIL
            0x01, 1, // CONST 1
            0x08, 0, 11, // JUMP -> end
            0x20, // NIL
            0x00, // HALT
        ]
    );
}

#[test]
fn short_circuit_and_emits_or_pop_jump_without_dup() {
    let code = compile("true && false;");
    assert_eq!(
        code.code,
        vec![
            0x01, 0, // CONST true
            0x16, 0, 7, // JUMP_IF_FALSE_OR_POP -> end
            0x01, 1, // CONST false
            0x00, // HALT
        ]
    );
}

#[test]
fn compare_carries_its_kind_byte() {
    let code = compile("1 < 2;");
    assert_eq!(code.code, vec![0x01, 0, 0x01, 1, 0x06, 0, 0x00]);

    let code = compile("1 != 2;");
    assert_eq!(code.code, vec![0x01, 0, 0x01, 1, 0x06, 5, 0x00]);
}

#[test]
fn array_literal_duplicates_the_handle_per_element() {
    let code = compile("[1, 2];");
    // constants: [0, 1, 2]; each element is DUP, CONST idx, CONST value, ARRAY_SET
    assert_eq!(
        code.code,
        vec![
            0x1B, // ARRAY
            0x18, 0x01, 0, 0x01, 1, 0x1D, // a[0] = 1
            0x18, 0x01, 1, 0x01, 2, 0x1D, // a[1] = 2
            0x00, // HALT
        ]
    );
    assert_eq!(code.constants.len(), 3);
}

#[test]
fn top_level_var_compiles_to_a_global_slot() {
    let (code, globals) = compile_with_globals("var x = 5;");
    assert!(globals.exists("x"));
    assert_eq!(code.code, vec![0x01, 0, 0x10, 0, 0x00]);
}

#[test]
fn while_loop_jumps_back_to_the_condition() {
    let code = compile("var i = 0; while (i < 3) { i = i + 1; }");
    // The unconditional back-edge must target the condition offset
    let back_jump = code
        .code
        .windows(3)
        .position(|w| w[0] == OpCode::Jump as u8)
        .expect("while should emit a back-edge");
    let target = ((code.code[back_jump + 1] as usize) << 8) | code.code[back_jump + 2] as usize;
    assert_eq!(target, 4, "back-edge should return to the condition");
}

// --- Jump target hygiene ---

#[test]
fn every_jump_lands_on_an_instruction_boundary() {
    let source = "
        var t = 0;
        if (t < 1) { t = 1; } else { t = 2; }
        while (t < 5) { t = t + 1; }
        for (var i = 0; i < 3; i = i + 1) { t = t + i; }
        var a = (t > 0) && (t < 100);
        var b = (t == 0) || (t > 1);
        if (a) t = 0;
    ";
    let code = compile(source);

    let mut boundaries = HashSet::new();
    let mut jumps = Vec::new();
    let mut offset = 0;
    while offset < code.code.len() {
        boundaries.insert(offset);
        let op = OpCode::from_byte(code.code[offset]).expect("compiler emits defined opcodes");
        if op.operand_width() == 2 {
            let target =
                ((code.code[offset + 1] as usize) << 8) | code.code[offset + 2] as usize;
            jumps.push((offset, target));
        }
        offset += 1 + op.operand_width();
    }
    boundaries.insert(code.code.len());

    assert!(!jumps.is_empty(), "test program should contain jumps");
    for (at, target) in jumps {
        assert!(
            boundaries.contains(&target),
            "jump at {} targets {} which is not an instruction boundary",
            at,
            target
        );
    }
}

// --- Functions ---

#[test]
fn function_declaration_stores_code_into_a_global() {
    let (code, globals) = compile_with_globals("func add(a, b) { return a + b; }");
    assert!(globals.exists("add"));

    let add = nested_fn(&code, "add");
    assert_eq!(add.arity, 2);
    assert_eq!(add.max_locals, 2);
    assert_eq!(add.local_names.get(&0).map(String::as_str), Some("a"));
    assert_eq!(add.local_names.get(&1).map(String::as_str), Some("b"));
    assert_eq!(add.code.last(), Some(&(OpCode::Return as u8)));
}

#[test]
fn function_epilogue_appends_nil_return() {
    let code = compile("func f() { 1; }");
    let f = nested_fn(&code, "f");
    let tail = &f.code[f.code.len() - 2..];
    assert_eq!(tail, &[OpCode::Nil as u8, OpCode::Return as u8]);
}

#[test]
fn explicit_trailing_return_gets_no_epilogue() {
    let code = compile("func f() { return 1; }");
    let f = nested_fn(&code, "f");
    // CONST 1, RETURN and nothing after
    assert_eq!(f.code, vec![0x01, 0, 0x1A]);
}

#[test]
fn shadowing_in_nested_blocks_uses_fresh_slots() {
    let code = compile("{ var x = 1; var y = 2; { var x = 3; } }");
    assert_eq!(code.max_locals, 3);
    assert_eq!(code.local_names.get(&0).map(String::as_str), Some("x"));
    assert_eq!(code.local_names.get(&1).map(String::as_str), Some("y"));
    assert_eq!(code.local_names.get(&2).map(String::as_str), Some("x"));
}

#[test]
fn call_emits_argc_operand() {
    let code = compile("func f(a) { return a; } f(1);");
    let call_at = code
        .code
        .windows(2)
        .position(|w| w[0] == OpCode::Call as u8)
        .expect("call site should be emitted");
    assert_eq!(code.code[call_at + 1], 1);
}

// --- Compile-time failures ---

#[test]
fn undefined_variable_is_a_compile_error() {
    assert_eq!(compile_err("missing;").kind, ErrorKind::UndefinedVariable);
}

#[test]
fn redeclaration_is_a_compile_error() {
    assert_eq!(compile_err("{ var x = 1; var x = 2; }").kind, ErrorKind::Redeclaration);
}

#[test]
fn too_many_locals_is_a_compile_error() {
    let decls: String = (0..300).map(|i| format!("var v{} = 0;", i)).collect();
    let source = format!("{{ {} }}", decls);
    assert_eq!(compile_err(&source).kind, ErrorKind::TooManyLocals);
}

#[test]
fn too_many_globals_rejects_without_growing_the_table() {
    let decls: String = (0..256).map(|i| format!("var g{} = 0;", i)).collect();
    let tokens = tokenize(&decls).expect("source should tokenize");
    let program = Parser::new(tokens).parse().expect("source should parse");
    let mut globals = Globals::new();
    Compiler::new(&mut globals).compile(&program).expect("256 globals should fit");
    assert_eq!(globals.len(), 256);

    let tokens = tokenize("var overflow = 1;").expect("source should tokenize");
    let program = Parser::new(tokens).parse().expect("source should parse");
    let err = Compiler::new(&mut globals)
        .compile(&program)
        .expect_err("the 257th global should be rejected");
    assert_eq!(err.kind, ErrorKind::TooManyGlobals);
    assert_eq!(globals.len(), 256, "a rejected define must not grow the table");

    // An existing name still compiles at the cap
    let tokens = tokenize("var g0 = 2;").expect("source should tokenize");
    let program = Parser::new(tokens).parse().expect("source should parse");
    Compiler::new(&mut globals).compile(&program).expect("existing names still resolve");
    assert_eq!(globals.len(), 256);
}

#[test]
fn unknown_operator_in_a_malformed_ast_is_rejected() {
    let program = vec![Stmt::Expr(Expr::Binary {
        left: Box::new(Expr::Number(1.0)),
        op: "%".into(),
        right: Box::new(Expr::Number(2.0)),
    })];
    let mut globals = Globals::new();
    let err = Compiler::new(&mut globals).compile(&program).expect_err("should fail");
    assert_eq!(err.kind, ErrorKind::UnknownOperator);

    let program = vec![Stmt::Expr(Expr::Unary {
        op: "-".into(),
        operand: Box::new(Expr::Number(1.0)),
    })];
    let mut globals = Globals::new();
    let err = Compiler::new(&mut globals).compile(&program).expect_err("should fail");
    assert_eq!(err.kind, ErrorKind::UnknownOperator);
}

// --- Globals table ---

#[test]
fn global_slots_are_append_only_and_stable() {
    let mut globals = Globals::new();
    let a = globals.define("a");
    let b = globals.define("b");
    assert_ne!(a, b);
    assert_eq!(globals.define("a"), a, "redefinition keeps the slot");
    assert_eq!(globals.index_of("b"), Some(b));
    assert!(globals.set(a, Value::Number(1.0)));
    assert!(!globals.set(99, Value::Nil));
}

// --- Disassembler ---

#[test]
fn disassembler_renders_main_and_nested_functions() {
    let (code, globals) = compile_with_globals(
        "func add(a, b) { return a + b; } var r = add(1, 2); if (r > 0) { r = 0; }",
    );
    let out = Disassembler::new(&globals).disassemble_all(&code);

    assert!(out.contains("== Disassembly of main =="));
    assert!(out.contains("== Disassembly of add =="));
    assert!(out.contains("HALT"));
    assert!(out.contains("CONST"));
    assert!(out.contains("JUMP_IF_FALSE"));
    assert!(out.contains("(add)"), "global operands should be named");
    assert!(out.contains("(a)"), "local operands should be named");
    assert!(out.contains("RETURN"));
}

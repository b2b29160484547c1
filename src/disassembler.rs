// File: src/disassembler.rs
//
// Human-readable dump of compiled code objects, for debugging.
// Renders one instruction per line with its byte offset, mnemonic,
// operand, and a resolved constant, local name, or global name where
// one applies. Nested function code objects are dumped after the unit
// that owns them.

use std::fmt::Write;

use crate::bytecode::{CodeObject, OpCode};
use crate::globals::Globals;
use crate::value::Value;

pub struct Disassembler<'a> {
    globals: &'a Globals,
}

impl<'a> Disassembler<'a> {
    pub fn new(globals: &'a Globals) -> Self {
        Self { globals }
    }

    /// Disassemble a code object and every code object reachable
    /// through its constant pool.
    pub fn disassemble_all(&self, co: &CodeObject) -> String {
        let mut out = String::new();
        self.walk(co, &mut out);
        out
    }

    fn walk(&self, co: &CodeObject, out: &mut String) {
        out.push_str(&self.disassemble(co));
        for constant in &co.constants {
            if let Value::Code(nested) = constant {
                self.walk(nested, out);
            }
        }
    }

    pub fn disassemble(&self, co: &CodeObject) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== Disassembly of {} ==", co.name);
        let mut offset = 0;
        while offset < co.code.len() {
            offset = self.instruction(co, offset, &mut out);
        }
        out
    }

    fn instruction(&self, co: &CodeObject, offset: usize, out: &mut String) -> usize {
        let byte = co.code[offset];
        let op = match OpCode::from_byte(byte) {
            Some(op) => op,
            None => {
                let _ = writeln!(out, "{:04} .byte 0x{:02x}", offset, byte);
                return offset + 1;
            }
        };

        let width = op.operand_width();
        if offset + 1 + width > co.code.len() {
            let _ = writeln!(out, "{:04} {:<22} <truncated>", offset, op.mnemonic());
            return co.code.len();
        }

        match op {
            OpCode::Const => {
                let index = co.code[offset + 1] as usize;
                let rendered = co
                    .constants
                    .get(index)
                    .map(|c| c.repr())
                    .unwrap_or_else(|| "<out of range>".to_string());
                let _ = writeln!(out, "{:04} {:<22} {:4} ; {}", offset, op.mnemonic(), index, rendered);
            }
            OpCode::GetLocal | OpCode::SetLocal => {
                let slot = co.code[offset + 1] as usize;
                let name = co.local_names.get(&slot).map(String::as_str).unwrap_or("<unknown>");
                let _ = writeln!(out, "{:04} {:<22} {:4} ({})", offset, op.mnemonic(), slot, name);
            }
            OpCode::GetGlobal | OpCode::SetGlobal => {
                let index = co.code[offset + 1] as usize;
                let name = self
                    .globals
                    .get(index)
                    .map(|var| var.name.as_str())
                    .unwrap_or("<unknown>");
                let _ = writeln!(out, "{:04} {:<22} {:4} ({})", offset, op.mnemonic(), index, name);
            }
            OpCode::Compare => {
                let kind = co.code[offset + 1];
                let _ = writeln!(
                    out,
                    "{:04} {:<22} {:4} ({})",
                    offset,
                    op.mnemonic(),
                    kind,
                    compare_symbol(kind)
                );
            }
            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfFalseOrPop
            | OpCode::JumpIfTrueOrPop => {
                let target = ((co.code[offset + 1] as u16) << 8) | co.code[offset + 2] as u16;
                let _ = writeln!(out, "{:04} {:<22} -> {}", offset, op.mnemonic(), target);
            }
            OpCode::Call => {
                let argc = co.code[offset + 1];
                let _ = writeln!(out, "{:04} {:<22} {:4}", offset, op.mnemonic(), argc);
            }
            _ => {
                let _ = writeln!(out, "{:04} {}", offset, op.mnemonic());
            }
        }

        offset + 1 + width
    }
}

fn compare_symbol(kind: u8) -> &'static str {
    match kind {
        0 => "<",
        1 => ">",
        2 => "==",
        3 => ">=",
        4 => "<=",
        5 => "!=",
        _ => "?",
    }
}

// File: src/compiler.rs
//
// Bytecode compiler for Mica.
// Lowers the AST into code objects: resolves names to local slots
// through a scope stack, deduplicates constants, back-patches forward
// jumps, and emits nested code objects for function declarations.

use std::rc::Rc;

use ahash::AHashMap;
use once_cell::sync::Lazy;

use crate::ast::{Expr, Stmt};
use crate::bytecode::{CodeObject, OpCode, CMP_EQ, CMP_GE, CMP_GT, CMP_LE, CMP_LT, CMP_NE};
use crate::errors::{ErrorKind, MicaError};
use crate::globals::Globals;
use crate::value::Value;

/// Constant pool entries per code object (8-bit operand).
pub const MAX_CONSTANTS: usize = 256;
/// Local slots per function (8-bit operand).
pub const MAX_LOCALS: usize = 256;
/// Global slots (8-bit operand).
pub const MAX_GLOBALS: usize = 256;

/// Comparison operator to COMPARE kind byte.
static COMPARE_OPS: Lazy<AHashMap<&'static str, u8>> = Lazy::new(|| {
    let mut ops = AHashMap::new();
    ops.insert("<", CMP_LT);
    ops.insert(">", CMP_GT);
    ops.insert("==", CMP_EQ);
    ops.insert(">=", CMP_GE);
    ops.insert("<=", CMP_LE);
    ops.insert("!=", CMP_NE);
    ops
});

/// Per-function emission state: the code object under construction and
/// the scope stack resolving names to dense local slots.
struct FunctionCtx {
    co: CodeObject,
    scopes: Vec<AHashMap<String, usize>>,
    local_count: usize,
    is_main: bool,
}

impl FunctionCtx {
    fn new(name: &str, arity: usize, is_main: bool) -> Self {
        Self {
            co: CodeObject::new(name, arity),
            scopes: vec![AHashMap::new()],
            local_count: 0,
            is_main,
        }
    }

    fn offset(&self) -> usize {
        self.co.code.len()
    }

    fn emit(&mut self, op: OpCode) {
        self.co.code.push(op as u8);
    }

    fn emit_byte(&mut self, byte: u8) {
        self.co.code.push(byte);
    }

    fn emit_u16(&mut self, value: u16) {
        self.co.code.push((value >> 8) as u8);
        self.co.code.push((value & 0xFF) as u8);
    }

    /// Emit a jump with a two-byte placeholder; returns the placeholder
    /// position for back-patching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op);
        let pos = self.co.code.len();
        self.emit_u16(0);
        pos
    }

    /// Patch a previously emitted placeholder to the current offset.
    fn patch_jump(&mut self, pos: usize) -> Result<(), MicaError> {
        let target = self.jump_target(self.co.code.len())?;
        self.co.code[pos] = (target >> 8) as u8;
        self.co.code[pos + 1] = (target & 0xFF) as u8;
        Ok(())
    }

    /// Emit a jump whose target is already known (loop back-edges).
    fn emit_jump_to(&mut self, op: OpCode, target: usize) -> Result<(), MicaError> {
        let target = self.jump_target(target)?;
        self.emit(op);
        self.emit_u16(target);
        Ok(())
    }

    fn jump_target(&self, target: usize) -> Result<u16, MicaError> {
        u16::try_from(target).map_err(|_| {
            MicaError::new(
                ErrorKind::MalformedAst,
                format!("code for '{}' exceeds the 16-bit jump range", self.co.name),
            )
        })
    }

    /// Intern a constant, reusing an equal entry when one exists.
    /// Code objects compare by identity, so they always append.
    fn add_constant(&mut self, value: Value) -> Result<u8, MicaError> {
        if let Some(index) = self.co.constants.iter().position(|c| c == &value) {
            return Ok(index as u8);
        }
        if self.co.constants.len() == MAX_CONSTANTS {
            return Err(MicaError::new(
                ErrorKind::TooManyConstants,
                format!("constant pool for '{}' exceeds {} entries", self.co.name, MAX_CONSTANTS),
            ));
        }
        self.co.constants.push(value);
        Ok((self.co.constants.len() - 1) as u8)
    }

    /// Allocate the next local slot for `name` in the innermost scope.
    /// Slots are dense and never reused, so a shadowing declaration in
    /// a nested block gets a fresh slot.
    fn declare_local(&mut self, name: &str) -> Result<u8, MicaError> {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => return Err(MicaError::new(ErrorKind::MalformedAst, "no open scope")),
        };
        if scope.contains_key(name) {
            return Err(MicaError::redeclaration(name));
        }
        if self.local_count == MAX_LOCALS {
            return Err(MicaError::new(
                ErrorKind::TooManyLocals,
                format!("function '{}' exceeds {} local slots", self.co.name, MAX_LOCALS),
            ));
        }
        let slot = self.local_count;
        scope.insert(name.to_string(), slot);
        self.co.local_names.insert(slot, name.to_string());
        self.local_count += 1;
        if self.local_count > self.co.max_locals {
            self.co.max_locals = self.local_count;
        }
        Ok(slot as u8)
    }

    /// Search the scope stack innermost-out for a local slot.
    fn resolve_local(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// True in the outermost scope of `main`, where `var` declares a
    /// global rather than a root-frame local.
    fn is_root_scope(&self) -> bool {
        self.is_main && self.scopes.len() == 1
    }

    fn finish(self) -> CodeObject {
        self.co
    }
}

/// Compiles a parsed program into the `main` code object plus any
/// nested function code objects reachable through its constant pool.
pub struct Compiler<'g> {
    globals: &'g mut Globals,
}

impl<'g> Compiler<'g> {
    pub fn new(globals: &'g mut Globals) -> Self {
        Self { globals }
    }

    pub fn compile(&mut self, program: &[Stmt]) -> Result<Rc<CodeObject>, MicaError> {
        let mut ctx = FunctionCtx::new("main", 0, true);
        for stmt in program {
            self.stmt(&mut ctx, stmt)?;
        }
        ctx.emit(OpCode::Halt);
        Ok(Rc::new(ctx.finish()))
    }

    fn stmt(&mut self, ctx: &mut FunctionCtx, stmt: &Stmt) -> Result<(), MicaError> {
        match stmt {
            Stmt::Expr(expr) => self.expr(ctx, expr),

            Stmt::VarDecl { name, value } => {
                self.expr(ctx, value)?;
                if ctx.is_root_scope() {
                    let index = self.define_global(name)?;
                    ctx.emit(OpCode::SetGlobal);
                    ctx.emit_byte(index);
                } else {
                    let slot = ctx.declare_local(name)?;
                    ctx.emit(OpCode::SetLocal);
                    ctx.emit_byte(slot);
                }
                Ok(())
            }

            Stmt::Assign { name, value } => {
                self.expr(ctx, value)?;
                self.store_variable(ctx, name)
            }

            Stmt::IndexAssign { array, index, value } => {
                self.expr(ctx, array)?;
                self.expr(ctx, index)?;
                self.expr(ctx, value)?;
                ctx.emit(OpCode::ArraySet);
                Ok(())
            }

            Stmt::If { condition, then_branch, else_branch } => {
                self.expr(ctx, condition)?;
                let else_jump = ctx.emit_jump(OpCode::JumpIfFalse);
                self.stmt(ctx, then_branch)?;
                let end_jump = ctx.emit_jump(OpCode::Jump);
                ctx.patch_jump(else_jump)?;
                match else_branch {
                    Some(else_branch) => self.stmt(ctx, else_branch)?,
                    // Without an else the false path yields nil
                    None => ctx.emit(OpCode::Nil),
                }
                ctx.patch_jump(end_jump)
            }

            Stmt::While { condition, body } => {
                let loop_start = ctx.offset();
                self.expr(ctx, condition)?;
                let exit_jump = ctx.emit_jump(OpCode::JumpIfFalse);
                self.stmt(ctx, body)?;
                ctx.emit_jump_to(OpCode::Jump, loop_start)?;
                ctx.patch_jump(exit_jump)
            }

            Stmt::For { init, condition, update, body } => {
                // The initialiser's variables are scoped to the loop
                ctx.scopes.push(AHashMap::new());
                if let Some(init) = init {
                    self.stmt(ctx, init)?;
                }
                let loop_start = ctx.offset();
                let exit_jump = match condition {
                    Some(condition) => {
                        self.expr(ctx, condition)?;
                        Some(ctx.emit_jump(OpCode::JumpIfFalse))
                    }
                    None => None,
                };
                self.stmt(ctx, body)?;
                if let Some(update) = update {
                    self.stmt(ctx, update)?;
                }
                ctx.emit_jump_to(OpCode::Jump, loop_start)?;
                if let Some(exit_jump) = exit_jump {
                    ctx.patch_jump(exit_jump)?;
                }
                ctx.scopes.pop();
                Ok(())
            }

            Stmt::Block(stmts) => {
                ctx.scopes.push(AHashMap::new());
                for stmt in stmts {
                    self.stmt(ctx, stmt)?;
                }
                ctx.scopes.pop();
                Ok(())
            }

            Stmt::FuncDef { name, params, body } => {
                // Define the global before compiling the body so the
                // function can resolve itself for recursion
                let global_index = self.define_global(name)?;
                let code = self.function(name, params, body)?;
                let const_index = ctx.add_constant(Value::Code(Rc::new(code)))?;
                ctx.emit(OpCode::Const);
                ctx.emit_byte(const_index);
                ctx.emit(OpCode::SetGlobal);
                ctx.emit_byte(global_index);
                Ok(())
            }

            Stmt::Return(expr) => {
                match expr {
                    Some(expr) => self.expr(ctx, expr)?,
                    None => ctx.emit(OpCode::Nil),
                }
                ctx.emit(OpCode::Return);
                Ok(())
            }
        }
    }

    fn function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
    ) -> Result<CodeObject, MicaError> {
        let mut ctx = FunctionCtx::new(name, params.len(), false);
        for param in params {
            ctx.declare_local(param)?;
        }
        for stmt in body {
            self.stmt(&mut ctx, stmt)?;
        }
        if !matches!(body.last(), Some(Stmt::Return(_))) {
            ctx.emit(OpCode::Nil);
            ctx.emit(OpCode::Return);
        }
        Ok(ctx.finish())
    }

    fn expr(&mut self, ctx: &mut FunctionCtx, expr: &Expr) -> Result<(), MicaError> {
        match expr {
            Expr::Number(n) => {
                let index = ctx.add_constant(Value::Number(*n))?;
                ctx.emit(OpCode::Const);
                ctx.emit_byte(index);
                Ok(())
            }

            Expr::Str(s) => {
                let index = ctx.add_constant(Value::string(s.clone()))?;
                ctx.emit(OpCode::Const);
                ctx.emit_byte(index);
                Ok(())
            }

            Expr::Bool(b) => {
                let index = ctx.add_constant(Value::Bool(*b))?;
                ctx.emit(OpCode::Const);
                ctx.emit_byte(index);
                Ok(())
            }

            Expr::Nil => {
                ctx.emit(OpCode::Nil);
                Ok(())
            }

            Expr::Identifier(name) => self.load_variable(ctx, name),

            Expr::Unary { op, operand } => {
                if op != "!" {
                    return Err(MicaError::unknown_operator(op));
                }
                self.expr(ctx, operand)?;
                ctx.emit(OpCode::LogicalNot);
                Ok(())
            }

            Expr::Binary { left, op, right } => match op.as_str() {
                // Short-circuit: the jump leaves the left value on the
                // stack as the result, the fall-through pops it
                "&&" => {
                    self.expr(ctx, left)?;
                    let end_jump = ctx.emit_jump(OpCode::JumpIfFalseOrPop);
                    self.expr(ctx, right)?;
                    ctx.patch_jump(end_jump)
                }
                "||" => {
                    self.expr(ctx, left)?;
                    let end_jump = ctx.emit_jump(OpCode::JumpIfTrueOrPop);
                    self.expr(ctx, right)?;
                    ctx.patch_jump(end_jump)
                }
                "+" | "-" | "*" | "/" => {
                    self.expr(ctx, left)?;
                    self.expr(ctx, right)?;
                    ctx.emit(match op.as_str() {
                        "+" => OpCode::Add,
                        "-" => OpCode::Sub,
                        "*" => OpCode::Mul,
                        _ => OpCode::Div,
                    });
                    Ok(())
                }
                op => match COMPARE_OPS.get(op) {
                    Some(&kind) => {
                        self.expr(ctx, left)?;
                        self.expr(ctx, right)?;
                        ctx.emit(OpCode::Compare);
                        ctx.emit_byte(kind);
                        Ok(())
                    }
                    None => Err(MicaError::unknown_operator(op)),
                },
            },

            Expr::Call { callee, args } => {
                self.load_variable(ctx, callee)?;
                if args.len() > u8::MAX as usize {
                    return Err(MicaError::new(
                        ErrorKind::MalformedAst,
                        format!("call to '{}' has more than 255 arguments", callee),
                    ));
                }
                for arg in args {
                    self.expr(ctx, arg)?;
                }
                ctx.emit(OpCode::Call);
                ctx.emit_byte(args.len() as u8);
                Ok(())
            }

            Expr::Index { array, index } => {
                self.expr(ctx, array)?;
                self.expr(ctx, index)?;
                ctx.emit(OpCode::ArrayGet);
                Ok(())
            }

            Expr::ArrayLiteral(elements) => {
                ctx.emit(OpCode::Array);
                for (i, element) in elements.iter().enumerate() {
                    // Duplicate the array handle so the literal stays on
                    // the stack after ARRAY_SET consumes one reference
                    ctx.emit(OpCode::Dup);
                    let index = ctx.add_constant(Value::Number(i as f64))?;
                    ctx.emit(OpCode::Const);
                    ctx.emit_byte(index);
                    self.expr(ctx, element)?;
                    ctx.emit(OpCode::ArraySet);
                }
                Ok(())
            }
        }
    }

    /// Push a variable: innermost local first, then globals.
    fn load_variable(&mut self, ctx: &mut FunctionCtx, name: &str) -> Result<(), MicaError> {
        if let Some(slot) = ctx.resolve_local(name) {
            ctx.emit(OpCode::GetLocal);
            ctx.emit_byte(slot as u8);
            return Ok(());
        }
        match self.globals.index_of(name) {
            Some(index) => {
                ctx.emit(OpCode::GetGlobal);
                ctx.emit_byte(index as u8);
                Ok(())
            }
            None => Err(MicaError::undefined_variable(name)),
        }
    }

    /// Store into a variable: innermost local first, then globals.
    fn store_variable(&mut self, ctx: &mut FunctionCtx, name: &str) -> Result<(), MicaError> {
        if let Some(slot) = ctx.resolve_local(name) {
            ctx.emit(OpCode::SetLocal);
            ctx.emit_byte(slot as u8);
            return Ok(());
        }
        match self.globals.index_of(name) {
            Some(index) => {
                ctx.emit(OpCode::SetGlobal);
                ctx.emit_byte(index as u8);
                Ok(())
            }
            None => Err(MicaError::undefined_variable(name)),
        }
    }

    fn define_global(&mut self, name: &str) -> Result<u8, MicaError> {
        // A rejected name must leave the table untouched
        if self.globals.index_of(name).is_none() && self.globals.len() >= MAX_GLOBALS {
            return Err(MicaError::new(
                ErrorKind::TooManyGlobals,
                format!("global table exceeds {} slots", MAX_GLOBALS),
            ));
        }
        Ok(self.globals.define(name) as u8)
    }
}

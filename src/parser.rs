// File: src/parser.rs
//
// Recursive-descent parser for Mica.
// Produces the AST consumed by the bytecode compiler. An `else` binds
// to the nearest unmatched `if`, and any single statement is accepted
// where a block is allowed.

use crate::ast::{Expr, Stmt};
use crate::errors::MicaError;
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        self.pos += 1;
        kind
    }

    fn error_here(&self, message: impl Into<String>) -> MicaError {
        let (line, column) = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0));
        MicaError::parse(message, line, column)
    }

    fn check_punct(&self, c: char) -> bool {
        matches!(self.peek(), TokenKind::Punct(p) if *p == c)
    }

    fn check_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if k == word)
    }

    fn check_operator(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Operator(o) if o == op)
    }

    /// Consume and return the current operator if it is one of `ops`.
    fn match_operator(&mut self, ops: &[&str]) -> Option<String> {
        if let TokenKind::Operator(op) = self.peek() {
            if ops.contains(&op.as_str()) {
                let op = op.clone();
                self.advance();
                return Some(op);
            }
        }
        None
    }

    fn expect_punct(&mut self, c: char) -> Result<(), MicaError> {
        if self.check_punct(c) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", c)))
        }
    }

    fn expect_operator(&mut self, op: &str) -> Result<(), MicaError> {
        if self.check_operator(op) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", op)))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, MicaError> {
        match self.advance() {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(self.error_here(format!("expected identifier, found {:?}", other))),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Stmt>, MicaError> {
        let mut stmts = Vec::new();
        while !matches!(self.peek(), TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, MicaError> {
        match self.peek() {
            TokenKind::Keyword(k) if k == "var" => {
                let stmt = self.parse_var_decl()?;
                self.expect_punct(';')?;
                Ok(stmt)
            }
            TokenKind::Keyword(k) if k == "func" => self.parse_func(),
            TokenKind::Keyword(k) if k == "return" => {
                self.advance();
                let expr = if self.check_punct(';') {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_punct(';')?;
                Ok(Stmt::Return(expr))
            }
            TokenKind::Keyword(k) if k == "if" => self.parse_if(),
            TokenKind::Keyword(k) if k == "while" => self.parse_while(),
            TokenKind::Keyword(k) if k == "for" => self.parse_for(),
            TokenKind::Punct('{') => Ok(Stmt::Block(self.parse_block()?)),
            _ => {
                let stmt = self.parse_assign_or_expr()?;
                self.expect_punct(';')?;
                Ok(stmt)
            }
        }
    }

    /// `var name = expr`, without the trailing semicolon so the for
    /// initialiser can reuse it.
    fn parse_var_decl(&mut self) -> Result<Stmt, MicaError> {
        self.advance(); // var
        let name = self.expect_identifier()?;
        self.expect_operator("=")?;
        let value = self.parse_expr()?;
        Ok(Stmt::VarDecl { name, value })
    }

    /// An expression, possibly promoted to an assignment when followed
    /// by `=`. No trailing semicolon is consumed.
    fn parse_assign_or_expr(&mut self) -> Result<Stmt, MicaError> {
        let expr = self.parse_expr()?;
        if self.check_operator("=") {
            self.advance();
            let value = self.parse_expr()?;
            match expr {
                Expr::Identifier(name) => Ok(Stmt::Assign { name, value }),
                Expr::Index { array, index } => {
                    Ok(Stmt::IndexAssign { array: *array, index: *index, value })
                }
                _ => Err(self.error_here("invalid assignment target")),
            }
        } else {
            Ok(Stmt::Expr(expr))
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, MicaError> {
        self.expect_punct('{')?;
        let mut stmts = Vec::new();
        while !self.check_punct('}') {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.error_here("unexpected end of input, expected '}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.advance(); // }
        Ok(stmts)
    }

    fn parse_func(&mut self) -> Result<Stmt, MicaError> {
        self.advance(); // func
        let name = self.expect_identifier()?;
        self.expect_punct('(')?;
        let mut params = Vec::new();
        if !self.check_punct(')') {
            loop {
                params.push(self.expect_identifier()?);
                if self.check_punct(',') {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_punct(')')?;
        let body = self.parse_block()?;
        Ok(Stmt::FuncDef { name, params, body })
    }

    fn parse_if(&mut self) -> Result<Stmt, MicaError> {
        self.advance(); // if
        self.expect_punct('(')?;
        let condition = self.parse_expr()?;
        self.expect_punct(')')?;
        let then_branch = Box::new(self.parse_stmt()?);
        // else binds to the nearest unmatched if
        let else_branch = if self.check_keyword("else") {
            self.advance();
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> Result<Stmt, MicaError> {
        self.advance(); // while
        self.expect_punct('(')?;
        let condition = self.parse_expr()?;
        self.expect_punct(')')?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, MicaError> {
        self.advance(); // for
        self.expect_punct('(')?;

        let init = if self.check_punct(';') {
            None
        } else if self.check_keyword("var") {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            Some(Box::new(self.parse_assign_or_expr()?))
        };
        self.expect_punct(';')?;

        let condition = if self.check_punct(';') {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(';')?;

        let update = if self.check_punct(')') {
            None
        } else {
            Some(Box::new(self.parse_assign_or_expr()?))
        };
        self.expect_punct(')')?;

        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For { init, condition, update, body })
    }

    // --- Expressions, lowest to highest precedence ---

    fn parse_expr(&mut self) -> Result<Expr, MicaError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_and()?;
        while self.check_operator("||") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary { left: Box::new(left), op: "||".into(), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_equality()?;
        while self.check_operator("&&") {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary { left: Box::new(left), op: "&&".into(), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_comparison()?;
        while let Some(op) = self.match_operator(&["==", "!="]) {
            let right = self.parse_comparison()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.match_operator(&["<", "<=", ">", ">="]) {
            let right = self.parse_term()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_factor()?;
        while let Some(op) = self.match_operator(&["+", "-"]) {
            let right = self.parse_factor()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, MicaError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.match_operator(&["*", "/"]) {
            let right = self.parse_unary()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, MicaError> {
        if self.check_operator("!") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: "!".into(), operand: Box::new(operand) });
        }
        self.parse_postfix()
    }

    /// Indexing binds tighter than any binary operator: `a[i][j]`.
    fn parse_postfix(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.parse_primary()?;
        while self.check_punct('[') {
            self.advance();
            let index = self.parse_expr()?;
            self.expect_punct(']')?;
            expr = Expr::Index { array: Box::new(expr), index: Box::new(index) };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, MicaError> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Keyword(k) if k == "true" => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::Keyword(k) if k == "false" => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Keyword(k) if k == "nil" => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::Identifier(name) => {
                if matches!(self.peek_ahead(1), TokenKind::Punct('(')) {
                    self.advance(); // name
                    self.advance(); // (
                    let mut args = Vec::new();
                    if !self.check_punct(')') {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check_punct(',') {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect_punct(')')?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    self.advance();
                    Ok(Expr::Identifier(name))
                }
            }
            TokenKind::Punct('(') => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_punct(')')?;
                Ok(expr)
            }
            TokenKind::Punct('[') => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check_punct(']') {
                    loop {
                        elements.push(self.parse_expr()?);
                        if self.check_punct(',') {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_punct(']')?;
                Ok(Expr::ArrayLiteral(elements))
            }
            other => Err(self.error_here(format!("unexpected token {:?}", other))),
        }
    }
}

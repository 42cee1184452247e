//! Recursive-descent / Pratt-precedence-climbing parser.

use crate::ast::*;
use crate::pos::{FileSet, Pos};
use crate::scanner::{Scanned, Scanner};
use crate::token::{Token, LOWEST};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

const MAX_ERROR_LINES: usize = 10;

pub struct Parser<'a> {
    scanner: Scanner<'a>,
    files: &'a mut FileSet,
    cur: Scanned,
    peek: Scanned,
    errors: Vec<ParseError>,
    error_lines: Vec<u32>,
}

impl<'a> Parser<'a> {
    pub fn new(files: &'a mut FileSet, filename: &str, src: &'a str) -> Self {
        let mut scanner = Scanner::new(files, filename, src);
        let cur = scanner.next(files);
        let peek = scanner.next(files);
        let mut p = Parser {
            scanner,
            files,
            cur,
            peek,
            errors: Vec::new(),
            error_lines: Vec::new(),
        };
        for e in p.scanner.errors().to_vec() {
            p.record_error(e.pos, e.message);
        }
        p
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn record_error(&mut self, pos: Pos, message: impl Into<String>) {
        let loc = self.files.resolve(pos);
        if self.error_lines.contains(&loc.line) {
            return;
        }
        if self.error_lines.len() >= MAX_ERROR_LINES {
            return;
        }
        self.error_lines.push(loc.line);
        self.errors.push(ParseError {
            pos,
            message: message.into(),
        });
    }

    fn should_bail(&self) -> bool {
        self.error_lines.len() >= MAX_ERROR_LINES
    }

    fn bump(&mut self) {
        std::mem::swap(&mut self.cur, &mut self.peek);
        self.peek = self.scanner.next(self.files);
        for e in self.scanner.errors().to_vec() {
            if !self.errors.iter().any(|p| p.pos == e.pos) {
                self.record_error(e.pos, e.message);
            }
        }
    }

    fn expect(&mut self, tok: Token) -> Pos {
        let pos = self.cur.pos;
        if self.cur.token == tok {
            self.bump();
        } else {
            self.record_error(
                pos,
                format!("expected {} but found {}", tok.display_name(), self.cur.token.display_name()),
            );
        }
        pos
    }

    fn at(&self, tok: Token) -> bool {
        self.cur.token == tok
    }

    /// Parses an entire source file as a sequence of statements.
    pub fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !self.at(Token::Eof) {
            if self.should_bail() {
                break;
            }
            stmts.push(self.parse_stmt());
        }
        Program { stmts }
    }

    fn skip_semicolons(&mut self) {
        while self.at(Token::Semicolon) {
            self.bump();
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        let stmt = match self.cur.token {
            Token::LBrace => Stmt::Block(self.parse_block()),
            Token::If => Stmt::If(self.parse_if()),
            Token::For => Stmt::For(self.parse_for()),
            Token::Let => Stmt::Let(self.parse_let()),
            Token::Return => Stmt::Return(self.parse_return()),
            _ => self.parse_expr_or_assign_stmt(),
        };
        self.skip_semicolons();
        stmt
    }

    fn parse_block(&mut self) -> Block {
        self.expect(Token::LBrace);
        let mut stmts = Vec::new();
        while !self.at(Token::RBrace) && !self.at(Token::Eof) {
            if self.should_bail() {
                break;
            }
            stmts.push(self.parse_stmt());
        }
        self.expect(Token::RBrace);
        Block { stmts }
    }

    fn parse_if(&mut self) -> IfStmt {
        let pos = self.cur.pos;
        self.bump(); // if
        let cond = self.parse_expr(LOWEST);
        let then_branch = self.parse_block();
        let else_branch = if self.at(Token::Else) {
            self.bump();
            if self.at(Token::If) {
                Some(Box::new(Stmt::If(self.parse_if())))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block())))
            }
        } else {
            None
        };
        IfStmt {
            pos,
            cond,
            then_branch,
            else_branch,
        }
    }

    fn parse_for(&mut self) -> ForStmt {
        let pos = self.cur.pos;
        self.bump(); // for
        self.expect(Token::LParen);
        let init = if self.at(Token::Semicolon) {
            None
        } else if self.at(Token::Let) {
            Some(Box::new(Stmt::Let(self.parse_let())))
        } else {
            Some(Box::new(self.parse_expr_or_assign_stmt()))
        };
        self.expect(Token::Semicolon);
        let cond = if self.at(Token::Semicolon) { None } else { Some(self.parse_expr(LOWEST)) };
        self.expect(Token::Semicolon);
        let post = if self.at(Token::RParen) { None } else { Some(Box::new(self.parse_expr_or_assign_stmt())) };
        self.expect(Token::RParen);
        let body = self.parse_block();
        ForStmt {
            pos,
            init,
            cond,
            post,
            body,
        }
    }

    fn parse_let(&mut self) -> LetStmt {
        let pos = self.cur.pos;
        self.bump(); // let
        let mut bindings = Vec::new();
        loop {
            let name_pos = self.cur.pos;
            let name = self.parse_ident_name();
            let value = if self.at(Token::Assign) {
                self.bump();
                self.parse_expr(LOWEST)
            } else {
                Expr::Null(name_pos)
            };
            bindings.push(LetBinding { name, value });
            if self.at(Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        LetStmt { pos, bindings }
    }

    fn parse_return(&mut self) -> ReturnStmt {
        let pos = self.cur.pos;
        self.bump(); // return
        let value = if self.at(Token::Semicolon) || self.at(Token::RBrace) || self.at(Token::Eof) {
            None
        } else {
            Some(self.parse_expr(LOWEST))
        };
        ReturnStmt { pos, value }
    }

    fn parse_ident_name(&mut self) -> String {
        if self.at(Token::Ident) {
            let name = self.cur.literal.clone();
            self.bump();
            name
        } else {
            self.record_error(self.cur.pos, format!("expected identifier but found {}", self.cur.token.display_name()));
            String::new()
        }
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Stmt {
        let pos = self.cur.pos;
        let expr = self.parse_expr(LOWEST);
        if self.at(Token::Assign) {
            self.bump();
            let value = self.parse_expr(LOWEST);
            match to_assign_target(expr) {
                Some(target) => Stmt::Assign(AssignStmt { pos, target, value }),
                None => {
                    self.record_error(pos, "invalid assignment target");
                    Stmt::Bad(pos)
                }
            }
        } else {
            Stmt::Expr(expr)
        }
    }

    // --- Pratt expression parsing -----------------------------------

    fn parse_expr(&mut self, min_prec: u8) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let tok = self.cur.token;
            let prec = tok.precedence();
            if prec == LOWEST || prec < min_prec {
                break;
            }
            let Some(op) = BinaryOp::from_token(tok) else { break };
            let pos = self.cur.pos;
            self.bump();
            if op == BinaryOp::Pipe {
                // `lhs | f` lowers to `f(lhs)`.
                let callee = self.parse_expr(prec + 1);
                lhs = Expr::Call(CallExpr {
                    pos,
                    callee: Box::new(callee),
                    args: vec![lhs],
                });
                continue;
            }
            let rhs = self.parse_expr(prec + 1);
            lhs = Expr::Binary(BinaryExpr {
                pos,
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        match self.cur.token {
            Token::Minus => {
                let pos = self.cur.pos;
                self.bump();
                let operand = self.parse_unary();
                Expr::Unary(UnaryExpr {
                    pos,
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            Token::Bang => {
                let pos = self.cur.pos;
                self.bump();
                let operand = self.parse_unary();
                Expr::Unary(UnaryExpr {
                    pos,
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.cur.token {
                Token::Dot => {
                    let pos = self.cur.pos;
                    self.bump();
                    let name = self.parse_ident_name();
                    expr = Expr::Selector(SelectorExpr {
                        pos,
                        target: Box::new(expr),
                        name,
                    });
                }
                Token::LBracket => {
                    let pos = self.cur.pos;
                    self.bump();
                    let index = self.parse_expr(LOWEST);
                    self.expect(Token::RBracket);
                    expr = Expr::Index(IndexExpr {
                        pos,
                        target: Box::new(expr),
                        index: Box::new(index),
                    });
                }
                Token::LParen => {
                    let pos = self.cur.pos;
                    self.bump();
                    let args = self.parse_call_args();
                    self.expect(Token::RParen);
                    expr = Expr::Call(CallExpr {
                        pos,
                        callee: Box::new(expr),
                        args,
                    });
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if self.at(Token::RParen) {
            return args;
        }
        loop {
            args.push(self.parse_expr(LOWEST));
            if self.at(Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let pos = self.cur.pos;
        match self.cur.token {
            Token::Ident => {
                let name = self.cur.literal.clone();
                self.bump();
                Expr::Ident(IdentExpr { pos, name })
            }
            Token::Int => {
                let lit = self.cur.literal.clone();
                self.bump();
                let value = parse_int_literal(&lit).unwrap_or(0);
                Expr::Int(IntLit { pos, value })
            }
            Token::Float => {
                let lit = self.cur.literal.clone();
                self.bump();
                let value = lit.parse::<f64>().unwrap_or(0.0);
                Expr::Float(FloatLit { pos, value })
            }
            Token::String => {
                let value = self.cur.literal.clone();
                self.bump();
                Expr::Str(StrLit { pos, value })
            }
            Token::True => {
                self.bump();
                Expr::Bool(BoolLit { pos, value: true })
            }
            Token::False => {
                self.bump();
                Expr::Bool(BoolLit { pos, value: false })
            }
            Token::Null => {
                self.bump();
                Expr::Null(pos)
            }
            Token::LParen => {
                self.bump();
                let inner = self.parse_expr(LOWEST);
                self.expect(Token::RParen);
                Expr::Paren(Box::new(inner))
            }
            Token::LBracket => self.parse_array_lit(),
            Token::LBrace => self.parse_map_lit(),
            Token::Function => self.parse_function_lit(),
            Token::Let => {
                self.bump();
                let name = self.parse_ident_name();
                self.expect(Token::Assign);
                let value = self.parse_expr(LOWEST);
                Expr::VarDecl(VarDeclExpr {
                    pos,
                    name,
                    value: Box::new(value),
                })
            }
            _ => {
                self.record_error(pos, format!("unexpected token {}", self.cur.token.display_name()));
                self.bump();
                Expr::Bad(pos)
            }
        }
    }

    fn parse_array_lit(&mut self) -> Expr {
        let pos = self.cur.pos;
        self.bump(); // [
        let mut elems = Vec::new();
        while !self.at(Token::RBracket) && !self.at(Token::Eof) {
            let spread = if self.at(Token::DotDotDot) {
                self.bump();
                true
            } else {
                false
            };
            let value = self.parse_expr(LOWEST);
            elems.push(ArrayElem { value, spread });
            if self.at(Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Token::RBracket);
        Expr::Array(ArrayLit { pos, elems })
    }

    fn parse_map_lit(&mut self) -> Expr {
        let pos = self.cur.pos;
        self.bump(); // {
        let mut entries = Vec::new();
        while !self.at(Token::RBrace) && !self.at(Token::Eof) {
            let spread = if self.at(Token::DotDotDot) {
                self.bump();
                true
            } else {
                false
            };
            if spread {
                let value = self.parse_expr(LOWEST);
                entries.push(MapEntry {
                    key: MapKey::Expr(Expr::Null(pos)),
                    value,
                    spread: true,
                });
            } else if self.at(Token::LBracket) {
                self.bump();
                let key_expr = self.parse_expr(LOWEST);
                self.expect(Token::RBracket);
                self.expect(Token::Colon);
                let value = self.parse_expr(LOWEST);
                entries.push(MapEntry {
                    key: MapKey::Expr(key_expr),
                    value,
                    spread: false,
                });
            } else if self.at(Token::Ident) || self.at(Token::String) {
                let is_string = self.at(Token::String);
                let name = self.cur.literal.clone();
                self.bump();
                self.expect(Token::Colon);
                let value = self.parse_expr(LOWEST);
                let key = if is_string {
                    MapKey::Expr(Expr::Str(StrLit { pos, value: name }))
                } else {
                    MapKey::Ident(name)
                };
                entries.push(MapEntry { key, value, spread: false });
            } else {
                self.record_error(self.cur.pos, format!("unexpected token {} in map literal", self.cur.token.display_name()));
                self.bump();
            }
            if self.at(Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Token::RBrace);
        Expr::Map(MapLit { pos, entries })
    }

    fn parse_function_lit(&mut self) -> Expr {
        let pos = self.cur.pos;
        self.bump(); // function
        let name = if self.at(Token::Ident) {
            let n = self.cur.literal.clone();
            self.bump();
            Some(n)
        } else {
            None
        };
        self.expect(Token::LParen);
        let mut params = Vec::new();
        while !self.at(Token::RParen) && !self.at(Token::Eof) {
            let p_pos = self.cur.pos;
            let p_name = self.parse_ident_name();
            params.push(IdentExpr { pos: p_pos, name: p_name });
            if self.at(Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Token::RParen);
        let body = if self.at(Token::FatArrow) {
            self.bump();
            let expr = self.parse_expr(LOWEST);
            Block {
                stmts: vec![Stmt::Return(ReturnStmt { pos, value: Some(expr) })],
            }
        } else {
            self.parse_block()
        };
        Expr::Function(FunctionLit {
            pos,
            name,
            params,
            body,
        })
    }
}

fn to_assign_target(expr: Expr) -> Option<AssignTarget> {
    match expr {
        Expr::Ident(i) => Some(AssignTarget::Ident(i)),
        Expr::Selector(s) => Some(AssignTarget::Selector(s)),
        Expr::Index(i) => Some(AssignTarget::Index(i)),
        _ => None,
    }
}

fn parse_int_literal(lit: &str) -> Option<i64> {
    if let Some(hex) = lit.strip_prefix("0x").or_else(|| lit.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    // Bare leading zero: Go/C-style octal, e.g. `0755`. A lone "0" falls
    // through to the decimal parse below (radix-8 parse of "0" is fine
    // either way, but this keeps the intent obvious).
    if lit.len() > 1 && lit.starts_with('0') {
        return i64::from_str_radix(&lit[1..], 8).ok();
    }
    lit.parse::<i64>().ok()
}

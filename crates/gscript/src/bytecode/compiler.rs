//! Single-pass AST-to-bytecode compiler.
//!
//! The compiler walks the AST exactly once, emitting instructions as it
//! goes and resolving every name reference against the live
//! [`ScopeStack`] at the moment it is seen. The only thing resembling a
//! second pass is the small per-function rewrite in
//! [`Compiler::close_function`], which fires the instant a function's
//! body is fully compiled and only touches that function's own
//! instruction range — not a separate whole-program pass.

use std::rc::{Rc, Weak};

use crate::ast::*;
use crate::bytecode::builder::CodeBuilder;
use crate::bytecode::code::Program;
use crate::bytecode::op::Opcode;
use crate::bytecode::scope::{Resolved, ScopeStack};
use crate::pos::{FileSet, Pos};
use crate::value::{CompiledFunction, Function, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub pos: Pos,
    pub message: String,
}

/// Tracks, for each compiled function template, which constant-pool
/// slot it lives in and whether its body turned out to need a stash, so
/// `MakeFunction` knows whether to capture the enclosing stash at
/// closure-creation time.
struct PendingFunction {
    const_idx: u32,
    arity: usize,
}

pub struct Compiler<'a> {
    builder: CodeBuilder,
    scopes: ScopeStack,
    files: &'a FileSet,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    pub fn new(files: &'a FileSet) -> Self {
        Compiler {
            builder: CodeBuilder::new(),
            scopes: ScopeStack::default(),
            files,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.errors.push(CompileError {
            pos,
            message: message.into(),
        });
    }

    /// Compiles a whole program into a shared, self-referential
    /// `Rc<Program>` (see `CompiledFunction::program` for why function
    /// values only hold a `Weak` back-pointer to it).
    pub fn compile(mut self, program: &AstProgram) -> Result<Rc<Program>, Vec<CompileError>> {
        self.scopes.push(0);
        match program.stmts.split_last() {
            Some((last, init)) => {
                for stmt in init {
                    self.compile_stmt(stmt);
                }
                self.compile_tail_stmt(last);
            }
            None => {
                let idx = self.builder.intern_const(Value::Null);
                self.builder.emit(Opcode::LoadConst(idx));
            }
        }
        self.builder.emit(Opcode::Halt);
        let top = self.scopes.pop();
        self.rewrite_range(top.range.0, self.builder.here(), top.needs_stash);

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let (instructions, consts, names) = self.builder.into_parts();
        Ok(Rc::new(Program {
            instructions,
            consts,
            names,
            frame_size: top.frame_size(),
        }))
    }

    // --- statements ---------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                self.compile_expr(e);
                self.builder.emit(Opcode::Pop);
            }
            Stmt::Block(b) => {
                for s in &b.stmts {
                    self.compile_stmt(s);
                }
            }
            Stmt::If(s) => self.compile_if(s),
            Stmt::For(s) => self.compile_for(s),
            Stmt::Let(s) => self.compile_let(s),
            Stmt::Assign(s) => self.compile_assign(s),
            Stmt::Return(s) => self.compile_return(s),
            Stmt::Bad(_) => {}
        }
    }

    /// Compiles the program's final top-level statement so its value
    /// survives to `Halt` instead of being discarded by the `Pop` every
    /// other expression statement emits — a script's result is simply
    /// the value of its last expression. Recurses into a trailing block
    /// so `{ ...; expr }` at the top level still yields `expr`.
    fn compile_tail_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.compile_expr(e),
            Stmt::Block(b) => match b.stmts.split_last() {
                Some((last, init)) => {
                    for s in init {
                        self.compile_stmt(s);
                    }
                    self.compile_tail_stmt(last);
                }
                None => {
                    let idx = self.builder.intern_const(Value::Null);
                    self.builder.emit(Opcode::LoadConst(idx));
                }
            },
            _ => {
                self.compile_stmt(stmt);
                let idx = self.builder.intern_const(Value::Null);
                self.builder.emit(Opcode::LoadConst(idx));
            }
        }
    }

    fn compile_if(&mut self, s: &IfStmt) {
        self.compile_expr(&s.cond);
        let else_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        for stmt in &s.then_branch.stmts {
            self.compile_stmt(stmt);
        }
        match &s.else_branch {
            Some(else_stmt) => {
                let end_jump = self.builder.emit_jump(Opcode::Jump);
                self.builder.patch_jump_here(else_jump);
                self.compile_stmt(else_stmt);
                self.builder.patch_jump_here(end_jump);
            }
            None => {
                self.builder.patch_jump_here(else_jump);
            }
        }
    }

    fn compile_for(&mut self, s: &ForStmt) {
        if let Some(init) = &s.init {
            self.compile_stmt(init);
        }
        let cond_pos = self.builder.here();
        let exit_jump = s.cond.as_ref().map(|cond| {
            self.compile_expr(cond);
            self.builder.emit_jump(Opcode::JumpIfFalse)
        });
        for stmt in &s.body.stmts {
            self.compile_stmt(stmt);
        }
        if let Some(post) = &s.post {
            self.compile_stmt(post);
        }
        self.builder.emit(Opcode::Jump(cond_pos));
        if let Some(patch) = exit_jump {
            self.builder.patch_jump_here(patch);
        }
    }

    fn compile_let(&mut self, s: &LetStmt) {
        for binding in &s.bindings {
            self.compile_expr(&binding.value);
            let slot = self.scopes.declare(&binding.name);
            self.builder.emit(Opcode::StoreStash(0, slot));
        }
    }

    fn compile_assign(&mut self, s: &AssignStmt) {
        match &s.target {
            AssignTarget::Ident(id) => {
                self.compile_expr(&s.value);
                self.store_name(&id.name, id.pos);
            }
            AssignTarget::Selector(sel) => {
                self.compile_expr(&sel.target);
                self.compile_expr(&s.value);
                let name_idx = self.builder.intern_name(&sel.name);
                self.builder.emit(Opcode::SetAttr(name_idx));
            }
            AssignTarget::Index(idx) => {
                self.compile_expr(&idx.target);
                self.compile_expr(&idx.index);
                self.compile_expr(&s.value);
                self.builder.emit(Opcode::SetIndex);
            }
        }
    }

    fn compile_return(&mut self, s: &ReturnStmt) {
        match &s.value {
            Some(e) => self.compile_expr(e),
            None => {
                let idx = self.builder.intern_const(Value::Null);
                self.builder.emit(Opcode::LoadConst(idx));
            }
        }
        self.builder.emit(Opcode::Return);
    }

    fn store_name(&mut self, name: &str, pos: Pos) {
        match self.scopes.resolve(name) {
            Resolved::Found { level, slot } => {
                self.builder.emit(Opcode::StoreStash(level, slot));
            }
            Resolved::Global => {
                self.error(pos, format!("cannot assign to undeclared name '{name}'"));
            }
        }
    }

    // --- expressions ----------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(id) => self.compile_ident(id),
            Expr::Int(lit) => {
                let idx = self.builder.intern_const(Value::Int(lit.value));
                self.builder.emit(Opcode::LoadConst(idx));
            }
            Expr::Float(lit) => {
                let idx = self.builder.intern_const(Value::Float(lit.value));
                self.builder.emit(Opcode::LoadConst(idx));
            }
            Expr::Str(lit) => {
                let idx = self.builder.intern_const(Value::string(lit.value.as_str()));
                self.builder.emit(Opcode::LoadConst(idx));
            }
            Expr::Bool(lit) => {
                let idx = self.builder.intern_const(Value::Bool(lit.value));
                self.builder.emit(Opcode::LoadConst(idx));
            }
            Expr::Null(_) => {
                let idx = self.builder.intern_const(Value::Null);
                self.builder.emit(Opcode::LoadConst(idx));
            }
            Expr::Array(lit) => self.compile_array(lit),
            Expr::Map(lit) => self.compile_map(lit),
            Expr::Function(lit) => self.compile_function(lit),
            Expr::Unary(u) => self.compile_unary(u),
            Expr::Binary(b) => self.compile_binary(b),
            Expr::Paren(inner) => self.compile_expr(inner),
            Expr::Selector(sel) => {
                self.compile_expr(&sel.target);
                let name_idx = self.builder.intern_name(&sel.name);
                self.builder.emit(Opcode::GetAttr(name_idx));
            }
            Expr::Index(idx) => {
                self.compile_expr(&idx.target);
                self.compile_expr(&idx.index);
                self.builder.emit(Opcode::GetIndex);
            }
            Expr::Call(call) => self.compile_call(call),
            Expr::VarDecl(decl) => {
                self.compile_expr(&decl.value);
                let slot = self.scopes.declare(&decl.name);
                self.builder.emit(Opcode::Dup);
                self.builder.emit(Opcode::StoreStash(0, slot));
            }
            Expr::Bad(_) => {
                let idx = self.builder.intern_const(Value::Null);
                self.builder.emit(Opcode::LoadConst(idx));
            }
        }
    }

    fn compile_ident(&mut self, id: &IdentExpr) {
        match self.scopes.resolve(&id.name) {
            Resolved::Found { level, slot } => {
                self.builder.emit(Opcode::LoadStash(level, slot));
            }
            Resolved::Global => {
                let idx = self.builder.intern_name(&id.name);
                self.builder.emit(Opcode::LoadGlobal(idx));
            }
        }
    }

    fn compile_array(&mut self, lit: &ArrayLit) {
        self.builder.emit(Opcode::NewArray);
        for elem in &lit.elems {
            self.compile_expr(&elem.value);
            if elem.spread {
                self.builder.emit(Opcode::ArrayExtend);
            } else {
                self.builder.emit(Opcode::ArrayPush);
            }
        }
    }

    fn compile_map(&mut self, lit: &MapLit) {
        self.builder.emit(Opcode::NewMap);
        for entry in &lit.entries {
            if entry.spread {
                self.compile_expr(&entry.value);
                self.builder.emit(Opcode::MapExtend);
                continue;
            }
            match &entry.key {
                MapKey::Ident(name) => {
                    let idx = self.builder.intern_const(Value::string(name.as_str()));
                    self.builder.emit(Opcode::LoadConst(idx));
                }
                MapKey::Expr(e) => self.compile_expr(e),
            }
            self.compile_expr(&entry.value);
            self.builder.emit(Opcode::MapInsert);
        }
    }

    fn compile_unary(&mut self, u: &UnaryExpr) {
        self.compile_expr(&u.operand);
        self.builder.emit(match u.op {
            UnaryOp::Neg => Opcode::Neg,
            UnaryOp::Not => Opcode::Not,
        });
    }

    fn compile_binary(&mut self, b: &BinaryExpr) {
        // Short-circuit operators must not evaluate their right-hand
        // side eagerly, so they get their own control flow instead of a
        // plain binary opcode.
        match b.op {
            BinaryOp::And => {
                self.compile_expr(&b.lhs);
                self.builder.emit(Opcode::Dup);
                let short_circuit = self.builder.emit_jump(Opcode::JumpIfFalse);
                self.builder.emit(Opcode::Pop);
                self.compile_expr(&b.rhs);
                self.builder.patch_jump_here(short_circuit);
                return;
            }
            BinaryOp::Or => {
                self.compile_expr(&b.lhs);
                self.builder.emit(Opcode::Dup);
                let short_circuit = self.builder.emit_jump(Opcode::JumpIfTrue);
                self.builder.emit(Opcode::Pop);
                self.compile_expr(&b.rhs);
                self.builder.patch_jump_here(short_circuit);
                return;
            }
            _ => {}
        }

        self.compile_expr(&b.lhs);
        self.compile_expr(&b.rhs);
        self.builder.emit(match b.op {
            BinaryOp::Eq => Opcode::Eq,
            BinaryOp::NotEq => Opcode::NotEq,
            BinaryOp::Lt => Opcode::Lt,
            BinaryOp::Gt => Opcode::Gt,
            BinaryOp::Le => Opcode::Le,
            BinaryOp::Ge => Opcode::Ge,
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Sub => Opcode::Sub,
            BinaryOp::Xor => Opcode::Xor,
            BinaryOp::Mul => Opcode::Mul,
            BinaryOp::Div => Opcode::Div,
            BinaryOp::Rem => Opcode::Rem,
            BinaryOp::Shl => Opcode::Shl,
            BinaryOp::Shr => Opcode::Shr,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Pipe => {
                unreachable!("And/Or handled above, Pipe lowered to Call by the parser")
            }
        });
    }

    fn compile_call(&mut self, call: &CallExpr) {
        self.compile_expr(&call.callee);
        for arg in &call.args {
            self.compile_expr(arg);
        }
        self.builder.emit(Opcode::Call(call.args.len() as u32));
    }

    fn compile_function(&mut self, lit: &FunctionLit) {
        // Reserve the constant slot now so a recursive reference to the
        // function's own name (bound in the *enclosing* scope before the
        // body is compiled) can already see a function template, even
        // though its captured-stash decision is only known once the body
        // finishes compiling.
        let const_idx = self.builder.reserve_const();

        let self_slot = lit.name.as_ref().map(|name| self.scopes.declare(name));

        let start = self.builder.here();
        self.scopes.push(start);
        let param_slots: Vec<u32> = lit.params.iter().map(|p| self.scopes.declare(&p.name)).collect();
        for stmt in &lit.body.stmts {
            self.compile_stmt(stmt);
        }
        // Fall off the end with an implicit `null` return.
        let null_idx = self.builder.intern_const(Value::Null);
        self.builder.emit(Opcode::LoadConst(null_idx));
        self.builder.emit(Opcode::Return);

        let end = self.builder.here();
        let scope = self.scopes.pop();
        self.rewrite_range(start, end, scope.needs_stash);

        let pending = PendingFunction {
            const_idx,
            arity: param_slots.len(),
        };
        self.builder.set_const(
            pending.const_idx,
            Value::Function(Function::Compiled(Rc::new(CompiledFunction {
                name: lit.name.clone(),
                program: Weak::new(),
                entry: start,
                arity: pending.arity,
                frame_size: scope.frame_size(),
                needs_stash: scope.needs_stash,
                captured: None,
            }))),
        );
        self.builder.emit(Opcode::MakeFunction(pending.const_idx));
        if let Some(slot) = self_slot {
            self.builder.emit(Opcode::Dup);
            self.builder.emit(Opcode::StoreStash(0, slot));
        }
    }

    /// Rewrites every level-0 `LoadStash`/`StoreStash` within
    /// `[start, end)` to `LoadStack`/`StoreStack` when the function that
    /// owns this range was never captured by a nested closure.
    fn rewrite_range(&mut self, start: u32, end: u32, needs_stash: bool) {
        if needs_stash {
            return;
        }
        for op in &mut self.builder.instructions_mut()[start as usize..end as usize] {
            *op = match *op {
                Opcode::LoadStash(0, slot) => Opcode::LoadStack(slot),
                Opcode::StoreStash(0, slot) => Opcode::StoreStack(slot),
                other => other,
            };
        }
    }
}

/// AST program alias to disambiguate from `bytecode::code::Program`.
pub use crate::ast::Program as AstProgram;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn compile_source(src: &str) -> Result<Rc<Program>, Vec<CompileError>> {
        let mut files = FileSet::new();
        let mut parser = Parser::new(&mut files, "test.gs", src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        let compiler = Compiler::new(&files);
        compiler.compile(&program)
    }

    #[test]
    fn compiles_simple_arithmetic() {
        let program = compile_source("4 + 5 * 6;").unwrap();
        assert!(program.instructions.iter().any(|op| matches!(op, Opcode::Mul)));
        assert!(program.instructions.iter().any(|op| matches!(op, Opcode::Add)));
    }

    #[test]
    fn stashless_function_uses_stack_slots() {
        let program = compile_source("let sq = function(x) => x * x;").unwrap();
        let uses_stash = program
            .instructions
            .iter()
            .any(|op| matches!(op, Opcode::LoadStash(0, _) | Opcode::StoreStash(0, _)));
        assert!(!uses_stash, "non-capturing function should be stashless");
    }

    #[test]
    fn closure_capturing_outer_variable_needs_stash() {
        let program = compile_source(
            "let make = function(n) => function() => n; let f = make(5);",
        )
        .unwrap();
        let uses_stash = program.instructions.iter().any(|op| matches!(op, Opcode::LoadStash(1, _)));
        assert!(uses_stash, "capture site should reference outer stash at level 1");
    }

    #[test]
    fn assignment_to_undeclared_name_is_a_compile_error() {
        let mut files = FileSet::new();
        let mut parser = Parser::new(&mut files, "test.gs", "x = 1;");
        let program = parser.parse_program();
        let compiler = Compiler::new(&files);
        let result = compiler.compile(&program);
        assert!(result.is_err());
    }
}

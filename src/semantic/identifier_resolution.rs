//! A1: identifier resolution.
//!
//! Renames every local to a globally-unique `local.<orig>.<n>` name,
//! enforces block scoping (no two declarations in the same scope may share a
//! name), and checks that increment/decrement operands and assignment
//! left-hand sides are plain variable expressions.

use crate::ast::*;
use crate::error::Diagnostic;
use std::collections::HashMap;

struct Scope {
    names: HashMap<String, String>,
}

pub struct IdentifierResolver {
    scopes: Vec<Scope>,
    counter: usize,
    diagnostics: Vec<Diagnostic>,
}

impl IdentifierResolver {
    pub fn new() -> Self {
        IdentifierResolver {
            scopes: Vec::new(),
            counter: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn resolve(mut self, program: &mut Program) -> Vec<Diagnostic> {
        self.scopes.push(Scope {
            names: HashMap::new(),
        });
        for decl in &mut program.declarations {
            match decl {
                Declaration::Variable(v) => self.resolve_file_scope_var(v),
                Declaration::Function(f) => self.resolve_function(f),
            }
        }
        self.diagnostics
    }

    fn fresh_name(&mut self, original: &str) -> String {
        self.counter += 1;
        format!("local.{original}.{}", self.counter)
    }

    fn declare(&mut self, original: &str) -> Option<String> {
        if self.scopes.last().unwrap().names.contains_key(original) {
            return None;
        }
        let fresh = self.fresh_name(original);
        self.scopes
            .last_mut()
            .unwrap()
            .names
            .insert(original.to_string(), fresh.clone());
        Some(fresh)
    }

    fn lookup(&self, name: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            if let Some(renamed) = scope.names.get(name) {
                return Some(renamed.clone());
            }
        }
        None
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn resolve_file_scope_var(&mut self, v: &mut VariableDecl) {
        // File-scope variables are not renamed, but they must still be
        // visible to lookups from function bodies that reference them.
        self.scopes
            .last_mut()
            .unwrap()
            .names
            .insert(v.name.clone(), v.name.clone());
    }

    fn resolve_function(&mut self, f: &mut FunctionDecl) {
        // Function names and top-level variables are not renamed.
        self.push_scope();
        for param in &mut f.params {
            match self.declare(param) {
                Some(fresh) => *param = fresh,
                None => self
                    .diagnostics
                    .push(Diagnostic::scoping(format!("redeclaration of parameter '{param}'"))),
            }
        }
        if let Some(body) = &mut f.body {
            self.resolve_block(body);
        }
        self.pop_scope();
    }

    fn resolve_block(&mut self, block: &mut Block) {
        for item in block {
            match item {
                BlockItem::Declaration(Declaration::Variable(v)) => self.resolve_local_var(v),
                BlockItem::Declaration(Declaration::Function(f)) => {
                    if f.body.is_some() {
                        self.diagnostics.push(Diagnostic::scoping(
                            "nested function definitions are not supported",
                        ));
                    }
                    // Nested prototypes are file-scope names; not renamed.
                }
                BlockItem::Statement(s) => self.resolve_statement(s),
            }
        }
    }

    fn resolve_local_var(&mut self, v: &mut VariableDecl) {
        if let Some(init) = &mut v.init {
            self.resolve_expr(init);
        }
        if v.storage == StorageClass::Extern || v.storage == StorageClass::Static {
            // Keeps its source name, but is still visible to lookups in this
            // scope under that name.
            self.scopes
                .last_mut()
                .unwrap()
                .names
                .insert(v.name.clone(), v.name.clone());
            return;
        }
        match self.declare(&v.name) {
            Some(fresh) => v.name = fresh,
            None => self
                .diagnostics
                .push(Diagnostic::scoping(format!("redeclaration of '{}'", v.name))),
        }
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Return(Some(e)) | Statement::Expr(e) => self.resolve_expr(e),
            Statement::Return(None) | Statement::Null => {}
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond);
                self.resolve_statement(then_branch);
                if let Some(e) = else_branch {
                    self.resolve_statement(e);
                }
            }
            Statement::Compound(block) => {
                self.push_scope();
                self.resolve_block(block);
                self.pop_scope();
            }
            Statement::While { cond, body, .. } => {
                self.resolve_expr(cond);
                self.resolve_statement(body);
            }
            Statement::DoWhile { body, cond, .. } => {
                self.resolve_statement(body);
                self.resolve_expr(cond);
            }
            Statement::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.push_scope();
                match init {
                    ForInit::Decl(d) => {
                        if let Declaration::Variable(v) = d.as_mut() {
                            self.resolve_local_var(v);
                        }
                    }
                    ForInit::Expr(Some(e)) => self.resolve_expr(e),
                    ForInit::Expr(None) => {}
                }
                if let Some(c) = cond {
                    self.resolve_expr(c);
                }
                if let Some(p) = post {
                    self.resolve_expr(p);
                }
                self.resolve_statement(body);
                self.pop_scope();
            }
            Statement::Switch { expr, body, .. } => {
                self.resolve_expr(expr);
                self.resolve_statement(body);
            }
            Statement::Case { value, body, .. } => {
                self.resolve_expr(value);
                self.resolve_statement(body);
            }
            Statement::Default { body, .. } => self.resolve_statement(body),
            Statement::Labeled { body, .. } => self.resolve_statement(body),
            Statement::Break(_) | Statement::Continue(_) | Statement::Goto(_) => {}
        }
    }

    fn require_lvalue(&mut self, e: &Expr) {
        if !matches!(e.kind, ExprKind::Variable(_)) {
            self.diagnostics
                .push(Diagnostic::scoping("expected an lvalue"));
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Constant(_) => {}
            ExprKind::Variable(name) => match self.lookup(name) {
                Some(fresh) => *name = fresh,
                None => self
                    .diagnostics
                    .push(Diagnostic::scoping(format!("use of undeclared identifier '{name}'"))),
            },
            ExprKind::Unary(op, operand) => {
                if matches!(
                    op,
                    UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement
                ) {
                    self.require_lvalue(operand);
                }
                self.resolve_expr(operand);
            }
            ExprKind::Binary(_, l, r) => {
                self.resolve_expr(l);
                self.resolve_expr(r);
            }
            ExprKind::Assignment(_, lhs, rhs) => {
                self.require_lvalue(lhs);
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Conditional(c, t, e) => {
                self.resolve_expr(c);
                self.resolve_expr(t);
                self.resolve_expr(e);
            }
            ExprKind::FunctionCall(_, args) => {
                for a in args {
                    self.resolve_expr(a);
                }
            }
            ExprKind::Cast(_, inner) => self.resolve_expr(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;

    fn dummy_span() -> SourceSpan {
        SourceSpan::new(1, 1)
    }

    fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Variable(name.to_string()), dummy_span())
    }

    #[test]
    fn renames_locals_uniquely() {
        let mut program = Program {
            declarations: vec![Declaration::Function(FunctionDecl {
                name: "main".into(),
                ret_type: crate::types::Type::Int,
                param_types: vec![],
                params: vec![],
                body: Some(vec![
                    BlockItem::Declaration(Declaration::Variable(VariableDecl {
                        name: "x".into(),
                        ty: crate::types::Type::Int,
                        init: None,
                        storage: StorageClass::None,
                        span: dummy_span(),
                    })),
                    BlockItem::Statement(Statement::Return(Some(var("x")))),
                ]),
                storage: StorageClass::None,
                span: dummy_span(),
            })],
        };
        let diags = IdentifierResolver::new().resolve(&mut program);
        assert!(diags.is_empty());
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        let BlockItem::Declaration(Declaration::Variable(v)) = &body[0] else {
            panic!()
        };
        assert!(v.name.starts_with("local.x."));
        let BlockItem::Statement(Statement::Return(Some(e))) = &body[1] else {
            panic!()
        };
        assert_eq!(e.kind, ExprKind::Variable(v.name.clone()));
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let mut program = Program {
            declarations: vec![Declaration::Function(FunctionDecl {
                name: "main".into(),
                ret_type: crate::types::Type::Int,
                param_types: vec![],
                params: vec![],
                body: Some(vec![
                    BlockItem::Declaration(Declaration::Variable(VariableDecl {
                        name: "x".into(),
                        ty: crate::types::Type::Int,
                        init: None,
                        storage: StorageClass::None,
                        span: dummy_span(),
                    })),
                    BlockItem::Declaration(Declaration::Variable(VariableDecl {
                        name: "x".into(),
                        ty: crate::types::Type::Int,
                        init: None,
                        storage: StorageClass::None,
                        span: dummy_span(),
                    })),
                ]),
                storage: StorageClass::None,
                span: dummy_span(),
            })],
        };
        let diags = IdentifierResolver::new().resolve(&mut program);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn non_lvalue_assignment_target_is_an_error() {
        let mut program = Program {
            declarations: vec![Declaration::Function(FunctionDecl {
                name: "main".into(),
                ret_type: crate::types::Type::Int,
                param_types: vec![],
                params: vec![],
                body: Some(vec![BlockItem::Statement(Statement::Expr(Expr::new(
                    ExprKind::Assignment(
                        AssignOp::Assign,
                        Box::new(Expr::new(ExprKind::Constant(Constant::Int(1)), dummy_span())),
                        Box::new(Expr::new(ExprKind::Constant(Constant::Int(2)), dummy_span())),
                    ),
                    dummy_span(),
                )))]),
                storage: StorageClass::None,
                span: dummy_span(),
            })],
        };
        let diags = IdentifierResolver::new().resolve(&mut program);
        assert_eq!(diags.len(), 1);
    }
}

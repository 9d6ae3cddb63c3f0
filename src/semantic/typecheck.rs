//! A5: type checking.
//!
//! Assigns a [`Type`] to every expression, materializes implicit
//! conversions as explicit `Cast` nodes, and builds the [`SymbolTable`] with
//! linkage/storage attributes. Runs after A1 (so every local name is already
//! globally unique, which lets a single flat symbol table serve both file
//! scope and every function body).

use crate::ast::*;
use crate::error::Diagnostic;
use crate::types::{IdentifierAttrs, InitialValue, StaticInit, Symbol, SymbolTable, Type};

pub struct TypeCheckResult {
    pub symbols: SymbolTable,
}

pub struct TypeChecker {
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    current_return_type: Type,
}

fn common_type(a: &Type, b: &Type) -> Type {
    if a == b {
        return a.clone();
    }
    if a.is_double() {
        return Type::Double;
    }
    if b.is_double() {
        return Type::Double;
    }
    if a.size() == b.size() {
        if !a.is_signed() {
            a.clone()
        } else {
            b.clone()
        }
    } else if a.size() > b.size() {
        a.clone()
    } else {
        b.clone()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            current_return_type: Type::Int,
        }
    }

    pub fn check(mut self, program: &mut Program) -> Result<TypeCheckResult, Vec<Diagnostic>> {
        for decl in &mut program.declarations {
            match decl {
                Declaration::Variable(v) => self.file_scope_variable(v),
                Declaration::Function(f) => self.function_decl(f, true),
            }
        }
        if self.diagnostics.is_empty() {
            Ok(TypeCheckResult {
                symbols: self.symbols,
            })
        } else {
            Err(self.diagnostics)
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::typing(message));
    }

    // ------------------------------------------------------------- //
    // declarations
    // ------------------------------------------------------------- //

    fn file_scope_variable(&mut self, v: &mut VariableDecl) {
        let initial = match &v.init {
            Some(e) => match &e.kind {
                ExprKind::Constant(c) => {
                    InitialValue::Initial(constant_to_static_init(c, &v.ty))
                }
                _ => {
                    self.error(format!(
                        "non-constant initializer for file-scope variable '{}'",
                        v.name
                    ));
                    InitialValue::Initial(StaticInit::Zero(v.ty.size()))
                }
            },
            None => {
                if v.storage == StorageClass::Extern {
                    InitialValue::NoInitializer
                } else {
                    InitialValue::Tentative
                }
            }
        };
        let global = v.storage != StorageClass::Static;
        self.merge_static_variable(&v.name, v.ty.clone(), global, initial);
    }

    fn merge_static_variable(&mut self, name: &str, ty: Type, mut global: bool, mut initial: InitialValue) {
        let mut type_conflict = false;
        let mut definition_conflict = false;
        if let Some(existing) = self.symbols.get(name) {
            if existing.ty != ty {
                type_conflict = true;
            }
            if let IdentifierAttrs::Static {
                initial: old_initial,
                global: old_global,
            } = &existing.attrs
            {
                global = *old_global;
                match (old_initial, &initial) {
                    (InitialValue::Initial(_), InitialValue::Initial(_)) => {
                        definition_conflict = true;
                    }
                    (InitialValue::Initial(_), _) => initial = old_initial.clone(),
                    (InitialValue::Tentative, InitialValue::NoInitializer) => {
                        initial = InitialValue::Tentative
                    }
                    _ => {}
                }
            }
        }
        if type_conflict {
            self.error(format!("conflicting declaration types for '{name}'"));
        }
        if definition_conflict {
            self.error(format!("conflicting definitions for '{name}'"));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                ty,
                attrs: IdentifierAttrs::Static { initial, global },
            },
        );
    }

    fn function_decl(&mut self, f: &mut FunctionDecl, _top_level: bool) {
        let ty = f.ty();
        let has_body = f.body.is_some();
        let mut global = f.storage != StorageClass::Static;

        let mut type_conflict = false;
        let mut redefinition = false;
        let mut static_after_nonstatic = false;
        if let Some(existing) = self.symbols.get(&f.name) {
            if existing.ty != ty {
                type_conflict = true;
            }
            if let IdentifierAttrs::Function {
                defined: old_defined,
                global: old_global,
            } = existing.attrs
            {
                if old_defined && has_body {
                    redefinition = true;
                }
                if f.storage == StorageClass::Static && old_global {
                    static_after_nonstatic = true;
                }
                global = old_global;
            }
        }
        if type_conflict {
            self.error(format!("conflicting declaration types for '{}'", f.name));
        }
        if redefinition {
            self.error(format!("redefinition of function '{}'", f.name));
        }
        if static_after_nonstatic {
            self.error(format!(
                "static declaration of '{}' follows non-static declaration",
                f.name
            ));
        }

        let already_defined = matches!(
            self.symbols.get(&f.name),
            Some(Symbol {
                attrs: IdentifierAttrs::Function { defined: true, .. },
                ..
            })
        );
        self.symbols.insert(
            f.name.clone(),
            Symbol {
                ty,
                attrs: IdentifierAttrs::Function {
                    defined: has_body || already_defined,
                    global,
                },
            },
        );

        if let Some(body) = &mut f.body {
            for (name, ty) in f.params.iter().zip(f.param_types.iter()) {
                self.symbols.insert(
                    name.clone(),
                    Symbol {
                        ty: ty.clone(),
                        attrs: IdentifierAttrs::Local,
                    },
                );
            }
            let saved_return = std::mem::replace(&mut self.current_return_type, f.ret_type.clone());
            self.check_block(body);
            self.current_return_type = saved_return;
        }
    }

    fn local_variable(&mut self, v: &mut VariableDecl) {
        match v.storage {
            StorageClass::Extern => {
                if v.init.is_some() {
                    self.error(format!("extern local variable '{}' cannot have an initializer", v.name));
                }
                self.merge_static_variable(&v.name, v.ty.clone(), true, InitialValue::NoInitializer);
            }
            StorageClass::Static => {
                let initial = match &v.init {
                    Some(e) => match &e.kind {
                        ExprKind::Constant(c) => constant_to_static_init(c, &v.ty),
                        _ => {
                            self.error(format!(
                                "non-constant initializer for static local variable '{}'",
                                v.name
                            ));
                            StaticInit::Zero(v.ty.size())
                        }
                    },
                    None => zero_static_init(&v.ty),
                };
                self.symbols.insert(
                    v.name.clone(),
                    Symbol {
                        ty: v.ty.clone(),
                        attrs: IdentifierAttrs::Static {
                            initial: InitialValue::Initial(initial),
                            global: false,
                        },
                    },
                );
            }
            StorageClass::None => {
                self.symbols.insert(
                    v.name.clone(),
                    Symbol {
                        ty: v.ty.clone(),
                        attrs: IdentifierAttrs::Local,
                    },
                );
                if let Some(init) = &mut v.init {
                    self.check_expr(init);
                    let target = v.ty.clone();
                    take_and_convert(init, &target);
                }
            }
        }
    }

    // ------------------------------------------------------------- //
    // statements
    // ------------------------------------------------------------- //

    fn check_block(&mut self, block: &mut Block) {
        for item in block {
            match item {
                BlockItem::Declaration(Declaration::Variable(v)) => self.local_variable(v),
                BlockItem::Declaration(Declaration::Function(f)) => self.function_decl(f, false),
                BlockItem::Statement(s) => self.check_statement(s),
            }
        }
    }

    fn check_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Return(expr) => {
                let target = self.current_return_type.clone();
                if let Some(e) = expr {
                    self.check_expr(e);
                    take_and_convert(e, &target);
                }
            }
            Statement::Expr(e) => self.check_expr(e),
            Statement::Null => {}
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(cond);
                self.check_statement(then_branch);
                if let Some(e) = else_branch {
                    self.check_statement(e);
                }
            }
            Statement::Compound(block) => self.check_block(block),
            Statement::While { cond, body, .. } => {
                self.check_expr(cond);
                self.check_statement(body);
            }
            Statement::DoWhile { body, cond, .. } => {
                self.check_statement(body);
                self.check_expr(cond);
            }
            Statement::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                match init {
                    ForInit::Decl(d) => {
                        if let Declaration::Variable(v) = d.as_mut() {
                            if v.storage != StorageClass::None {
                                self.error("a for-loop initializer cannot have a storage-class specifier");
                            }
                            self.local_variable(v);
                        }
                    }
                    ForInit::Expr(Some(e)) => self.check_expr(e),
                    ForInit::Expr(None) => {}
                }
                if let Some(c) = cond {
                    self.check_expr(c);
                }
                if let Some(p) = post {
                    self.check_expr(p);
                }
                self.check_statement(body);
            }
            Statement::Switch { expr, body, .. } => {
                self.check_expr(expr);
                if expr.ty().is_double() {
                    self.error("switch expression cannot have type double");
                }
                self.check_statement(body);
            }
            Statement::Case { value, body, .. } => {
                self.check_expr(value);
                self.check_statement(body);
            }
            Statement::Default { body, .. } => self.check_statement(body),
            Statement::Labeled { body, .. } => self.check_statement(body),
            Statement::Break(_) | Statement::Continue(_) | Statement::Goto(_) => {}
        }
    }

    // ------------------------------------------------------------- //
    // expressions
    // ------------------------------------------------------------- //

    fn check_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Constant(c) => {
                expr.ty = Some(c.ty());
            }
            ExprKind::Variable(name) => match self.symbols.get(name) {
                Some(sym) if sym.ty.is_function() => {
                    self.error(format!("'{name}' is a function, not a value"));
                    expr.ty = Some(Type::Int);
                }
                Some(sym) => expr.ty = Some(sym.ty.clone()),
                None => {
                    self.error(format!("use of undeclared identifier '{name}'"));
                    expr.ty = Some(Type::Int);
                }
            },
            ExprKind::Unary(op, operand) => {
                self.check_expr(operand);
                match op {
                    UnaryOp::Not => expr.ty = Some(Type::Int),
                    UnaryOp::Complement if operand.ty().is_double() => {
                        self.error("bitwise complement of a double is not allowed");
                        expr.ty = Some(operand.ty().clone());
                    }
                    _ => expr.ty = Some(operand.ty().clone()),
                }
            }
            ExprKind::Binary(op, l, r) => {
                self.check_expr(l);
                self.check_expr(r);
                if op.is_logical() {
                    expr.ty = Some(Type::Int);
                    return;
                }
                if op.is_shift() {
                    let lt = l.ty().clone();
                    take_and_convert(r, &lt);
                    expr.ty = Some(lt);
                    return;
                }
                let common = common_type(l.ty(), r.ty());
                if matches!(op, BinaryOp::Remainder | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
                    && common.is_double()
                {
                    self.error("operator cannot be applied to double operands");
                }
                take_and_convert(l, &common);
                take_and_convert(r, &common);
                expr.ty = Some(if op.is_relational() { Type::Int } else { common });
            }
            ExprKind::Assignment(op, lhs, rhs) => {
                self.check_expr(lhs);
                self.check_expr(rhs);
                let lt = lhs.ty().clone();
                if let Some(bin) = op.as_binary() {
                    if matches!(bin, BinaryOp::Remainder | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
                        && lt.is_double()
                        && !bin.is_shift()
                    {
                        self.error("operator cannot be applied to double operands");
                    }
                    if bin.is_shift() {
                        // Shifts: right operand converted to the left operand's type,
                        // same as an ordinary (non-compound) shift.
                        take_and_convert(rhs, &lt);
                    } else {
                        let common = common_type(&lt, rhs.ty());
                        take_and_convert(rhs, &common);
                    }
                    // compound assignment: no cast on the lvalue read itself.
                } else {
                    take_and_convert(rhs, &lt);
                }
                expr.ty = Some(lt);
            }
            ExprKind::Conditional(c, t, e) => {
                self.check_expr(c);
                self.check_expr(t);
                self.check_expr(e);
                let common = common_type(t.ty(), e.ty());
                take_and_convert(t, &common);
                take_and_convert(e, &common);
                expr.ty = Some(common);
            }
            ExprKind::FunctionCall(name, args) => {
                for a in args.iter_mut() {
                    self.check_expr(a);
                }
                match self.symbols.get(name).cloned() {
                    Some(Symbol {
                        ty: Type::Function { ret, params },
                        ..
                    }) => {
                        if params.len() != args.len() {
                            self.error(format!(
                                "'{name}' expects {} argument(s), got {}",
                                params.len(),
                                args.len()
                            ));
                        }
                        for (arg, param_ty) in args.iter_mut().zip(params.iter()) {
                            take_and_convert(arg, param_ty);
                        }
                        expr.ty = Some(*ret);
                    }
                    Some(_) => {
                        self.error(format!("'{name}' is not a function"));
                        expr.ty = Some(Type::Int);
                    }
                    None => {
                        self.error(format!("call to undeclared function '{name}'"));
                        expr.ty = Some(Type::Int);
                    }
                }
            }
            ExprKind::Cast(target, inner) => {
                self.check_expr(inner);
                expr.ty = Some(target.clone());
            }
        }
    }
}

fn zero_static_init(ty: &Type) -> StaticInit {
    match ty {
        Type::Int => StaticInit::Int(0),
        Type::UInt => StaticInit::UInt(0),
        Type::Long => StaticInit::Long(0),
        Type::ULong => StaticInit::ULong(0),
        Type::Double => StaticInit::Double(0.0),
        Type::Function { .. } => unreachable!("functions have no static initializer"),
    }
}

fn constant_to_static_init(c: &Constant, target: &Type) -> StaticInit {
    match convert_constant(c, target) {
        Constant::Int(v) => StaticInit::Int(v),
        Constant::UInt(v) => StaticInit::UInt(v),
        Constant::Long(v) => StaticInit::Long(v),
        Constant::ULong(v) => StaticInit::ULong(v),
        Constant::Double(v) => StaticInit::Double(v),
    }
}

/// Wrap `expr` in a `Cast` node if its type differs from `target`, mutating
/// it in place (so callers can still read `expr.ty()` afterward).
fn take_and_convert(expr: &mut Expr, target: &Type) {
    if expr.ty() == target {
        return;
    }
    let span = expr.span;
    let inner = std::mem::replace(expr, Expr::new(ExprKind::Constant(Constant::Int(0)), span));
    *expr = Expr {
        kind: ExprKind::Cast(target.clone(), Box::new(inner)),
        span,
        ty: Some(target.clone()),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    fn parse(src: &str) -> Program {
        let (tokens, _) = crate::token::Lexer::new(src).tokenize();
        let (mut program, diags) = crate::parser::Parser::new(tokens).parse();
        assert!(diags.is_empty(), "{diags:?}");
        crate::semantic::identifier_resolution::IdentifierResolver::new().resolve(&mut program);
        program
    }

    #[test]
    fn common_type_is_commutative() {
        let cases = [
            (Type::Int, Type::Long),
            (Type::Int, Type::UInt),
            (Type::UInt, Type::Long),
            (Type::Long, Type::ULong),
            (Type::Int, Type::Double),
        ];
        for (a, b) in cases {
            assert_eq!(common_type(&a, &b), common_type(&b, &a));
        }
    }

    #[test]
    fn binary_arithmetic_gets_the_common_type() {
        let mut program = parse("int main(void) { long a; int b; return a + b; }");
        TypeChecker::new()
            .check(&mut program)
            .unwrap_or_else(|e| panic!("{e:?}"));
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let _ = f;
    }

    #[test]
    fn assigns_types_to_every_expression() {
        let mut program = parse("int main(void) { int x = 1 + 2; return x; }");
        let result = TypeChecker::new().check(&mut program);
        assert!(result.is_ok());
    }

    #[test]
    fn bitwise_complement_of_double_is_an_error() {
        let mut program = parse("int main(void) { double d = 1.0; return ~d; }");
        let result = TypeChecker::new().check(&mut program);
        assert!(result.is_err());
    }

    #[test]
    fn switch_on_double_is_an_error() {
        let mut program = parse("int main(void) { double d = 1.0; switch (d) { default: ; } return 0; }");
        let result = TypeChecker::new().check(&mut program);
        assert!(result.is_err());
    }

    #[test]
    fn call_argument_count_mismatch_is_an_error() {
        let mut program = parse("int f(int a, int b); int main(void) { return f(1); }");
        let result = TypeChecker::new().check(&mut program);
        assert!(result.is_err());
    }

    #[test]
    fn conflicting_file_scope_definitions_are_an_error() {
        let mut program = parse("int x = 1; int x = 2; int main(void) { return x; }");
        let result = TypeChecker::new().check(&mut program);
        assert!(result.is_err());
    }
}

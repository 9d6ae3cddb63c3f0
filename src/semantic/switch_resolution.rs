//! A4: switch-case resolution.
//!
//! Runs after A5 so every `case` constant and the switch controlling
//! expression already carry a [`Type`]. Normalizes every case constant to
//! the switch's own type (reusing the same two's-complement reinterpretation
//! A5 uses for static initializers), rejects duplicate case values within a
//! switch, and assigns each case/default a `<switch-label>.case.<n>` /
//! `<switch-label>.default` label.

use crate::ast::*;
use crate::error::Diagnostic;
use crate::types::Type;

pub struct SwitchResolver {
    diagnostics: Vec<Diagnostic>,
}

struct SwitchContext {
    label: String,
    ty: Type,
    seen: Vec<u64>,
    cases: Vec<SwitchCase>,
    has_default: bool,
}

impl SwitchResolver {
    pub fn new() -> Self {
        SwitchResolver {
            diagnostics: Vec::new(),
        }
    }

    pub fn resolve(mut self, program: &mut Program) -> Vec<Diagnostic> {
        for decl in &mut program.declarations {
            if let Declaration::Function(f) = decl {
                if let Some(body) = &mut f.body {
                    self.resolve_block(body, &mut Vec::new());
                }
            }
        }
        self.diagnostics
    }

    fn resolve_block(&mut self, block: &mut Block, stack: &mut Vec<SwitchContext>) {
        for item in block {
            if let BlockItem::Statement(s) = item {
                self.resolve_statement(s, stack);
            }
        }
    }

    fn resolve_statement(&mut self, stmt: &mut Statement, stack: &mut Vec<SwitchContext>) {
        match stmt {
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_statement(then_branch, stack);
                if let Some(e) = else_branch {
                    self.resolve_statement(e, stack);
                }
            }
            Statement::Compound(block) => self.resolve_block(block, stack),
            Statement::While { body, .. } | Statement::DoWhile { body, .. } | Statement::For { body, .. } => {
                self.resolve_statement(body, stack)
            }
            Statement::Switch {
                expr,
                body,
                cases,
                has_default,
                label,
            } => {
                stack.push(SwitchContext {
                    label: label.clone(),
                    ty: expr.ty().clone(),
                    seen: Vec::new(),
                    cases: Vec::new(),
                    has_default: false,
                });
                self.resolve_statement(body, stack);
                let ctx = stack.pop().unwrap();
                *cases = ctx.cases;
                *has_default = ctx.has_default;
            }
            Statement::Case { value, body, label } => {
                let Some(ctx) = stack.last_mut() else {
                    self.diagnostics
                        .push(Diagnostic::scoping("'case' label not within a switch statement"));
                    self.resolve_statement(body, stack);
                    return;
                };
                let ExprKind::Constant(c) = &value.kind else {
                    self.diagnostics
                        .push(Diagnostic::scoping("case label does not reduce to a constant"));
                    self.resolve_statement(body, stack);
                    return;
                };
                let converted = convert_constant(c, &ctx.ty);
                let bits = if matches!(converted, Constant::Double(_)) {
                    self.diagnostics
                        .push(Diagnostic::typing("case label cannot have type double"));
                    0
                } else {
                    converted.as_u64()
                };
                if ctx.seen.contains(&bits) {
                    self.diagnostics
                        .push(Diagnostic::scoping("duplicate case value in switch statement"));
                } else {
                    ctx.seen.push(bits);
                }
                *label = format!("{}.case.{}", ctx.label, ctx.cases.len() + 1);
                ctx.cases.push(SwitchCase {
                    constant: converted.clone(),
                    label: label.clone(),
                });
                value.kind = ExprKind::Constant(converted);
                self.resolve_statement(body, stack);
            }
            Statement::Default { body, label } => {
                let Some(ctx) = stack.last_mut() else {
                    self.diagnostics
                        .push(Diagnostic::scoping("'default' label not within a switch statement"));
                    self.resolve_statement(body, stack);
                    return;
                };
                if ctx.has_default {
                    self.diagnostics
                        .push(Diagnostic::scoping("multiple default labels in one switch"));
                }
                ctx.has_default = true;
                *label = format!("{}.default", ctx.label);
                self.resolve_statement(body, stack);
            }
            Statement::Labeled { body, .. } => self.resolve_statement(body, stack),
            Statement::Return(_)
            | Statement::Expr(_)
            | Statement::Null
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Goto(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;
    use crate::types::Type;

    fn dummy() -> SourceSpan {
        SourceSpan::new(1, 1)
    }

    fn const_expr(v: i32, ty: Type) -> Expr {
        let mut e = Expr::new(ExprKind::Constant(Constant::Int(v)), dummy());
        e.ty = Some(ty);
        e
    }

    fn program_with_switch(expr_ty: Type, cases: Vec<(i32, Statement)>) -> Program {
        let mut body_items = Vec::new();
        for (v, stmt) in cases {
            body_items.push(BlockItem::Statement(Statement::Case {
                value: const_expr(v, expr_ty.clone()),
                body: Box::new(stmt),
                label: String::new(),
            }));
        }
        let expr = const_expr(0, expr_ty);
        Program {
            declarations: vec![Declaration::Function(FunctionDecl {
                name: "main".into(),
                ret_type: Type::Int,
                param_types: vec![],
                params: vec![],
                body: Some(vec![BlockItem::Statement(Statement::Switch {
                    expr,
                    body: Box::new(Statement::Compound(body_items)),
                    cases: vec![],
                    has_default: false,
                    label: "switch.1".into(),
                })]),
                storage: StorageClass::None,
                span: dummy(),
            })],
        }
    }

    #[test]
    fn duplicate_case_values_are_an_error() {
        let mut program = program_with_switch(
            Type::Int,
            vec![(1, Statement::Null), (1, Statement::Null)],
        );
        let diags = SwitchResolver::new().resolve(&mut program);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn distinct_case_values_are_fine() {
        let mut program = program_with_switch(
            Type::Int,
            vec![(1, Statement::Null), (2, Statement::Null)],
        );
        let diags = SwitchResolver::new().resolve(&mut program);
        assert!(diags.is_empty());
    }

    #[test]
    fn case_values_are_normalized_to_the_switch_type() {
        let mut program = program_with_switch(Type::UInt, vec![(-1, Statement::Null)]);
        SwitchResolver::new().resolve(&mut program);
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::Switch { body, .. }) = &f.body.as_ref().unwrap()[0]
        else {
            panic!();
        };
        let Statement::Compound(items) = body.as_ref() else {
            panic!()
        };
        let BlockItem::Statement(Statement::Case { value, .. }) = &items[0] else {
            panic!()
        };
        assert_eq!(value.kind, ExprKind::Constant(Constant::UInt(u32::MAX)));
    }

    #[test]
    fn duplicate_default_is_an_error() {
        let mut program = program_with_switch(Type::Int, vec![]);
        let Declaration::Function(f) = &mut program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::Switch { body, .. }) = &mut f.body.as_mut().unwrap()[0]
        else {
            panic!()
        };
        **body = Statement::Compound(vec![
            BlockItem::Statement(Statement::Default {
                body: Box::new(Statement::Null),
                label: String::new(),
            }),
            BlockItem::Statement(Statement::Default {
                body: Box::new(Statement::Null),
                label: String::new(),
            }),
        ]);
        let diags = SwitchResolver::new().resolve(&mut program);
        assert_eq!(diags.len(), 1);
    }
}

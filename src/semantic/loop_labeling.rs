//! A2: loop/switch labeling.
//!
//! Assigns each loop a `loop.<n>` label and each switch a `switch.<n>`
//! label, then resolves every `break`/`continue` to the label of its
//! innermost enclosing context (`continue` skips switch contexts).

use crate::ast::*;
use crate::error::Diagnostic;

#[derive(Clone, Copy, PartialEq)]
enum ContextKind {
    Loop,
    Switch,
}

struct Context {
    kind: ContextKind,
    label: String,
}

pub struct LoopLabeler {
    stack: Vec<Context>,
    loop_counter: usize,
    switch_counter: usize,
    diagnostics: Vec<Diagnostic>,
}

impl LoopLabeler {
    pub fn new() -> Self {
        LoopLabeler {
            stack: Vec::new(),
            loop_counter: 0,
            switch_counter: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn label(mut self, program: &mut Program) -> Vec<Diagnostic> {
        for decl in &mut program.declarations {
            if let Declaration::Function(f) = decl {
                if let Some(body) = &mut f.body {
                    self.label_block(body);
                }
            }
        }
        self.diagnostics
    }

    fn innermost_label(&self) -> Option<String> {
        self.stack.last().map(|c| c.label.clone())
    }

    fn innermost_loop_label(&self) -> Option<String> {
        self.stack
            .iter()
            .rev()
            .find(|c| c.kind == ContextKind::Loop)
            .map(|c| c.label.clone())
    }

    fn label_block(&mut self, block: &mut Block) {
        for item in block {
            if let BlockItem::Statement(s) = item {
                self.label_statement(s);
            }
        }
    }

    fn label_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.label_statement(then_branch);
                if let Some(e) = else_branch {
                    self.label_statement(e);
                }
            }
            Statement::Compound(block) => self.label_block(block),
            Statement::While { body, label, .. } => {
                self.loop_counter += 1;
                *label = format!("loop.{}", self.loop_counter);
                self.stack.push(Context {
                    kind: ContextKind::Loop,
                    label: label.clone(),
                });
                self.label_statement(body);
                self.stack.pop();
            }
            Statement::DoWhile { body, label, .. } => {
                self.loop_counter += 1;
                *label = format!("loop.{}", self.loop_counter);
                self.stack.push(Context {
                    kind: ContextKind::Loop,
                    label: label.clone(),
                });
                self.label_statement(body);
                self.stack.pop();
            }
            Statement::For { body, label, .. } => {
                self.loop_counter += 1;
                *label = format!("loop.{}", self.loop_counter);
                self.stack.push(Context {
                    kind: ContextKind::Loop,
                    label: label.clone(),
                });
                self.label_statement(body);
                self.stack.pop();
            }
            Statement::Switch { body, label, .. } => {
                self.switch_counter += 1;
                *label = format!("switch.{}", self.switch_counter);
                self.stack.push(Context {
                    kind: ContextKind::Switch,
                    label: label.clone(),
                });
                self.label_statement(body);
                self.stack.pop();
            }
            Statement::Case { body, .. } => self.label_statement(body),
            Statement::Default { body, .. } => self.label_statement(body),
            Statement::Labeled { body, .. } => self.label_statement(body),
            Statement::Break(label) => match self.innermost_label() {
                Some(l) => *label = format!("break.{l}"),
                None => self
                    .diagnostics
                    .push(Diagnostic::scoping("'break' outside of a loop or switch")),
            },
            Statement::Continue(label) => match self.innermost_loop_label() {
                Some(l) => *label = format!("continue.{l}"),
                None => self
                    .diagnostics
                    .push(Diagnostic::scoping("'continue' outside of a loop")),
            },
            Statement::Return(_)
            | Statement::Expr(_)
            | Statement::Null
            | Statement::Goto(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;

    fn dummy() -> SourceSpan {
        SourceSpan::new(1, 1)
    }

    fn program_with(body: Block) -> Program {
        Program {
            declarations: vec![Declaration::Function(FunctionDecl {
                name: "main".into(),
                ret_type: crate::types::Type::Int,
                param_types: vec![],
                params: vec![],
                body: Some(body),
                storage: StorageClass::None,
                span: dummy(),
            })],
        }
    }

    #[test]
    fn break_in_loop_gets_loop_label() {
        let mut program = program_with(vec![BlockItem::Statement(Statement::While {
            cond: Expr::new(ExprKind::Constant(Constant::Int(1)), dummy()),
            body: Box::new(Statement::Break(String::new())),
            label: String::new(),
        })]);
        let diags = LoopLabeler::new().label(&mut program);
        assert!(diags.is_empty());
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::While { body, label, .. }) = &f.body.as_ref().unwrap()[0] else {
            panic!()
        };
        assert_eq!(label, "loop.1");
        assert!(matches!(body.as_ref(), Statement::Break(l) if l == "break.loop.1"));
    }

    #[test]
    fn continue_skips_switch_context() {
        let mut program = program_with(vec![BlockItem::Statement(Statement::While {
            cond: Expr::new(ExprKind::Constant(Constant::Int(1)), dummy()),
            body: Box::new(Statement::Switch {
                expr: Expr::new(ExprKind::Constant(Constant::Int(1)), dummy()),
                body: Box::new(Statement::Continue(String::new())),
                cases: vec![],
                has_default: false,
                label: String::new(),
            }),
            label: String::new(),
        })]);
        let diags = LoopLabeler::new().label(&mut program);
        assert!(diags.is_empty());
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::While { body, label, .. }) = &f.body.as_ref().unwrap()[0] else {
            panic!()
        };
        let Statement::Switch { body: switch_body, .. } = body.as_ref() else {
            panic!()
        };
        assert!(matches!(switch_body.as_ref(), Statement::Continue(l) if *l == format!("continue.{label}")));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let mut program = program_with(vec![BlockItem::Statement(Statement::Break(String::new()))]);
        let diags = LoopLabeler::new().label(&mut program);
        assert_eq!(diags.len(), 1);
    }
}

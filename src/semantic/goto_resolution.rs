//! A3: goto-label resolution.
//!
//! Per function, collects declared `label:` names and referenced `goto`
//! targets; a goto to an undeclared label, or a duplicate label
//! declaration, is an error. Labels share a function-scoped namespace
//! distinct from variables.

use crate::ast::*;
use crate::error::Diagnostic;
use std::collections::HashSet;

pub struct GotoResolver {
    diagnostics: Vec<Diagnostic>,
}

impl GotoResolver {
    pub fn new() -> Self {
        GotoResolver {
            diagnostics: Vec::new(),
        }
    }

    pub fn resolve(mut self, program: &Program) -> Vec<Diagnostic> {
        for decl in &program.declarations {
            if let Declaration::Function(f) = decl {
                if let Some(body) = &f.body {
                    self.check_function(body);
                }
            }
        }
        self.diagnostics
    }

    fn check_function(&mut self, body: &Block) {
        let mut declared = HashSet::new();
        let mut referenced = HashSet::new();
        self.collect_block(body, &mut declared, &mut referenced);
        for name in &referenced {
            if !declared.contains(name) {
                self.diagnostics
                    .push(Diagnostic::scoping(format!("use of undeclared label '{name}'")));
            }
        }
    }

    fn declare_label<'a>(&mut self, name: &'a str, declared: &mut HashSet<&'a str>) {
        if !declared.insert(name) {
            self.diagnostics
                .push(Diagnostic::scoping(format!("redefinition of label '{name}'")));
        }
    }

    fn collect_block<'a>(
        &mut self,
        block: &'a Block,
        declared: &mut HashSet<&'a str>,
        referenced: &mut HashSet<&'a str>,
    ) {
        for item in block {
            if let BlockItem::Statement(s) = item {
                self.collect_statement(s, declared, referenced);
            }
        }
    }

    fn collect_statement<'a>(
        &mut self,
        stmt: &'a Statement,
        declared: &mut HashSet<&'a str>,
        referenced: &mut HashSet<&'a str>,
    ) {
        match stmt {
            Statement::Labeled { name, body } => {
                self.declare_label(name, declared);
                self.collect_statement(body, declared, referenced);
            }
            Statement::Goto(name) => {
                referenced.insert(name.as_str());
            }
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.collect_statement(then_branch, declared, referenced);
                if let Some(e) = else_branch {
                    self.collect_statement(e, declared, referenced);
                }
            }
            Statement::Compound(block) => self.collect_block(block, declared, referenced),
            Statement::While { body, .. }
            | Statement::DoWhile { body, .. }
            | Statement::For { body, .. }
            | Statement::Switch { body, .. }
            | Statement::Case { body, .. }
            | Statement::Default { body, .. } => self.collect_statement(body, declared, referenced),
            Statement::Return(_)
            | Statement::Expr(_)
            | Statement::Null
            | Statement::Break(_)
            | Statement::Continue(_) => {}
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
    fn goto_to_undeclared_label_is_an_error() {
        let program = program_with(vec![BlockItem::Statement(Statement::Goto("l".into()))]);
        let diags = GotoResolver::new().resolve(&program);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn goto_to_declared_label_is_fine() {
        let program = program_with(vec![
            BlockItem::Statement(Statement::Goto("l".into())),
            BlockItem::Statement(Statement::Labeled {
                name: "l".into(),
                body: Box::new(Statement::Null),
            }),
        ]);
        let diags = GotoResolver::new().resolve(&program);
        assert!(diags.is_empty());
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let program = program_with(vec![
            BlockItem::Statement(Statement::Labeled {
                name: "l".into(),
                body: Box::new(Statement::Null),
            }),
            BlockItem::Statement(Statement::Labeled {
                name: "l".into(),
                body: Box::new(Statement::Null),
            }),
        ]);
        let diags = GotoResolver::new().resolve(&program);
        assert_eq!(diags.len(), 1);
    }
}

//! Stage I: lowers the type-checked AST into the linear IR.
//!
//! Runs after every semantic-analysis pass, so every label (loop/switch/case/
//! goto) is already resolved and every expression already carries a [`Type`].
//! Short-circuit `&&`/`||`, compound assignment, `++`/`--`, the ternary
//! operator, and `switch` are all expanded here into jumps and temporaries;
//! later stages see only straight-line instructions.

use crate::ast::{self, *};
use crate::ir::{Function, Instruction, Program as IrProgram, StaticVariable, TopLevel, Value};
use crate::types::{IdentifierAttrs, InitialValue, StaticInit, Symbol, SymbolTable, Type};

pub struct IrGen<'a> {
    symbols: &'a mut SymbolTable,
    temp_counter: usize,
    label_counter: usize,
    body: Vec<Instruction>,
}

impl<'a> IrGen<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        IrGen {
            symbols,
            temp_counter: 0,
            label_counter: 0,
            body: Vec::new(),
        }
    }

    pub fn generate(symbols: &mut SymbolTable, program: &ast::Program) -> IrProgram {
        let mut top_level = Vec::new();
        for decl in &program.declarations {
            match decl {
                Declaration::Function(f) if f.body.is_some() => {
                    let mut gen = IrGen::new(symbols);
                    top_level.push(TopLevel::Function(gen.lower_function(f)));
                }
                Declaration::Function(_) => {}
                Declaration::Variable(_) => {}
            }
        }
        for (name, symbol) in symbols_snapshot(symbols) {
            if let IdentifierAttrs::Static {
                initial: InitialValue::Initial(init),
                global,
            } = &symbol.attrs
            {
                top_level.push(TopLevel::StaticVariable(StaticVariable {
                    name,
                    global: *global,
                    ty: symbol.ty.clone(),
                    init: init.clone(),
                }));
            } else if let IdentifierAttrs::Static {
                initial: InitialValue::Tentative,
                global,
            } = &symbol.attrs
            {
                top_level.push(TopLevel::StaticVariable(StaticVariable {
                    name,
                    global: *global,
                    ty: symbol.ty.clone(),
                    init: StaticInit::Zero(symbol.ty.size()),
                }));
            }
        }
        IrProgram { top_level }
    }

    fn fresh_temp(&mut self, ty: Type) -> Value {
        self.temp_counter += 1;
        let name = format!("tmp.{}", self.temp_counter);
        self.symbols.insert(
            name.clone(),
            Symbol {
                ty,
                attrs: IdentifierAttrs::Local,
            },
        );
        Value::Var(name)
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("{tag}.{}", self.label_counter)
    }

    fn emit(&mut self, instr: Instruction) {
        self.body.push(instr);
    }

    fn lower_function(&mut self, f: &FunctionDecl) -> Function {
        self.body = Vec::new();
        if let Some(body) = &f.body {
            self.lower_block(body);
        }
        // A C function falling off its closing brace without a return
        // behaves as if it returned 0 (undefined for non-int returns, but we
        // emit a harmless value so every path has a terminator).
        self.emit(Instruction::Return(Some(Value::Constant(Constant::Int(0)))));
        Function {
            name: f.name.clone(),
            global: f.storage != StorageClass::Static,
            params: f.params.clone(),
            body: std::mem::take(&mut self.body),
        }
    }

    fn lower_block(&mut self, block: &Block) {
        for item in block {
            match item {
                BlockItem::Statement(s) => self.lower_statement(s),
                BlockItem::Declaration(Declaration::Variable(v)) => self.lower_local_decl(v),
                BlockItem::Declaration(Declaration::Function(_)) => {}
            }
        }
    }

    fn lower_local_decl(&mut self, v: &VariableDecl) {
        if v.storage != StorageClass::None {
            return; // static/extern locals have no run-time initialization here
        }
        if let Some(init) = &v.init {
            let value = self.lower_expr(init);
            self.emit(Instruction::Copy {
                src: value,
                dst: Value::Var(v.name.clone()),
            });
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Return(expr) => {
                let value = expr.as_ref().map(|e| self.lower_expr(e));
                self.emit(Instruction::Return(value));
            }
            Statement::Expr(e) => {
                self.lower_expr(e);
            }
            Statement::Null => {}
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            Statement::Compound(block) => self.lower_block(block),
            Statement::While { cond, body, label } => self.lower_while(cond, body, label),
            Statement::DoWhile { body, cond, label } => self.lower_do_while(body, cond, label),
            Statement::For {
                init,
                cond,
                post,
                body,
                label,
            } => self.lower_for(init, cond.as_ref(), post.as_ref(), body, label),
            Statement::Break(label) => self.emit(Instruction::Jump(label.clone())),
            Statement::Continue(label) => self.emit(Instruction::Jump(label.clone())),
            Statement::Switch {
                expr,
                body,
                cases,
                has_default,
                label,
            } => self.lower_switch(expr, body, cases, *has_default, label),
            Statement::Case { body, label, .. } => {
                self.emit(Instruction::Label(label.clone()));
                self.lower_statement(body);
            }
            Statement::Default { body, label } => {
                self.emit(Instruction::Label(label.clone()));
                self.lower_statement(body);
            }
            Statement::Labeled { name, body } => {
                self.emit(Instruction::Label(name.clone()));
                self.lower_statement(body);
            }
            Statement::Goto(name) => self.emit(Instruction::Jump(name.clone())),
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &Statement, else_branch: Option<&Statement>) {
        let cond_val = self.lower_expr(cond);
        match else_branch {
            None => {
                let end = self.fresh_label("if_end");
                self.emit(Instruction::JumpIfZero {
                    cond: cond_val,
                    target: end.clone(),
                });
                self.lower_statement(then_branch);
                self.emit(Instruction::Label(end));
            }
            Some(else_branch) => {
                let else_label = self.fresh_label("if_else");
                let end = self.fresh_label("if_end");
                self.emit(Instruction::JumpIfZero {
                    cond: cond_val,
                    target: else_label.clone(),
                });
                self.lower_statement(then_branch);
                self.emit(Instruction::Jump(end.clone()));
                self.emit(Instruction::Label(else_label));
                self.lower_statement(else_branch);
                self.emit(Instruction::Label(end));
            }
        }
    }

    fn lower_while(&mut self, cond: &Expr, body: &Statement, label: &str) {
        let continue_label = format!("continue.{label}");
        let break_label = format!("break.{label}");
        self.emit(Instruction::Label(continue_label.clone()));
        let cond_val = self.lower_expr(cond);
        self.emit(Instruction::JumpIfZero {
            cond: cond_val,
            target: break_label.clone(),
        });
        self.lower_statement(body);
        self.emit(Instruction::Jump(continue_label));
        self.emit(Instruction::Label(break_label));
    }

    fn lower_do_while(&mut self, body: &Statement, cond: &Expr, label: &str) {
        let start = self.fresh_label("do_start");
        let continue_label = format!("continue.{label}");
        let break_label = format!("break.{label}");
        self.emit(Instruction::Label(start.clone()));
        self.lower_statement(body);
        self.emit(Instruction::Label(continue_label));
        let cond_val = self.lower_expr(cond);
        self.emit(Instruction::JumpIfNotZero {
            cond: cond_val,
            target: start,
        });
        self.emit(Instruction::Label(break_label));
    }

    fn lower_for(
        &mut self,
        init: &ForInit,
        cond: Option<&Expr>,
        post: Option<&Expr>,
        body: &Statement,
        label: &str,
    ) {
        match init {
            ForInit::Decl(d) => {
                if let Declaration::Variable(v) = d.as_ref() {
                    self.lower_local_decl(v);
                }
            }
            ForInit::Expr(Some(e)) => {
                self.lower_expr(e);
            }
            ForInit::Expr(None) => {}
        }
        let start = self.fresh_label("for_start");
        let continue_label = format!("continue.{label}");
        let break_label = format!("break.{label}");
        self.emit(Instruction::Label(start.clone()));
        if let Some(cond) = cond {
            let cond_val = self.lower_expr(cond);
            self.emit(Instruction::JumpIfZero {
                cond: cond_val,
                target: break_label.clone(),
            });
        }
        self.lower_statement(body);
        self.emit(Instruction::Label(continue_label));
        if let Some(post) = post {
            self.lower_expr(post);
        }
        self.emit(Instruction::Jump(start));
        self.emit(Instruction::Label(break_label));
    }

    fn lower_switch(
        &mut self,
        expr: &Expr,
        body: &Statement,
        cases: &[SwitchCase],
        has_default: bool,
        label: &str,
    ) {
        let break_label = format!("break.{label}");
        let value = self.lower_expr(expr);
        for case in cases {
            let cmp = self.fresh_temp(Type::Int);
            self.emit(Instruction::Binary {
                op: BinaryOp::Equal,
                src1: value.clone(),
                src2: Value::Constant(case.constant.clone()),
                dst: cmp.clone(),
            });
            self.emit(Instruction::JumpIfNotZero {
                cond: cmp,
                target: case.label.clone(),
            });
        }
        if has_default {
            self.emit(Instruction::Jump(format!("{label}.default")));
        } else {
            self.emit(Instruction::Jump(break_label.clone()));
        }
        self.lower_statement(body);
        self.emit(Instruction::Label(break_label));
    }

    // ------------------------------------------------------------- //
    // expressions
    // ------------------------------------------------------------- //

    fn lower_expr(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::Constant(c) => Value::Constant(c.clone()),
            ExprKind::Variable(name) => Value::Var(name.clone()),
            ExprKind::Cast(target, inner) => self.lower_cast(target, inner),
            ExprKind::Unary(op, operand) => self.lower_unary(*op, operand, expr.ty()),
            ExprKind::Binary(BinaryOp::And, l, r) => self.lower_and(l, r),
            ExprKind::Binary(BinaryOp::Or, l, r) => self.lower_or(l, r),
            ExprKind::Binary(op, l, r) => {
                let l_val = self.lower_expr(l);
                let r_val = self.lower_expr(r);
                let dst = self.fresh_temp(expr.ty().clone());
                self.emit(Instruction::Binary {
                    op: *op,
                    src1: l_val,
                    src2: r_val,
                    dst: dst.clone(),
                });
                dst
            }
            ExprKind::Assignment(op, lhs, rhs) => self.lower_assignment(*op, lhs, rhs),
            ExprKind::Conditional(c, t, e) => self.lower_conditional(c, t, e, expr.ty()),
            ExprKind::FunctionCall(name, args) => {
                let arg_vals: Vec<Value> = args.iter().map(|a| self.lower_expr(a)).collect();
                let dst = self.fresh_temp(expr.ty().clone());
                self.emit(Instruction::FunCall {
                    name: name.clone(),
                    args: arg_vals,
                    dst: dst.clone(),
                });
                dst
            }
        }
    }

    fn lvalue_name(lhs: &Expr) -> &str {
        match &lhs.kind {
            ExprKind::Variable(name) => name,
            _ => unreachable!("A1 rejects non-variable assignment targets"),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, ty: &Type) -> Value {
        match op {
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                let name = Self::lvalue_name(operand).to_string();
                let one = Value::Constant(one_of(ty));
                let bin_op = if op == UnaryOp::PreIncrement {
                    BinaryOp::Add
                } else {
                    BinaryOp::Subtract
                };
                self.emit(Instruction::Binary {
                    op: bin_op,
                    src1: Value::Var(name.clone()),
                    src2: one,
                    dst: Value::Var(name.clone()),
                });
                Value::Var(name)
            }
            UnaryOp::PostIncrement | UnaryOp::PostDecrement => {
                let name = Self::lvalue_name(operand).to_string();
                let old = self.fresh_temp(ty.clone());
                self.emit(Instruction::Copy {
                    src: Value::Var(name.clone()),
                    dst: old.clone(),
                });
                let one = Value::Constant(one_of(ty));
                let bin_op = if op == UnaryOp::PostIncrement {
                    BinaryOp::Add
                } else {
                    BinaryOp::Subtract
                };
                self.emit(Instruction::Binary {
                    op: bin_op,
                    src1: Value::Var(name.clone()),
                    src2: one,
                    dst: Value::Var(name),
                });
                old
            }
            _ => {
                let src = self.lower_expr(operand);
                let dst = self.fresh_temp(ty.clone());
                self.emit(Instruction::Unary {
                    op,
                    src,
                    dst: dst.clone(),
                });
                dst
            }
        }
    }

    fn lower_and(&mut self, l: &Expr, r: &Expr) -> Value {
        let false_label = self.fresh_label("and_false");
        let end = self.fresh_label("and_end");
        let dst = self.fresh_temp(Type::Int);
        let l_val = self.lower_expr(l);
        self.emit(Instruction::JumpIfZero {
            cond: l_val,
            target: false_label.clone(),
        });
        let r_val = self.lower_expr(r);
        self.emit(Instruction::JumpIfZero {
            cond: r_val,
            target: false_label.clone(),
        });
        self.emit(Instruction::Copy {
            src: Value::Constant(Constant::Int(1)),
            dst: dst.clone(),
        });
        self.emit(Instruction::Jump(end.clone()));
        self.emit(Instruction::Label(false_label));
        self.emit(Instruction::Copy {
            src: Value::Constant(Constant::Int(0)),
            dst: dst.clone(),
        });
        self.emit(Instruction::Label(end));
        dst
    }

    fn lower_or(&mut self, l: &Expr, r: &Expr) -> Value {
        let true_label = self.fresh_label("or_true");
        let end = self.fresh_label("or_end");
        let dst = self.fresh_temp(Type::Int);
        let l_val = self.lower_expr(l);
        self.emit(Instruction::JumpIfNotZero {
            cond: l_val,
            target: true_label.clone(),
        });
        let r_val = self.lower_expr(r);
        self.emit(Instruction::JumpIfNotZero {
            cond: r_val,
            target: true_label.clone(),
        });
        self.emit(Instruction::Copy {
            src: Value::Constant(Constant::Int(0)),
            dst: dst.clone(),
        });
        self.emit(Instruction::Jump(end.clone()));
        self.emit(Instruction::Label(true_label));
        self.emit(Instruction::Copy {
            src: Value::Constant(Constant::Int(1)),
            dst: dst.clone(),
        });
        self.emit(Instruction::Label(end));
        dst
    }

    fn lower_assignment(&mut self, op: AssignOp, lhs: &Expr, rhs: &Expr) -> Value {
        let name = Self::lvalue_name(lhs).to_string();
        match op.as_binary() {
            None => {
                let rhs_val = self.lower_expr(rhs);
                self.emit(Instruction::Copy {
                    src: rhs_val,
                    dst: Value::Var(name.clone()),
                });
            }
            Some(bin_op) => {
                let rhs_val = self.lower_expr(rhs);
                let lhs_ty = lhs.ty().clone();
                let common_ty = rhs.ty().clone();
                if common_ty == lhs_ty {
                    self.emit(Instruction::Binary {
                        op: bin_op,
                        src1: Value::Var(name.clone()),
                        src2: rhs_val,
                        dst: Value::Var(name.clone()),
                    });
                } else {
                    // Typecheck promoted the rhs to the common type but left
                    // the lvalue read at its own (narrower) type, so widen it
                    // here, perform the op at the common type, then truncate
                    // the result back before storing.
                    let widened = self.convert_value(Value::Var(name.clone()), &lhs_ty, &common_ty);
                    let tmp = self.fresh_temp(common_ty.clone());
                    self.emit(Instruction::Binary {
                        op: bin_op,
                        src1: widened,
                        src2: rhs_val,
                        dst: tmp.clone(),
                    });
                    let narrowed = self.convert_value(tmp, &common_ty, &lhs_ty);
                    self.emit(Instruction::Copy {
                        src: narrowed,
                        dst: Value::Var(name.clone()),
                    });
                }
            }
        }
        Value::Var(name)
    }

    fn lower_conditional(&mut self, c: &Expr, t: &Expr, e: &Expr, ty: &Type) -> Value {
        let else_label = self.fresh_label("cond_else");
        let end = self.fresh_label("cond_end");
        let dst = self.fresh_temp(ty.clone());
        let cond_val = self.lower_expr(c);
        self.emit(Instruction::JumpIfZero {
            cond: cond_val,
            target: else_label.clone(),
        });
        let t_val = self.lower_expr(t);
        self.emit(Instruction::Copy {
            src: t_val,
            dst: dst.clone(),
        });
        self.emit(Instruction::Jump(end.clone()));
        self.emit(Instruction::Label(else_label));
        let e_val = self.lower_expr(e);
        self.emit(Instruction::Copy {
            src: e_val,
            dst: dst.clone(),
        });
        self.emit(Instruction::Label(end));
        dst
    }

    fn lower_cast(&mut self, target: &Type, inner: &Expr) -> Value {
        let src = self.lower_expr(inner);
        self.convert_value(src, inner.ty(), target)
    }

    /// Emits the conversion instructions to reinterpret `src` (of type
    /// `src_ty`) as `target`, the way an explicit cast would. Used both for
    /// `ExprKind::Cast` and for widening/narrowing an lvalue read around a
    /// compound assignment whose promoted type differs from the lvalue's.
    fn convert_value(&mut self, src: Value, src_ty: &Type, target: &Type) -> Value {
        if src_ty == target {
            return src;
        }
        let dst = self.fresh_temp(target.clone());
        let instr = match (src_ty, target) {
            (from, Type::Double) if from.is_signed() => Instruction::IntToDouble { src, dst: dst.clone() },
            (from, Type::Double) if from.is_integer() => Instruction::UIntToDouble { src, dst: dst.clone() },
            (Type::Double, to) if to.is_signed() => Instruction::DoubleToInt { src, dst: dst.clone() },
            (Type::Double, _) => Instruction::DoubleToUInt { src, dst: dst.clone() },
            (from, to) if to.size() == from.size() => Instruction::Copy { src, dst: dst.clone() },
            (from, to) if to.size() < from.size() => Instruction::Truncate { src, dst: dst.clone() },
            (from, _) if from.is_signed() => Instruction::SignExtend { src, dst: dst.clone() },
            _ => Instruction::ZeroExtend { src, dst: dst.clone() },
        };
        self.emit(instr);
        dst
    }
}

fn one_of(ty: &Type) -> Constant {
    match ty {
        Type::Int => Constant::Int(1),
        Type::UInt => Constant::UInt(1),
        Type::Long => Constant::Long(1),
        Type::ULong => Constant::ULong(1),
        Type::Double => Constant::Double(1.0),
        Type::Function { .. } => unreachable!(),
    }
}

fn symbols_snapshot(symbols: &SymbolTable) -> Vec<(String, Symbol)> {
    let mut v: Vec<_> = symbols.iter().map(|(k, s)| (k.clone(), s.clone())).collect();
    v.sort_by(|a, b| a.0.cmp(&b.0));
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;

    fn dummy() -> SourceSpan {
        SourceSpan::new(1, 1)
    }

    fn compile_to_ir(src: &str) -> (IrProgram, SymbolTable) {
        let (tokens, lex_diags) = crate::token::Lexer::new(src).tokenize();
        assert!(lex_diags.is_empty());
        let (mut program, diags) = crate::parser::Parser::new(tokens).parse();
        assert!(diags.is_empty(), "{diags:?}");
        let diags = crate::semantic::identifier_resolution::IdentifierResolver::new().resolve(&mut program);
        assert!(diags.is_empty(), "{diags:?}");
        let diags = crate::semantic::loop_labeling::LoopLabeler::new().label(&mut program);
        assert!(diags.is_empty(), "{diags:?}");
        let diags = crate::semantic::goto_resolution::GotoResolver::new().resolve(&program);
        assert!(diags.is_empty(), "{diags:?}");
        let result = crate::semantic::typecheck::TypeChecker::new()
            .check(&mut program)
            .unwrap_or_else(|e| panic!("{e:?}"));
        let mut symbols = result.symbols;
        let diags = crate::semantic::switch_resolution::SwitchResolver::new().resolve(&mut program);
        assert!(diags.is_empty(), "{diags:?}");
        let ir = IrGen::generate(&mut symbols, &program);
        (ir, symbols)
    }

    #[test]
    fn simple_return_lowers_to_a_single_instruction() {
        let (ir, _) = compile_to_ir("int main(void) { return 2 + 3; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        assert!(matches!(f.body[0], Instruction::Binary { .. }));
        assert!(matches!(f.body[1], Instruction::Return(Some(_))));
    }

    #[test]
    fn short_circuit_and_uses_jumps_not_bitwise_and() {
        let (ir, _) = compile_to_ir("int main(void) { int a; int b; return a && b; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        assert!(f.body.iter().any(|i| matches!(i, Instruction::JumpIfZero { .. })));
        assert!(!f
            .body
            .iter()
            .any(|i| matches!(i, Instruction::Binary { op: BinaryOp::BitAnd, .. })));
    }

    #[test]
    fn while_loop_continue_jumps_to_the_condition_check() {
        let (ir, _) = compile_to_ir("int main(void) { while (1) { continue; } return 0; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        let Instruction::Label(first) = &f.body[0] else {
            panic!("expected a label")
        };
        assert!(first.starts_with("continue.loop."));
    }

    #[test]
    fn static_variable_with_initializer_becomes_a_top_level_static() {
        let (ir, _) = compile_to_ir("int x = 5; int main(void) { return x; }");
        assert!(ir.top_level.iter().any(|t| matches!(
            t,
            TopLevel::StaticVariable(s) if s.name == "x" && s.init == StaticInit::Int(5)
        )));
    }

    #[test]
    fn cast_between_equal_size_integers_is_a_copy() {
        let (ir, _) = compile_to_ir("int main(void) { unsigned int u = 1u; return (int)u; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        assert!(f.body.iter().any(|i| matches!(i, Instruction::Copy { .. })));
    }

    #[test]
    fn switch_lowers_to_comparisons_and_jumps() {
        let (ir, _) = compile_to_ir(
            "int main(void) { int x = 1; switch (x) { case 1: return 1; default: return 0; } }",
        );
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        assert!(f
            .body
            .iter()
            .any(|i| matches!(i, Instruction::Binary { op: BinaryOp::Equal, .. })));
        let _ = dummy();
    }
}

//! Stage S: instruction selection. Lowers the linear IR into the abstract
//! x86-64 tree, one IR instruction at a time, with pseudo-registers standing
//! in for every variable. Stage R replaces the pseudos with real stack slots.

use crate::asm::*;
use crate::ast::{BinaryOp as AstBinaryOp, Constant, UnaryOp as AstUnaryOp};
use crate::ir;
use crate::types::{SymbolTable, Type};

pub struct StaticConstants {
    next_id: usize,
    pub constants: Vec<StaticConstant>,
}

impl StaticConstants {
    fn new() -> Self {
        StaticConstants {
            next_id: 0,
            constants: Vec::new(),
        }
    }

    fn intern(&mut self, bits: u64, alignment: u32) -> String {
        for c in &self.constants {
            if c.value == bits && c.alignment == alignment {
                return c.name.clone();
            }
        }
        self.next_id += 1;
        let name = format!("static_const.{}", self.next_id);
        self.constants.push(StaticConstant {
            name: name.clone(),
            alignment,
            value: bits,
        });
        name
    }

    /// The mask with only the sign bit set, for `double` negation (`xorpd`).
    fn negate_double_mask(&mut self) -> String {
        self.intern(0x8000_0000_0000_0000, 16)
    }

    /// `2^63` as a double, the pivot used by the unsigned long <-> double
    /// conversion sequences.
    fn upper_bound_double(&mut self) -> String {
        self.intern((2f64.powi(63)).to_bits(), 8)
    }
}

fn asm_type(ty: &Type) -> AsmType {
    match ty {
        Type::Int | Type::UInt => AsmType::Longword,
        Type::Long | Type::ULong => AsmType::Quadword,
        Type::Double => AsmType::Double,
        Type::Function { .. } => unreachable!("functions have no asm type"),
    }
}

const INT_ARG_REGS: [Reg; 6] = [Reg::Di, Reg::Si, Reg::Dx, Reg::Cx, Reg::R8, Reg::R9];
const DOUBLE_ARG_REGS: [Reg; 8] = [
    Reg::Xmm0,
    Reg::Xmm1,
    Reg::Xmm2,
    Reg::Xmm3,
    Reg::Xmm4,
    Reg::Xmm5,
    Reg::Xmm6,
    Reg::Xmm7,
];

pub fn select(ir: &ir::Program, symbols: &SymbolTable) -> Program {
    let mut consts = StaticConstants::new();
    let mut top_level = Vec::new();
    for item in &ir.top_level {
        match item {
            ir::TopLevel::Function(f) => top_level.push(TopLevel::Function(select_function(f, symbols, &mut consts))),
            ir::TopLevel::StaticVariable(v) => top_level.push(TopLevel::StaticVariable(StaticVariable {
                name: v.name.clone(),
                global: v.global,
                alignment: v.ty.alignment(),
                init: v.init.clone(),
            })),
        }
    }
    for c in consts.constants {
        top_level.push(TopLevel::StaticConstant(c));
    }
    Program { top_level }
}

struct Selector<'a> {
    symbols: &'a SymbolTable,
    consts: &'a mut StaticConstants,
    out: Vec<Instruction>,
    label_counter: usize,
}

fn select_function(f: &ir::Function, symbols: &SymbolTable, consts: &mut StaticConstants) -> Function {
    let mut sel = Selector {
        symbols,
        consts,
        out: Vec::new(),
        label_counter: 0,
    };

    let (int_params, double_params): (Vec<_>, Vec<_>) = f
        .params
        .iter()
        .partition(|p| !value_type(symbols, p).is_double());
    for (i, name) in int_params.iter().enumerate() {
        let ty = asm_type(&value_type(symbols, name));
        if i < INT_ARG_REGS.len() {
            sel.out.push(Instruction::Mov {
                ty,
                src: Operand::Register(INT_ARG_REGS[i]),
                dst: Operand::Pseudo((*name).clone()),
            });
        } else {
            let stack_index = i - INT_ARG_REGS.len();
            sel.out.push(Instruction::Mov {
                ty,
                src: Operand::Stack(16 + 8 * stack_index as i64),
                dst: Operand::Pseudo((*name).clone()),
            });
        }
    }
    for (i, name) in double_params.iter().enumerate() {
        if i < DOUBLE_ARG_REGS.len() {
            sel.out.push(Instruction::Mov {
                ty: AsmType::Double,
                src: Operand::Register(DOUBLE_ARG_REGS[i]),
                dst: Operand::Pseudo((*name).clone()),
            });
        } else {
            let stack_index = i - DOUBLE_ARG_REGS.len();
            sel.out.push(Instruction::Mov {
                ty: AsmType::Double,
                src: Operand::Stack(16 + 8 * stack_index as i64),
                dst: Operand::Pseudo((*name).clone()),
            });
        }
    }

    for instr in &f.body {
        sel.select_instruction(instr);
    }

    Function {
        name: f.name.clone(),
        global: f.global,
        instructions: sel.out,
        stack_size: 0,
    }
}

fn value_type(symbols: &SymbolTable, name: &str) -> Type {
    symbols
        .get(name)
        .unwrap_or_else(|| panic!("'{name}' missing from the symbol table"))
        .ty
        .clone()
}

impl<'a> Selector<'a> {
    fn ty_of(&self, v: &ir::Value) -> Type {
        v.ty(self.symbols)
    }

    fn operand(&mut self, v: &ir::Value) -> Operand {
        match v {
            ir::Value::Constant(Constant::Double(d)) => {
                let name = self.consts.intern(d.to_bits(), 8);
                Operand::Data(name)
            }
            ir::Value::Constant(c) => Operand::Imm(c.as_u64()),
            ir::Value::Var(name) => Operand::Pseudo(name.clone()),
        }
    }

    fn emit(&mut self, i: Instruction) {
        self.out.push(i);
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("{tag}.{}", self.label_counter)
    }

    fn select_instruction(&mut self, instr: &ir::Instruction) {
        match instr {
            ir::Instruction::Return(value) => {
                if let Some(v) = value {
                    let ty = self.ty_of(v);
                    let src = self.operand(v);
                    let dst = if ty.is_double() {
                        Operand::Register(Reg::Xmm0)
                    } else {
                        Operand::Register(Reg::Ax)
                    };
                    self.emit(Instruction::Mov {
                        ty: asm_type(&ty),
                        src,
                        dst,
                    });
                }
                self.emit(Instruction::Ret);
            }
            ir::Instruction::Copy { src, dst } => {
                let ty = asm_type(&self.ty_of(dst));
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::Mov { ty, src, dst });
            }
            ir::Instruction::Unary { op, src, dst } => self.select_unary(*op, src, dst),
            ir::Instruction::Binary { op, src1, src2, dst } => self.select_binary(*op, src1, src2, dst),
            ir::Instruction::Jump(label) => self.emit(Instruction::Jmp(label.clone())),
            ir::Instruction::Label(label) => self.emit(Instruction::Label(label.clone())),
            ir::Instruction::JumpIfZero { cond, target } => self.select_jump_cc(cond, target, false),
            ir::Instruction::JumpIfNotZero { cond, target } => self.select_jump_cc(cond, target, true),
            ir::Instruction::FunCall { name, args, dst } => self.select_call(name, args, dst),
            ir::Instruction::SignExtend { src, dst } => {
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::Movsx { src, dst });
            }
            ir::Instruction::ZeroExtend { src, dst } => {
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::MovZeroExtend { src, dst });
            }
            ir::Instruction::Truncate { src, dst } => {
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::Mov {
                    ty: AsmType::Longword,
                    src,
                    dst,
                });
            }
            ir::Instruction::IntToDouble { src, dst } => {
                let src_ty = asm_type(&self.ty_of(src));
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::Cvtsi2sd { src_ty, src, dst });
            }
            ir::Instruction::DoubleToInt { src, dst } => {
                let dst_ty = asm_type(&self.ty_of(dst));
                let src = self.operand(src);
                let dst = self.operand(dst);
                self.emit(Instruction::Cvttsd2si { dst_ty, src, dst });
            }
            ir::Instruction::UIntToDouble { src, dst } => self.select_uint_to_double(src, dst),
            ir::Instruction::DoubleToUInt { src, dst } => self.select_double_to_uint(src, dst),
        }
    }

    fn select_unary(&mut self, op: AstUnaryOp, src: &ir::Value, dst: &ir::Value) {
        let ty = self.ty_of(src);
        let src_op = self.operand(src);
        let dst_op = self.operand(dst);
        match op {
            AstUnaryOp::Not => {
                let zero = if ty.is_double() {
                    let name = self.consts.intern(0, 8);
                    Operand::Data(name)
                } else {
                    Operand::Imm(0)
                };
                let cmp_ty = if ty.is_double() { AsmType::Double } else { asm_type(&ty) };
                self.emit(Instruction::Cmp {
                    ty: cmp_ty,
                    src: zero,
                    dst: src_op,
                });
                self.emit(Instruction::Mov {
                    ty: AsmType::Longword,
                    src: Operand::Imm(0),
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::SetCC(CondCode::E, dst_op));
            }
            AstUnaryOp::Negate if ty.is_double() => {
                let mask = self.consts.negate_double_mask();
                self.emit(Instruction::Mov {
                    ty: AsmType::Double,
                    src: src_op,
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::Binary {
                    op: BinaryOp::Xor,
                    ty: AsmType::Double,
                    src: Operand::Data(mask),
                    dst: dst_op,
                });
            }
            AstUnaryOp::Negate => {
                self.emit(Instruction::Mov {
                    ty: asm_type(&ty),
                    src: src_op,
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::Unary {
                    op: UnaryOp::Neg,
                    ty: asm_type(&ty),
                    operand: dst_op,
                });
            }
            AstUnaryOp::Complement => {
                self.emit(Instruction::Mov {
                    ty: asm_type(&ty),
                    src: src_op,
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::Unary {
                    op: UnaryOp::Not,
                    ty: asm_type(&ty),
                    operand: dst_op,
                });
            }
            AstUnaryOp::PreIncrement
            | AstUnaryOp::PreDecrement
            | AstUnaryOp::PostIncrement
            | AstUnaryOp::PostDecrement => unreachable!("expanded away during IR generation"),
        }
    }

    /// `comisd` is unordered on NaN: it sets ZF=PF=CF=1 rather than leaving
    /// ZF meaningfully comparable. `sete`/`setne` alone would report NaN as
    /// equal. Branch on the parity flag first so an unordered comparison
    /// short-circuits to the mandated result (false for `==`, true for
    /// `!=`) instead of falling through to `sete`/`setne`.
    fn select_double_equality(&mut self, op: AstBinaryOp, src1_op: Operand, src2_op: Operand, dst_op: Operand) {
        self.emit(Instruction::Cmp {
            ty: AsmType::Double,
            src: src2_op,
            dst: src1_op,
        });
        let end = self.fresh_label("dblcmp.end");
        match op {
            AstBinaryOp::Equal => {
                self.emit(Instruction::Mov {
                    ty: AsmType::Longword,
                    src: Operand::Imm(0),
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::JmpCC(CondCode::P, end.clone()));
                self.emit(Instruction::SetCC(CondCode::E, dst_op));
            }
            AstBinaryOp::NotEqual => {
                self.emit(Instruction::Mov {
                    ty: AsmType::Longword,
                    src: Operand::Imm(1),
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::JmpCC(CondCode::P, end.clone()));
                self.emit(Instruction::SetCC(CondCode::Ne, dst_op));
            }
            _ => unreachable!("only == and != reach select_double_equality"),
        }
        self.emit(Instruction::Label(end));
    }

    fn select_binary(&mut self, op: AstBinaryOp, src1: &ir::Value, src2: &ir::Value, dst: &ir::Value) {
        let ty = self.ty_of(src1);
        let asm_ty = asm_type(&ty);
        let src1_op = self.operand(src1);
        let src2_op = self.operand(src2);
        let dst_op = self.operand(dst);

        if ty.is_double() && matches!(op, AstBinaryOp::Equal | AstBinaryOp::NotEqual) {
            self.select_double_equality(op, src1_op, src2_op, dst_op);
            return;
        }

        if op.is_relational() {
            let cc = relational_cc(op, ty.is_signed() && !ty.is_double());
            let cmp_ty = if ty.is_double() { AsmType::Double } else { asm_ty };
            self.emit(Instruction::Cmp {
                ty: cmp_ty,
                src: src2_op,
                dst: src1_op,
            });
            self.emit(Instruction::Mov {
                ty: AsmType::Longword,
                src: Operand::Imm(0),
                dst: dst_op.clone(),
            });
            self.emit(Instruction::SetCC(cc, dst_op));
            return;
        }

        match op {
            AstBinaryOp::Divide if ty.is_double() => {
                self.emit(Instruction::Mov {
                    ty: AsmType::Double,
                    src: src1_op,
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::Binary {
                    op: BinaryOp::DivDouble,
                    ty: AsmType::Double,
                    src: src2_op,
                    dst: dst_op,
                });
            }
            AstBinaryOp::Divide | AstBinaryOp::Remainder => {
                let result_reg = if op == AstBinaryOp::Divide { Reg::Ax } else { Reg::Dx };
                self.emit(Instruction::Mov {
                    ty: asm_ty,
                    src: src1_op,
                    dst: Operand::Register(Reg::Ax),
                });
                if ty.is_signed() {
                    self.emit(if asm_ty == AsmType::Quadword {
                        Instruction::Cqo
                    } else {
                        Instruction::Cdq
                    });
                    self.emit(Instruction::Idiv { ty: asm_ty, operand: src2_op });
                } else {
                    self.emit(Instruction::Mov {
                        ty: asm_ty,
                        src: Operand::Imm(0),
                        dst: Operand::Register(Reg::Dx),
                    });
                    self.emit(Instruction::Div { ty: asm_ty, operand: src2_op });
                }
                self.emit(Instruction::Mov {
                    ty: asm_ty,
                    src: Operand::Register(result_reg),
                    dst: dst_op,
                });
            }
            AstBinaryOp::ShiftLeft | AstBinaryOp::ShiftRight => {
                self.emit(Instruction::Mov {
                    ty: asm_ty,
                    src: src1_op,
                    dst: dst_op.clone(),
                });
                let shift_op = if op == AstBinaryOp::ShiftLeft {
                    BinaryOp::Shl
                } else if ty.is_signed() {
                    BinaryOp::Sar
                } else {
                    BinaryOp::Shr
                };
                self.emit(Instruction::Binary {
                    op: shift_op,
                    ty: asm_ty,
                    src: src2_op,
                    dst: dst_op,
                });
            }
            _ => {
                let bin_ty = if ty.is_double() { AsmType::Double } else { asm_ty };
                self.emit(Instruction::Mov {
                    ty: bin_ty,
                    src: src1_op,
                    dst: dst_op.clone(),
                });
                self.emit(Instruction::Binary {
                    op: arithmetic_op(op),
                    ty: bin_ty,
                    src: src2_op,
                    dst: dst_op,
                });
            }
        }
    }

    fn select_jump_cc(&mut self, cond: &ir::Value, target: &str, jump_if_true: bool) {
        let ty = self.ty_of(cond);
        let cond_op = self.operand(cond);
        let zero = if ty.is_double() {
            let name = self.consts.intern(0, 8);
            Operand::Data(name)
        } else {
            Operand::Imm(0)
        };
        let cmp_ty = if ty.is_double() { AsmType::Double } else { asm_type(&ty) };
        self.emit(Instruction::Cmp {
            ty: cmp_ty,
            src: zero,
            dst: cond_op,
        });
        let cc = if jump_if_true { CondCode::Ne } else { CondCode::E };
        self.emit(Instruction::JmpCC(cc, target.to_string()));
    }

    fn select_call(&mut self, name: &str, args: &[ir::Value], dst: &ir::Value) {
        let (int_args, double_args): (Vec<_>, Vec<_>) = args.iter().partition(|a| !self.ty_of(a).is_double());
        let stack_args: Vec<_> = int_args
            .iter()
            .skip(INT_ARG_REGS.len())
            .chain(double_args.iter().skip(DOUBLE_ARG_REGS.len()))
            .collect();
        let needs_padding = stack_args.len() % 2 != 0;
        if needs_padding {
            self.emit(Instruction::Binary {
                op: BinaryOp::Sub,
                ty: AsmType::Quadword,
                src: Operand::Imm(8),
                dst: Operand::Register(Reg::Sp),
            });
        }

        for (i, arg) in int_args.iter().enumerate().take(INT_ARG_REGS.len()) {
            let ty = asm_type(&self.ty_of(arg));
            let src = self.operand(arg);
            self.emit(Instruction::Mov {
                ty,
                src,
                dst: Operand::Register(INT_ARG_REGS[i]),
            });
        }
        for (i, arg) in double_args.iter().enumerate().take(DOUBLE_ARG_REGS.len()) {
            let src = self.operand(arg);
            self.emit(Instruction::Mov {
                ty: AsmType::Double,
                src,
                dst: Operand::Register(DOUBLE_ARG_REGS[i]),
            });
        }
        for arg in stack_args.iter().rev() {
            let ty = self.ty_of(arg);
            let src = self.operand(arg);
            match &src {
                Operand::Register(_) | Operand::Imm(_) if asm_type(&ty) == AsmType::Quadword || ty.is_double() => {
                    self.emit(Instruction::Push(src));
                }
                _ => {
                    // 4-byte or pseudo operands are widened to 8 bytes via
                    // %rax before being pushed, since `push` only moves full
                    // quadwords.
                    self.emit(Instruction::Mov {
                        ty: asm_type(&ty),
                        src,
                        dst: Operand::Register(Reg::Ax),
                    });
                    self.emit(Instruction::Push(Operand::Register(Reg::Ax)));
                }
            }
        }

        self.emit(Instruction::Call(name.to_string()));

        let bytes_to_remove = 8 * stack_args.len() as i64 + if needs_padding { 8 } else { 0 };
        if bytes_to_remove > 0 {
            self.emit(Instruction::Binary {
                op: BinaryOp::Add,
                ty: AsmType::Quadword,
                src: Operand::Imm(bytes_to_remove as u64),
                dst: Operand::Register(Reg::Sp),
            });
        }

        let ret_ty = self.ty_of(dst);
        let dst_op = self.operand(dst);
        let ret_reg = if ret_ty.is_double() { Reg::Xmm0 } else { Reg::Ax };
        self.emit(Instruction::Mov {
            ty: asm_type(&ret_ty),
            src: Operand::Register(ret_reg),
            dst: dst_op,
        });
    }

    fn select_uint_to_double(&mut self, src: &ir::Value, dst: &ir::Value) {
        let src_ty = self.ty_of(src);
        let src_op = self.operand(src);
        let dst_op = self.operand(dst);
        if src_ty.size() == 4 {
            // A 32-bit unsigned value always fits in a signed 64-bit
            // register: zero-extend, then convert as signed.
            self.emit(Instruction::MovZeroExtend {
                src: src_op,
                dst: Operand::Register(Reg::Ax),
            });
            self.emit(Instruction::Cvtsi2sd {
                src_ty: AsmType::Quadword,
                src: Operand::Register(Reg::Ax),
                dst: dst_op,
            });
            return;
        }
        // ulong -> double: if the high bit is clear, it fits as signed.
        // Otherwise halve it with a round-to-odd shift, convert, then double
        // the result.
        let label_out_of_range = self.fresh_label("u2d_oor");
        let label_end = self.fresh_label("u2d_end");
        self.emit(Instruction::Cmp {
            ty: AsmType::Quadword,
            src: Operand::Imm(0),
            dst: src_op.clone(),
        });
        self.emit(Instruction::JmpCC(CondCode::L, label_out_of_range.clone()));
        self.emit(Instruction::Cvtsi2sd {
            src_ty: AsmType::Quadword,
            src: src_op.clone(),
            dst: dst_op.clone(),
        });
        self.emit(Instruction::Jmp(label_end.clone()));
        self.emit(Instruction::Label(label_out_of_range));
        self.emit(Instruction::Mov {
            ty: AsmType::Quadword,
            src: src_op,
            dst: Operand::Register(Reg::Ax),
        });
        self.emit(Instruction::Mov {
            ty: AsmType::Quadword,
            src: Operand::Register(Reg::Ax),
            dst: Operand::Register(Reg::Dx),
        });
        self.emit(Instruction::Unary {
            op: UnaryOp::Not,
            ty: AsmType::Quadword,
            operand: Operand::Register(Reg::Ax),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::Shr,
            ty: AsmType::Quadword,
            src: Operand::Imm(1),
            dst: Operand::Register(Reg::Dx),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::And,
            ty: AsmType::Quadword,
            src: Operand::Imm(1),
            dst: Operand::Register(Reg::Ax),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::Or,
            ty: AsmType::Quadword,
            src: Operand::Register(Reg::Ax),
            dst: Operand::Register(Reg::Dx),
        });
        self.emit(Instruction::Cvtsi2sd {
            src_ty: AsmType::Quadword,
            src: Operand::Register(Reg::Dx),
            dst: dst_op.clone(),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::Add,
            ty: AsmType::Double,
            src: dst_op.clone(),
            dst: dst_op,
        });
        self.emit(Instruction::Label(label_end));
    }

    fn select_double_to_uint(&mut self, src: &ir::Value, dst: &ir::Value) {
        let dst_ty = self.ty_of(dst);
        let src_op = self.operand(src);
        let dst_op = self.operand(dst);
        if dst_ty.size() == 4 {
            // Widen through a 64-bit signed conversion; every u32 fits.
            self.emit(Instruction::Cvttsd2si {
                dst_ty: AsmType::Quadword,
                src: src_op,
                dst: Operand::Register(Reg::Ax),
            });
            self.emit(Instruction::Mov {
                ty: AsmType::Longword,
                src: Operand::Register(Reg::Ax),
                dst: dst_op,
            });
            return;
        }
        // double -> ulong: if below 2^63, convert directly as signed;
        // otherwise subtract the pivot, convert, and add back 2^63 as an
        // unsigned bit pattern.
        let upper_bound = self.consts.upper_bound_double();
        let label_above = self.fresh_label("d2u_above");
        let label_end = self.fresh_label("d2u_end");
        self.emit(Instruction::Cmp {
            ty: AsmType::Double,
            src: Operand::Data(upper_bound.clone()),
            dst: src_op.clone(),
        });
        self.emit(Instruction::JmpCC(CondCode::Ae, label_above.clone()));
        self.emit(Instruction::Cvttsd2si {
            dst_ty: AsmType::Quadword,
            src: src_op.clone(),
            dst: dst_op.clone(),
        });
        self.emit(Instruction::Jmp(label_end.clone()));
        self.emit(Instruction::Label(label_above));
        self.emit(Instruction::Mov {
            ty: AsmType::Double,
            src: src_op,
            dst: Operand::Register(Reg::Xmm1),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::Sub,
            ty: AsmType::Double,
            src: Operand::Data(upper_bound),
            dst: Operand::Register(Reg::Xmm1),
        });
        self.emit(Instruction::Cvttsd2si {
            dst_ty: AsmType::Quadword,
            src: Operand::Register(Reg::Xmm1),
            dst: dst_op.clone(),
        });
        self.emit(Instruction::Mov {
            ty: AsmType::Quadword,
            src: Operand::Imm(1u64 << 63),
            dst: Operand::Register(Reg::Ax),
        });
        self.emit(Instruction::Binary {
            op: BinaryOp::Add,
            ty: AsmType::Quadword,
            src: Operand::Register(Reg::Ax),
            dst: dst_op,
        });
        self.emit(Instruction::Label(label_end));
    }
}

fn arithmetic_op(op: AstBinaryOp) -> BinaryOp {
    match op {
        AstBinaryOp::Add => BinaryOp::Add,
        AstBinaryOp::Subtract => BinaryOp::Sub,
        AstBinaryOp::Multiply => BinaryOp::Mult,
        AstBinaryOp::BitAnd => BinaryOp::And,
        AstBinaryOp::BitOr => BinaryOp::Or,
        AstBinaryOp::BitXor => BinaryOp::Xor,
        _ => unreachable!("not a plain arithmetic/bitwise operator"),
    }
}

fn relational_cc(op: AstBinaryOp, signed: bool) -> CondCode {
    use AstBinaryOp::*;
    match (op, signed) {
        (Equal, _) => CondCode::E,
        (NotEqual, _) => CondCode::Ne,
        (Less, true) => CondCode::L,
        (Less, false) => CondCode::B,
        (LessEqual, true) => CondCode::Le,
        (LessEqual, false) => CondCode::Be,
        (Greater, true) => CondCode::G,
        (Greater, false) => CondCode::A,
        (GreaterEqual, true) => CondCode::Ge,
        (GreaterEqual, false) => CondCode::Ae,
        _ => unreachable!("not a relational operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Instruction as IrInstr, TopLevel as IrTopLevel, Value};
    use crate::types::{IdentifierAttrs, Symbol};

    fn symbols_with(vars: &[(&str, Type)]) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (name, ty) in vars {
            table.insert(
                (*name).to_string(),
                Symbol {
                    ty: ty.clone(),
                    attrs: IdentifierAttrs::Local,
                },
            );
        }
        table
    }

    #[test]
    fn return_constant_moves_into_eax() {
        let symbols = symbols_with(&[]);
        let ir = ir::Program {
            top_level: vec![IrTopLevel::Function(Function {
                name: "main".into(),
                global: true,
                params: vec![],
                body: vec![IrInstr::Return(Some(Value::Constant(Constant::Int(5))))],
            })],
        };
        let asm = select(&ir, &symbols);
        let TopLevel::Function(f) = &asm.top_level[0] else {
            panic!()
        };
        assert!(matches!(
            f.instructions[0],
            Instruction::Mov {
                dst: Operand::Register(Reg::Ax),
                ..
            }
        ));
        assert_eq!(f.instructions[1], Instruction::Ret);
    }

    #[test]
    fn signed_division_uses_cdq_and_idiv() {
        let symbols = symbols_with(&[("a", Type::Int), ("b", Type::Int), ("q", Type::Int)]);
        let ir = ir::Program {
            top_level: vec![IrTopLevel::Function(Function {
                name: "main".into(),
                global: true,
                params: vec![],
                body: vec![IrInstr::Binary {
                    op: AstBinaryOp::Divide,
                    src1: Value::Var("a".into()),
                    src2: Value::Var("b".into()),
                    dst: Value::Var("q".into()),
                }],
            })],
        };
        let asm = select(&ir, &symbols);
        let TopLevel::Function(f) = &asm.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(i, Instruction::Cdq)));
        assert!(f.instructions.iter().any(|i| matches!(i, Instruction::Idiv { .. })));
    }

    #[test]
    fn unsigned_division_zeroes_edx_instead_of_sign_extending() {
        let symbols = symbols_with(&[("a", Type::UInt), ("b", Type::UInt), ("q", Type::UInt)]);
        let ir = ir::Program {
            top_level: vec![IrTopLevel::Function(Function {
                name: "main".into(),
                global: true,
                params: vec![],
                body: vec![IrInstr::Binary {
                    op: AstBinaryOp::Divide,
                    src1: Value::Var("a".into()),
                    src2: Value::Var("b".into()),
                    dst: Value::Var("q".into()),
                }],
            })],
        };
        let asm = select(&ir, &symbols);
        let TopLevel::Function(f) = &asm.top_level[0] else {
            panic!()
        };
        assert!(!f.instructions.iter().any(|i| matches!(i, Instruction::Cdq)));
        assert!(f.instructions.iter().any(|i| matches!(i, Instruction::Div { .. })));
    }

    #[test]
    fn double_literal_operands_are_promoted_to_static_constants() {
        let symbols = symbols_with(&[]);
        let ir = ir::Program {
            top_level: vec![IrTopLevel::Function(Function {
                name: "main".into(),
                global: true,
                params: vec![],
                body: vec![IrInstr::Return(Some(Value::Constant(Constant::Double(1.5))))],
            })],
        };
        let asm = select(&ir, &symbols);
        assert!(asm
            .top_level
            .iter()
            .any(|t| matches!(t, TopLevel::StaticConstant(_))));
    }

    #[test]
    fn double_equality_branches_on_the_parity_flag() {
        let symbols = symbols_with(&[("a", Type::Double), ("b", Type::Double), ("eq", Type::Int)]);
        let ir = ir::Program {
            top_level: vec![IrTopLevel::Function(Function {
                name: "main".into(),
                global: true,
                params: vec![],
                body: vec![IrInstr::Binary {
                    op: AstBinaryOp::Equal,
                    src1: Value::Var("a".into()),
                    src2: Value::Var("b".into()),
                    dst: Value::Var("eq".into()),
                }],
            })],
        };
        let asm = select(&ir, &symbols);
        let TopLevel::Function(f) = &asm.top_level[0] else {
            panic!()
        };
        assert!(f
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::JmpCC(CondCode::P, _))));
        assert!(f
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::SetCC(CondCode::E, _))));
    }
}

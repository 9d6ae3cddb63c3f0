//! Stage F: legalizes instructions that violate x86-64 operand constraints
//! and prepends the function prologue now that stack_size is known.
//!
//! Mirrors the constraints worked out from the original codegen's
//! instruction-fixup pass: no instruction may read two memory operands, a
//! few instructions require a register operand specifically, and `imul`
//! refuses a memory destination.

use crate::asm::*;

const SCRATCH_INT: Reg = Reg::R10;
const SCRATCH_INT2: Reg = Reg::R11;
const SCRATCH_DOUBLE: Reg = Reg::Xmm14;
const SCRATCH_DOUBLE2: Reg = Reg::Xmm15;

pub fn fixup(program: &mut Program) {
    for item in &mut program.top_level {
        if let TopLevel::Function(f) = item {
            fixup_function(f);
        }
    }
}

fn is_memory(op: &Operand) -> bool {
    matches!(op, Operand::Stack(_) | Operand::Data(_))
}

fn fixup_function(f: &mut Function) {
    let rounded = ((f.stack_size + 15) / 16) * 16;
    f.stack_size = rounded;

    let mut out = Vec::with_capacity(f.instructions.len() + 2);
    out.push(Instruction::Push(Operand::Register(Reg::Bp)));
    out.push(Instruction::Mov {
        ty: AsmType::Quadword,
        src: Operand::Register(Reg::Sp),
        dst: Operand::Register(Reg::Bp),
    });
    if rounded > 0 {
        out.push(Instruction::Binary {
            op: BinaryOp::Sub,
            ty: AsmType::Quadword,
            src: Operand::Imm(rounded as u64),
            dst: Operand::Register(Reg::Sp),
        });
    }

    for instr in f.instructions.drain(..) {
        fixup_instruction(instr, &mut out);
    }

    f.instructions = out;
}

fn fixup_instruction(instr: Instruction, out: &mut Vec<Instruction>) {
    match instr {
        Instruction::Mov { ty, src, dst } if ty == AsmType::Double => {
            if is_memory(&src) && is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_DOUBLE),
                });
                out.push(Instruction::Mov {
                    ty,
                    src: Operand::Register(SCRATCH_DOUBLE),
                    dst,
                });
            } else {
                out.push(Instruction::Mov { ty, src, dst });
            }
        }
        Instruction::Mov { ty, src, dst } => {
            if is_memory(&src) && is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Mov {
                    ty,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else if ty == AsmType::Quadword && matches!(src, Operand::Imm(v) if v > i32::MAX as u64) && is_memory(&dst)
            {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Mov {
                    ty,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else {
                out.push(Instruction::Mov { ty, src, dst });
            }
        }
        Instruction::Movsx { src, dst } => {
            let src_fixed = if matches!(src, Operand::Imm(_)) {
                out.push(Instruction::Mov {
                    ty: AsmType::Longword,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                Operand::Register(SCRATCH_INT)
            } else {
                src
            };
            if is_memory(&dst) {
                out.push(Instruction::Movsx {
                    src: src_fixed,
                    dst: Operand::Register(SCRATCH_INT2),
                });
                out.push(Instruction::Mov {
                    ty: AsmType::Quadword,
                    src: Operand::Register(SCRATCH_INT2),
                    dst,
                });
            } else {
                out.push(Instruction::Movsx { src: src_fixed, dst });
            }
        }
        Instruction::MovZeroExtend { src, dst } => {
            if is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty: AsmType::Longword,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Mov {
                    ty: AsmType::Quadword,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else {
                out.push(Instruction::Mov {
                    ty: AsmType::Longword,
                    src,
                    dst,
                });
            }
        }
        Instruction::Cvttsd2si { dst_ty, src, dst } => {
            if is_memory(&dst) {
                out.push(Instruction::Cvttsd2si {
                    dst_ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Mov {
                    ty: dst_ty,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else {
                out.push(Instruction::Cvttsd2si { dst_ty, src, dst });
            }
        }
        Instruction::Cvtsi2sd { src_ty, src, dst } => {
            let src_fixed = if matches!(src, Operand::Imm(_)) {
                out.push(Instruction::Mov {
                    ty: src_ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                Operand::Register(SCRATCH_INT)
            } else {
                src
            };
            if is_memory(&dst) {
                out.push(Instruction::Cvtsi2sd {
                    src_ty,
                    src: src_fixed,
                    dst: Operand::Register(SCRATCH_DOUBLE),
                });
                out.push(Instruction::Mov {
                    ty: AsmType::Double,
                    src: Operand::Register(SCRATCH_DOUBLE),
                    dst,
                });
            } else {
                out.push(Instruction::Cvtsi2sd {
                    src_ty,
                    src: src_fixed,
                    dst,
                });
            }
        }
        Instruction::Binary { op, ty, src, dst } if op == BinaryOp::Mult && ty != AsmType::Double => {
            if is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src: dst.clone(),
                    dst: Operand::Register(SCRATCH_INT2),
                });
                out.push(Instruction::Binary {
                    op,
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT2),
                });
                out.push(Instruction::Mov {
                    ty,
                    src: Operand::Register(SCRATCH_INT2),
                    dst,
                });
            } else {
                out.push(Instruction::Binary { op, ty, src, dst });
            }
        }
        Instruction::Binary { op, ty, src, dst }
            if matches!(op, BinaryOp::Shl | BinaryOp::Sar | BinaryOp::Shr) && !matches!(src, Operand::Imm(_)) =>
        {
            out.push(Instruction::Mov {
                ty: AsmType::Longword,
                src,
                dst: Operand::Register(Reg::Cx),
            });
            out.push(Instruction::Binary {
                op,
                ty,
                src: Operand::Register(Reg::Cx),
                dst,
            });
        }
        Instruction::Binary { op, ty, src, dst } if ty == AsmType::Double => {
            if is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src: dst.clone(),
                    dst: Operand::Register(SCRATCH_DOUBLE2),
                });
                out.push(Instruction::Binary {
                    op,
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_DOUBLE2),
                });
                out.push(Instruction::Mov {
                    ty,
                    src: Operand::Register(SCRATCH_DOUBLE2),
                    dst,
                });
            } else if is_memory(&src) && is_memory_operand_required_in_register(op) {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_DOUBLE),
                });
                out.push(Instruction::Binary {
                    op,
                    ty,
                    src: Operand::Register(SCRATCH_DOUBLE),
                    dst,
                });
            } else {
                out.push(Instruction::Binary { op, ty, src, dst });
            }
        }
        Instruction::Binary { op, ty, src, dst } => {
            if is_memory(&src) && is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Binary {
                    op,
                    ty,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else {
                out.push(Instruction::Binary { op, ty, src, dst });
            }
        }
        Instruction::Cmp { ty, src, dst } if ty == AsmType::Double => {
            if is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src: dst,
                    dst: Operand::Register(SCRATCH_DOUBLE),
                });
                out.push(Instruction::Cmp {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_DOUBLE),
                });
            } else {
                out.push(Instruction::Cmp { ty, src, dst });
            }
        }
        Instruction::Cmp { ty, src, dst } => {
            if is_memory(&src) && is_memory(&dst) {
                out.push(Instruction::Mov {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT),
                });
                out.push(Instruction::Cmp {
                    ty,
                    src: Operand::Register(SCRATCH_INT),
                    dst,
                });
            } else if matches!(dst, Operand::Imm(_)) {
                out.push(Instruction::Mov {
                    ty,
                    src: dst,
                    dst: Operand::Register(SCRATCH_INT2),
                });
                out.push(Instruction::Cmp {
                    ty,
                    src,
                    dst: Operand::Register(SCRATCH_INT2),
                });
            } else {
                out.push(Instruction::Cmp { ty, src, dst });
            }
        }
        Instruction::Idiv { ty, operand } if matches!(operand, Operand::Imm(_)) => {
            out.push(Instruction::Mov {
                ty,
                src: operand,
                dst: Operand::Register(SCRATCH_INT),
            });
            out.push(Instruction::Idiv {
                ty,
                operand: Operand::Register(SCRATCH_INT),
            });
        }
        Instruction::Div { ty, operand } if matches!(operand, Operand::Imm(_)) => {
            out.push(Instruction::Mov {
                ty,
                src: operand,
                dst: Operand::Register(SCRATCH_INT),
            });
            out.push(Instruction::Div {
                ty,
                operand: Operand::Register(SCRATCH_INT),
            });
        }
        other => out.push(other),
    }
}

/// `addsd`/`subsd`/`mulsd`/`divsd`/`xorpd` all require their second operand
/// in a register or as a rip-relative constant - memory operands sourced
/// from the stack still need a detour through a scratch register because
/// the encoding only allows one memory operand and `dst` already claimed it.
fn is_memory_operand_required_in_register(_op: BinaryOp) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_function(instructions: Vec<Instruction>, stack_size: i64) -> Function {
        Function {
            name: "f".into(),
            global: true,
            instructions,
            stack_size,
        }
    }

    #[test]
    fn prologue_is_prepended_and_stack_size_rounded_to_16() {
        let mut program = Program {
            top_level: vec![TopLevel::Function(simple_function(vec![Instruction::Ret], 5))],
        };
        fixup(&mut program);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert_eq!(f.stack_size, 16);
        assert_eq!(f.instructions[0], Instruction::Push(Operand::Register(Reg::Bp)));
        assert_eq!(
            f.instructions[1],
            Instruction::Mov {
                ty: AsmType::Quadword,
                src: Operand::Register(Reg::Sp),
                dst: Operand::Register(Reg::Bp),
            }
        );
    }

    #[test]
    fn mem_to_mem_mov_is_split_through_a_scratch_register() {
        let mut program = Program {
            top_level: vec![TopLevel::Function(simple_function(
                vec![Instruction::Mov {
                    ty: AsmType::Longword,
                    src: Operand::Stack(-4),
                    dst: Operand::Stack(-8),
                }],
                8,
            ))],
        };
        fixup(&mut program);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        let body = &f.instructions[3..];
        assert_eq!(
            body[0],
            Instruction::Mov {
                ty: AsmType::Longword,
                src: Operand::Stack(-4),
                dst: Operand::Register(SCRATCH_INT),
            }
        );
        assert_eq!(
            body[1],
            Instruction::Mov {
                ty: AsmType::Longword,
                src: Operand::Register(SCRATCH_INT),
                dst: Operand::Stack(-8),
            }
        );
    }

    #[test]
    fn idiv_with_an_immediate_operand_is_moved_into_a_register_first() {
        let mut program = Program {
            top_level: vec![TopLevel::Function(simple_function(
                vec![Instruction::Idiv {
                    ty: AsmType::Longword,
                    operand: Operand::Imm(2),
                }],
                0,
            ))],
        };
        fixup(&mut program);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        let body = &f.instructions[2..];
        assert!(matches!(body[0], Instruction::Mov { .. }));
        assert_eq!(
            body[1],
            Instruction::Idiv {
                ty: AsmType::Longword,
                operand: Operand::Register(SCRATCH_INT),
            }
        );
    }

    #[test]
    fn imul_with_a_memory_destination_routes_through_a_scratch_register() {
        let mut program = Program {
            top_level: vec![TopLevel::Function(simple_function(
                vec![Instruction::Binary {
                    op: BinaryOp::Mult,
                    ty: AsmType::Longword,
                    src: Operand::Imm(3),
                    dst: Operand::Stack(-4),
                }],
                4,
            ))],
        };
        fixup(&mut program);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        let body = &f.instructions[3..];
        assert_eq!(
            body[1],
            Instruction::Binary {
                op: BinaryOp::Mult,
                ty: AsmType::Longword,
                src: Operand::Imm(3),
                dst: Operand::Register(SCRATCH_INT2),
            }
        );
    }
}

//! Stage R: replaces every pseudo-register with a concrete location -
//! `Stack(offset)` for an automatic local, `Data(name)` for anything in
//! static storage - and records the function's total frame size.
//!
//! Offsets start at -4 and descend by the operand's size; an 8-byte slot is
//! additionally rounded down to the next multiple of 16 so it never
//! straddles the boundary a 4-byte neighbor would otherwise leave it on.

use crate::asm::*;
use crate::types::SymbolTable;
use std::collections::HashMap;

pub fn replace_pseudos(program: &mut Program, symbols: &SymbolTable) {
    for item in &mut program.top_level {
        if let TopLevel::Function(f) = item {
            replace_in_function(f, symbols);
        }
    }
}

fn replace_in_function(f: &mut Function, symbols: &SymbolTable) {
    let mut offsets: HashMap<String, i64> = HashMap::new();
    let mut next_offset: i64 = 0;

    let mut resolve = |name: &str, offsets: &mut HashMap<String, i64>, next_offset: &mut i64| -> Operand {
        if symbols.is_static_storage(name) {
            return Operand::Data(name.to_string());
        }
        if let Some(off) = offsets.get(name) {
            return Operand::Stack(*off);
        }
        let size = asm_size_of(symbols, name);
        let off = if size == 4 {
            *next_offset -= 4;
            *next_offset
        } else {
            *next_offset -= 8;
            *next_offset = ((*next_offset - 15) / 16) * 16;
            *next_offset
        };
        offsets.insert(name.to_string(), off);
        Operand::Stack(off)
    };

    for instr in &mut f.instructions {
        rewrite_instruction(instr, &mut resolve, &mut offsets, &mut next_offset);
    }

    f.stack_size = -next_offset;
}

fn asm_size_of(symbols: &SymbolTable, name: &str) -> i64 {
    symbols
        .get(name)
        .map(|s| s.ty.size() as i64)
        .unwrap_or(4)
}

fn rewrite_operand(
    op: &mut Operand,
    resolve: &mut impl FnMut(&str, &mut HashMap<String, i64>, &mut i64) -> Operand,
    offsets: &mut HashMap<String, i64>,
    next_offset: &mut i64,
) {
    if let Operand::Pseudo(name) = op {
        *op = resolve(name, offsets, next_offset);
    }
}

fn rewrite_instruction(
    instr: &mut Instruction,
    resolve: &mut impl FnMut(&str, &mut HashMap<String, i64>, &mut i64) -> Operand,
    offsets: &mut HashMap<String, i64>,
    next_offset: &mut i64,
) {
    let mut r = |op: &mut Operand| rewrite_operand(op, resolve, offsets, next_offset);
    match instr {
        Instruction::Mov { src, dst, .. } => {
            r(src);
            r(dst);
        }
        Instruction::Movsx { src, dst } | Instruction::MovZeroExtend { src, dst } => {
            r(src);
            r(dst);
        }
        Instruction::Cvttsd2si { src, dst, .. } | Instruction::Cvtsi2sd { src, dst, .. } => {
            r(src);
            r(dst);
        }
        Instruction::Unary { operand, .. } => r(operand),
        Instruction::Binary { src, dst, .. } => {
            r(src);
            r(dst);
        }
        Instruction::Cmp { src, dst, .. } => {
            r(src);
            r(dst);
        }
        Instruction::Idiv { operand, .. } | Instruction::Div { operand, .. } => r(operand),
        Instruction::SetCC(_, op) => r(op),
        Instruction::Push(op) => r(op),
        Instruction::Cdq
        | Instruction::Cqo
        | Instruction::Jmp(_)
        | Instruction::JmpCC(_, _)
        | Instruction::Label(_)
        | Instruction::Call(_)
        | Instruction::Ret => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdentifierAttrs, Symbol, Type};

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
    fn int_locals_get_four_byte_descending_offsets() {
        let symbols = symbols_with(&[("a", Type::Int), ("b", Type::Int)]);
        let mut program = Program {
            top_level: vec![TopLevel::Function(Function {
                name: "f".into(),
                global: true,
                stack_size: 0,
                instructions: vec![Instruction::Mov {
                    ty: AsmType::Longword,
                    src: Operand::Pseudo("a".into()),
                    dst: Operand::Pseudo("b".into()),
                }],
            })],
        };
        replace_pseudos(&mut program, &symbols);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert_eq!(
            f.instructions[0],
            Instruction::Mov {
                ty: AsmType::Longword,
                src: Operand::Stack(-4),
                dst: Operand::Stack(-8),
            }
        );
        assert_eq!(f.stack_size, 8);
    }

    #[test]
    fn static_names_become_data_operands_not_stack_slots() {
        let mut symbols = symbols_with(&[]);
        symbols.insert(
            "g".into(),
            Symbol {
                ty: Type::Int,
                attrs: IdentifierAttrs::Static {
                    initial: crate::types::InitialValue::Tentative,
                    global: true,
                },
            },
        );
        let mut program = Program {
            top_level: vec![TopLevel::Function(Function {
                name: "f".into(),
                global: true,
                stack_size: 0,
                instructions: vec![Instruction::Unary {
                    op: UnaryOp::Neg,
                    ty: AsmType::Longword,
                    operand: Operand::Pseudo("g".into()),
                }],
            })],
        };
        replace_pseudos(&mut program, &symbols);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert_eq!(
            f.instructions[0],
            Instruction::Unary {
                op: UnaryOp::Neg,
                ty: AsmType::Longword,
                operand: Operand::Data("g".into()),
            }
        );
    }
}

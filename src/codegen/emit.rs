//! Stage E: renders the fixed-up assembly tree to text.

use crate::asm::*;
use crate::config::Platform;
use crate::codegen::platform::{call_suffix, global_symbol, local_label};
use crate::types::StaticInit;
use std::collections::HashSet;
use std::fmt::Write;

pub fn emit(program: &Program, platform: Platform) -> String {
    let defined: HashSet<&str> = program
        .top_level
        .iter()
        .filter_map(|t| match t {
            TopLevel::Function(f) => Some(f.name.as_str()),
            _ => None,
        })
        .collect();

    let mut out = String::new();
    for item in &program.top_level {
        match item {
            TopLevel::Function(f) => emit_function(&mut out, f, platform, &defined),
            TopLevel::StaticVariable(v) => emit_static_variable(&mut out, v, platform),
            TopLevel::StaticConstant(c) => emit_static_constant(&mut out, c, platform),
        }
    }
    if platform == Platform::Linux {
        let _ = writeln!(out, "    .section .note.GNU-stack,\"\",@progbits");
    }
    out
}

fn emit_function(out: &mut String, f: &Function, platform: Platform, defined: &HashSet<&str>) {
    let name = global_symbol(platform, &f.name);
    let _ = writeln!(out, "    .text");
    if f.global {
        let _ = writeln!(out, "    .globl {name}");
    }
    let _ = writeln!(out, "{name}:");
    for instr in &f.instructions {
        emit_instruction(out, instr, platform, defined);
    }
}

fn emit_static_variable(out: &mut String, v: &StaticVariable, platform: Platform) {
    let name = global_symbol(platform, &v.name);
    if v.init.is_zero() {
        let _ = writeln!(out, "    .bss");
    } else {
        let _ = writeln!(out, "    .data");
    }
    if v.global {
        let _ = writeln!(out, "    .globl {name}");
    }
    let _ = writeln!(out, "    .align {}", v.alignment);
    let _ = writeln!(out, "{name}:");
    emit_init(out, &v.init);
}

fn emit_static_constant(out: &mut String, c: &StaticConstant, platform: Platform) {
    match platform {
        Platform::MacOs if c.alignment == 8 => {
            let _ = writeln!(out, "    .literal8");
        }
        Platform::MacOs => {
            let _ = writeln!(out, "    .literal16");
        }
        Platform::Linux => {
            let _ = writeln!(out, "    .section .rodata");
        }
    }
    let _ = writeln!(out, "    .align {}", c.alignment);
    let _ = writeln!(out, "{}:", const_label(platform, &c.name));
    let _ = writeln!(out, "    .quad {}", c.value);
    if c.alignment == 16 {
        let _ = writeln!(out, "    .quad 0");
    }
}

fn emit_init(out: &mut String, init: &StaticInit) {
    match init {
        StaticInit::Int(v) => {
            let _ = writeln!(out, "    .long {v}");
        }
        StaticInit::UInt(v) => {
            let _ = writeln!(out, "    .long {v}");
        }
        StaticInit::Long(v) => {
            let _ = writeln!(out, "    .quad {v}");
        }
        StaticInit::ULong(v) => {
            let _ = writeln!(out, "    .quad {v}");
        }
        StaticInit::Double(v) => {
            let _ = writeln!(out, "    .quad {}", v.to_bits());
        }
        StaticInit::Zero(n) => {
            let _ = writeln!(out, "    .zero {n}");
        }
    }
}

fn data_label(platform: Platform, name: &str) -> String {
    if name.starts_with("static_const.") {
        const_label(platform, name)
    } else {
        global_symbol(platform, name)
    }
}

fn const_label(platform: Platform, name: &str) -> String {
    local_label(platform, &name.replace('.', "_"))
}

fn emit_instruction(out: &mut String, instr: &Instruction, platform: Platform, defined: &HashSet<&str>) {
    match instr {
        Instruction::Mov { ty, src, dst } => {
            let mnemonic = if *ty == AsmType::Double { "movsd" } else { mov_mnemonic(*ty) };
            let _ = writeln!(
                out,
                "    {mnemonic} {}, {}",
                operand(src, *ty, platform),
                operand(dst, *ty, platform)
            );
        }
        Instruction::Movsx { src, dst } => {
            let _ = writeln!(
                out,
                "    movslq {}, {}",
                operand(src, AsmType::Longword, platform),
                operand(dst, AsmType::Quadword, platform)
            );
        }
        Instruction::MovZeroExtend { src, dst } => {
            let _ = writeln!(
                out,
                "    movl {}, {}",
                operand(src, AsmType::Longword, platform),
                operand(dst, AsmType::Longword, platform)
            );
        }
        Instruction::Cvttsd2si { dst_ty, src, dst } => {
            let mnemonic = if *dst_ty == AsmType::Quadword { "cvttsd2siq" } else { "cvttsd2sil" };
            let _ = writeln!(
                out,
                "    {mnemonic} {}, {}",
                operand(src, AsmType::Double, platform),
                operand(dst, *dst_ty, platform)
            );
        }
        Instruction::Cvtsi2sd { src_ty, src, dst } => {
            let mnemonic = if *src_ty == AsmType::Quadword { "cvtsi2sdq" } else { "cvtsi2sdl" };
            let _ = writeln!(
                out,
                "    {mnemonic} {}, {}",
                operand(src, *src_ty, platform),
                operand(dst, AsmType::Double, platform)
            );
        }
        Instruction::Unary { op, ty, operand: o } => {
            let mnemonic = match op {
                UnaryOp::Neg => "neg",
                UnaryOp::Not => "not",
            };
            let _ = writeln!(out, "    {mnemonic}{} {}", size_suffix(*ty), operand(o, *ty, platform));
        }
        Instruction::Binary { op, ty, src, dst } => {
            let mnemonic = binary_mnemonic(*op, *ty);
            let _ = writeln!(
                out,
                "    {mnemonic} {}, {}",
                operand(src, *ty, platform),
                operand(dst, *ty, platform)
            );
        }
        Instruction::Cmp { ty, src, dst } => {
            let mnemonic = if *ty == AsmType::Double { "comisd" } else { "cmp" };
            let suffix = if *ty == AsmType::Double { "" } else { size_suffix(*ty) };
            let _ = writeln!(
                out,
                "    {mnemonic}{suffix} {}, {}",
                operand(src, *ty, platform),
                operand(dst, *ty, platform)
            );
        }
        Instruction::Idiv { ty, operand: o } => {
            let _ = writeln!(out, "    idiv{} {}", size_suffix(*ty), operand(o, *ty, platform));
        }
        Instruction::Div { ty, operand: o } => {
            let _ = writeln!(out, "    div{} {}", size_suffix(*ty), operand(o, *ty, platform));
        }
        Instruction::Cdq => {
            let _ = writeln!(out, "    cdq");
        }
        Instruction::Cqo => {
            let _ = writeln!(out, "    cqo");
        }
        Instruction::Jmp(label) => {
            let _ = writeln!(out, "    jmp {}", local_label(platform, label));
        }
        Instruction::JmpCC(cc, label) => {
            let _ = writeln!(out, "    j{} {}", cond_suffix(*cc), local_label(platform, label));
        }
        Instruction::SetCC(cc, o) => {
            let _ = writeln!(out, "    set{} {}", cond_suffix(*cc), setcc_operand(o, platform));
        }
        Instruction::Label(label) => {
            let _ = writeln!(out, "{}:", local_label(platform, label));
        }
        Instruction::Push(o) => {
            let _ = writeln!(out, "    pushq {}", operand(o, AsmType::Quadword, platform));
        }
        Instruction::Call(name) => {
            let suffix = call_suffix(platform, defined.contains(name.as_str()));
            let _ = writeln!(out, "    call {}{suffix}", global_symbol(platform, name));
        }
        Instruction::Ret => {
            let _ = writeln!(out, "    movq %rbp, %rsp");
            let _ = writeln!(out, "    popq %rbp");
            let _ = writeln!(out, "    ret");
        }
    }
}

fn mov_mnemonic(ty: AsmType) -> &'static str {
    match ty {
        AsmType::Longword => "movl",
        AsmType::Quadword => "movq",
        AsmType::Double => "movsd",
    }
}

fn size_suffix(ty: AsmType) -> &'static str {
    match ty {
        AsmType::Longword => "l",
        AsmType::Quadword => "q",
        AsmType::Double => "sd",
    }
}

fn binary_mnemonic(op: BinaryOp, ty: AsmType) -> String {
    if ty == AsmType::Double {
        return match op {
            BinaryOp::Add => "addsd".into(),
            BinaryOp::Sub => "subsd".into(),
            BinaryOp::Mult => "mulsd".into(),
            BinaryOp::DivDouble => "divsd".into(),
            BinaryOp::Xor => "xorpd".into(),
            _ => unreachable!("no double form for {op:?}"),
        };
    }
    let base = match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mult => "imul",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::Sar => "sar",
        BinaryOp::Shr => "shr",
        BinaryOp::DivDouble => unreachable!("divsd is double-only"),
    };
    format!("{base}{}", size_suffix(ty))
}

fn cond_suffix(cc: CondCode) -> &'static str {
    match cc {
        CondCode::E => "e",
        CondCode::Ne => "ne",
        CondCode::G => "g",
        CondCode::Ge => "ge",
        CondCode::L => "l",
        CondCode::Le => "le",
        CondCode::A => "a",
        CondCode::Ae => "ae",
        CondCode::B => "b",
        CondCode::Be => "be",
        CondCode::P => "p",
    }
}

fn reg_name(reg: Reg, ty: AsmType) -> &'static str {
    use Reg::*;
    match (reg, ty) {
        (Ax, AsmType::Longword) => "%eax",
        (Ax, _) => "%rax",
        (Cx, AsmType::Longword) => "%ecx",
        (Cx, _) => "%rcx",
        (Dx, AsmType::Longword) => "%edx",
        (Dx, _) => "%rdx",
        (Di, AsmType::Longword) => "%edi",
        (Di, _) => "%rdi",
        (Si, AsmType::Longword) => "%esi",
        (Si, _) => "%rsi",
        (R8, AsmType::Longword) => "%r8d",
        (R8, _) => "%r8",
        (R9, AsmType::Longword) => "%r9d",
        (R9, _) => "%r9",
        (R10, AsmType::Longword) => "%r10d",
        (R10, _) => "%r10",
        (R11, AsmType::Longword) => "%r11d",
        (R11, _) => "%r11",
        (Sp, _) => "%rsp",
        (Bp, _) => "%rbp",
        (Xmm0, _) => "%xmm0",
        (Xmm1, _) => "%xmm1",
        (Xmm2, _) => "%xmm2",
        (Xmm3, _) => "%xmm3",
        (Xmm4, _) => "%xmm4",
        (Xmm5, _) => "%xmm5",
        (Xmm6, _) => "%xmm6",
        (Xmm7, _) => "%xmm7",
        (Xmm14, _) => "%xmm14",
        (Xmm15, _) => "%xmm15",
    }
}

fn reg_name_byte(reg: Reg) -> &'static str {
    use Reg::*;
    match reg {
        Ax => "%al",
        Cx => "%cl",
        Dx => "%dl",
        Di => "%dil",
        Si => "%sil",
        R8 => "%r8b",
        R9 => "%r9b",
        R10 => "%r10b",
        R11 => "%r11b",
        other => reg_name(other, AsmType::Longword),
    }
}

fn operand(op: &Operand, ty: AsmType, platform: Platform) -> String {
    match op {
        Operand::Imm(v) => format!("${v}"),
        Operand::Register(r) => reg_name(*r, ty).to_string(),
        Operand::Stack(offset) => format!("{offset}(%rbp)"),
        Operand::Data(name) => format!("{}(%rip)", data_label(platform, name)),
        Operand::Pseudo(name) => unreachable!("pseudo operand '{name}' survived to emission"),
    }
}

/// Renders `SetCC`'s byte-sized destination; `operand()` always renders a
/// register at its full requested width, so byte registers get their own
/// lookup instead of threading a byte-vs-full flag through every call site.
fn setcc_operand(op: &Operand, platform: Platform) -> String {
    match op {
        Operand::Register(r) => reg_name_byte(*r).to_string(),
        Operand::Stack(offset) => format!("{offset}(%rbp)"),
        Operand::Data(name) => format!("{}(%rip)", data_label(platform, name)),
        Operand::Imm(v) => format!("${v}"),
        Operand::Pseudo(name) => unreachable!("pseudo operand '{name}' survived to emission"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_with(instructions: Vec<Instruction>) -> Program {
        Program {
            top_level: vec![TopLevel::Function(Function {
                name: "main".into(),
                global: true,
                instructions,
                stack_size: 0,
            })],
        }
    }

    #[test]
    fn function_gets_a_globl_directive_and_label() {
        let program = function_with(vec![Instruction::Ret]);
        let text = emit(&program, Platform::Linux);
        assert!(text.contains(".globl main"));
        assert!(text.contains("main:"));
        assert!(text.contains("ret"));
    }

    #[test]
    fn macos_symbols_get_underscore_prefixed() {
        let program = function_with(vec![Instruction::Ret]);
        let text = emit(&program, Platform::MacOs);
        assert!(text.contains("_main:"));
    }

    #[test]
    fn undefined_call_targets_get_the_plt_suffix_on_linux() {
        let program = function_with(vec![Instruction::Call("puts".into())]);
        let text = emit(&program, Platform::Linux);
        assert!(text.contains("call puts@PLT"));
    }

    #[test]
    fn calls_to_functions_defined_in_this_unit_skip_the_plt_suffix() {
        let program = Program {
            top_level: vec![
                TopLevel::Function(Function {
                    name: "helper".into(),
                    global: false,
                    instructions: vec![Instruction::Ret],
                    stack_size: 0,
                }),
                TopLevel::Function(Function {
                    name: "main".into(),
                    global: true,
                    instructions: vec![Instruction::Call("helper".into())],
                    stack_size: 0,
                }),
            ],
        };
        let text = emit(&program, Platform::Linux);
        assert!(text.contains("call helper\n"));
    }

    #[test]
    fn longword_mov_uses_the_l_suffix_and_32_bit_register_name() {
        let program = function_with(vec![Instruction::Mov {
            ty: AsmType::Longword,
            src: Operand::Imm(5),
            dst: Operand::Register(Reg::Ax),
        }]);
        let text = emit(&program, Platform::Linux);
        assert!(text.contains("movl $5, %eax"));
    }
}

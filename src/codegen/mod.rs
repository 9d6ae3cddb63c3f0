//! Code generation: stages S (instruction selection), R (pseudo-register
//! replacement), F (fix-up), and E (emission), plus the platform-specific
//! naming conventions stage E renders against.

pub mod emit;
pub mod fixup;
pub mod platform;
pub mod pseudo;
pub mod select;

use crate::config::Platform;
use crate::ir;
use crate::types::SymbolTable;

/// Runs stages S, R, and F over the IR, returning the legalized assembly
/// tree ready for stage E.
pub fn generate(ir: &ir::Program, symbols: &SymbolTable) -> crate::asm::Program {
    let mut program = select::select(ir, symbols);
    pseudo::replace_pseudos(&mut program, symbols);
    fixup::fixup(&mut program);
    program
}

/// Runs the full S/R/F/E sequence and renders the result as text.
pub fn generate_and_emit(ir: &ir::Program, symbols: &SymbolTable, platform: Platform) -> String {
    let program = generate(ir, symbols);
    emit::emit(&program, platform)
}

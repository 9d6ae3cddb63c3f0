//! Orchestrates the full pipeline: lexer -> parser -> identifier resolution
//! -> loop labeling -> goto resolution -> type checking -> switch resolution
//! -> IR generation -> code generation -> emission.
//!
//! Type checking runs before switch resolution here even though the stages
//! are traditionally numbered the other way around: normalizing a `case`
//! constant to the controlling expression's type needs that type to already
//! be known, and only type checking assigns it.

use crate::codegen;
use crate::config::{CompilerConfig, Stage};
use crate::error::CompileError;
use crate::ir_gen::IrGen;
use crate::parser::Parser;
use crate::semantic::{goto_resolution, identifier_resolution, loop_labeling, switch_resolution, typecheck};
use crate::token::Lexer;
use tracing::debug;

pub fn run_pipeline(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
    let (tokens, diags) = Lexer::new(source).tokenize();
    if !diags.is_empty() {
        return Err(diags.into());
    }
    debug!(count = tokens.len(), "lexed");
    if config.stop_after == Stage::Lex {
        return Ok(String::new());
    }

    let (mut program, diags) = Parser::new(tokens).parse();
    if !diags.is_empty() {
        return Err(diags.into());
    }
    debug!(functions = program.declarations.len(), "parsed");
    if config.stop_after == Stage::Parse {
        return Ok(String::new());
    }

    let diags = identifier_resolution::IdentifierResolver::new().resolve(&mut program);
    if !diags.is_empty() {
        return Err(diags.into());
    }
    let diags = loop_labeling::LoopLabeler::new().label(&mut program);
    if !diags.is_empty() {
        return Err(diags.into());
    }
    let diags = goto_resolution::GotoResolver::new().resolve(&program);
    if !diags.is_empty() {
        return Err(diags.into());
    }
    let typecheck::TypeCheckResult { mut symbols } = typecheck::TypeChecker::new()
        .check(&mut program)
        .map_err(CompileError::from)?;
    let diags = switch_resolution::SwitchResolver::new().resolve(&mut program);
    if !diags.is_empty() {
        return Err(diags.into());
    }
    debug!("validated");
    if config.stop_after == Stage::Validate {
        return Ok(String::new());
    }

    let ir = IrGen::generate(&mut symbols, &program);
    debug!(top_level = ir.top_level.len(), "lowered to IR");
    if config.stop_after == Stage::Tacky {
        return Ok(String::new());
    }

    let asm_text = codegen::generate_and_emit(&ir, &symbols, config.platform);
    debug!(bytes = asm_text.len(), "emitted assembly");
    Ok(asm_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program_to_assembly_containing_its_entry_point() {
        let asm = run_pipeline("int main(void) { return 2; }", &CompilerConfig::default()).unwrap();
        assert!(asm.contains("main:"));
        assert!(asm.contains("ret"));
    }

    #[test]
    fn stopping_after_validate_returns_without_running_codegen() {
        let config = CompilerConfig::default().with_stop_after(Stage::Validate);
        let asm = run_pipeline("int main(void) { return 2; }", &config).unwrap();
        assert!(asm.is_empty());
    }

    #[test]
    fn an_undeclared_identifier_is_reported_as_a_diagnostic() {
        let result = run_pipeline("int main(void) { return x; }", &CompilerConfig::default());
        assert!(result.is_err());
    }
}

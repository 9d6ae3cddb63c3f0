//! Whole-program, ahead-of-time compiler for a C subset, targeting x86-64
//! System V assembly (with a minor macOS/Mach-O variant).
//!
//! The pipeline is a strict sequence of stages, each fully consuming its
//! predecessor's output: lexer -> parser -> identifier resolution -> loop
//! labeling -> goto resolution -> switch resolution -> type checking -> IR
//! generation -> instruction selection -> pseudo replacement -> fix-up ->
//! emission. See [`compile`] for the entry point.

pub mod ast;
pub mod asm;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;
pub mod ir;
pub mod ir_gen;
pub mod parser;
pub mod semantic;
pub mod token;
pub mod types;

pub use config::{CompilerConfig, Platform, Stage};
pub use error::{CompileError, Diagnostic, DiagnosticKind};

/// Compile a preprocessed translation unit to x86-64 assembly text.
///
/// This is the core API referenced by the external interfaces: tokens flow
/// from the lexer, through the semantic-analysis and code-generation stages,
/// to a textual `.s` file body.
pub fn compile(source: &str) -> Result<String, CompileError> {
    compile_with_config(source, &CompilerConfig::default())
}

/// Compile with an explicit [`CompilerConfig`] (target platform, stop-after
/// stage). Returns `Ok(String::new())` if `config.stop_after` names a stage
/// earlier than emission.
pub fn compile_with_config(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
    driver::run_pipeline(source, config)
}

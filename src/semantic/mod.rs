//! Semantic analysis: identifier resolution (A1), loop/switch labeling (A2),
//! goto resolution (A3), switch resolution (A4), and type checking (A5).
//!
//! Each stage mutates the AST in place and returns its own diagnostic list;
//! the driver stops at the first non-empty list (see the error handling
//! design in the top-level docs).

pub mod goto_resolution;
pub mod identifier_resolution;
pub mod loop_labeling;
pub mod switch_resolution;
pub mod typecheck;

pub use typecheck::TypeCheckResult;

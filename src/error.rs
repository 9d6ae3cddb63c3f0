//! Diagnostic and error types shared by every pipeline stage.
//!
//! Every stage collects a `Vec<Diagnostic>` instead of bailing on the first
//! problem (see the error-list model in the top-level docs). The top-level
//! driver stops at the first stage whose list is non-empty.

use std::fmt;

/// A 1-indexed source position used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: usize,
    pub col: usize,
}

impl SourceSpan {
    pub fn new(line: usize, col: usize) -> Self {
        SourceSpan { line, col }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// The broad category a diagnostic falls into, matching the error-kind
/// taxonomy of the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexical,
    Syntactic,
    Scoping,
    Typing,
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Lexical => "lexical error",
            DiagnosticKind::Syntactic => "syntax error",
            DiagnosticKind::Scoping => "scoping error",
            DiagnosticKind::Typing => "type error",
            DiagnosticKind::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

/// A single diagnostic produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn at(kind: DiagnosticKind, span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn lexical(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Lexical, message)
    }

    pub fn syntactic(span: SourceSpan, message: impl Into<String>) -> Self {
        Self::at(DiagnosticKind::Syntactic, span, message)
    }

    pub fn scoping(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Scoping, message)
    }

    pub fn typing(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Typing, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Internal, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{span}: {}: {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Top-level failure of a compilation, distinguishing diagnostics (expected,
/// user-facing) from I/O and internal-tooling failures.
#[derive(Debug)]
pub enum CompileError {
    /// One or more stages reported diagnostics; the pipeline stopped.
    Diagnostics(Vec<Diagnostic>),
    /// A filesystem or subprocess failure in the driver.
    Io(std::io::Error),
    /// A bug: an invariant the pipeline relies on did not hold.
    Internal(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Diagnostics(diags) => {
                for d in diags {
                    writeln!(f, "{d}")?;
                }
                Ok(())
            }
            CompileError::Io(e) => write!(f, "I/O error: {e}"),
            CompileError::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}

impl From<Vec<Diagnostic>> for CompileError {
    fn from(diags: Vec<Diagnostic>) -> Self {
        CompileError::Diagnostics(diags)
    }
}

pub type StageResult<T> = Result<T, Vec<Diagnostic>>;

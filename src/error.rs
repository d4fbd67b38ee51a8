//! Error types for sitescript
//!
//! Only failures that abort a parse or a request live here. Missing
//! variables, bad arithmetic operands and division by zero are logged
//! and evaluate to fallback values instead.

use thiserror::Error;

/// Result type alias for sitescript operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Main error type for script and template processing
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Parser error at line {line}: {message}")]
    ParserError { line: usize, message: String },

    #[error("Arity mismatch: '{command}' on line {line} expects {expected} arguments, got {got}")]
    ArityMismatch {
        command: String,
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("Step limit exceeded: script used more than {limit} evaluation steps")]
    StepLimitExceeded { limit: usize },

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// True for failures detected before any statement ran.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            ScriptError::LexerError { .. } | ScriptError::ParserError { .. }
        )
    }
}

//! Error handling utilities for the pico compiler

use thiserror::Error;

/// The main error type for the pico compiler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PicoError {
    #[error("Lexical error at line {line}: {message}")]
    LexicalError { line: u32, message: String },

    #[error("Parse error at line {line}: expected {expected}, found {found}")]
    ParseError {
        line: u32,
        expected: String,
        found: String,
    },

    #[error("Semantic error at line {line}: {message}")]
    SemanticError { line: u32, message: String },

    #[error("IR invariant violated: {message}")]
    IrError { message: String },

    #[error("Register allocation failed: {message}")]
    AllocError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Result type alias for pico compiler operations
pub type PicoResult<T> = Result<T, PicoError>;

impl PicoError {
    pub fn lexical(line: u32, message: impl Into<String>) -> Self {
        Self::LexicalError { line, message: message.into() }
    }

    pub fn parse(line: u32, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn semantic(line: u32, message: impl Into<String>) -> Self {
        Self::SemanticError { line, message: message.into() }
    }

    pub fn ir(message: impl Into<String>) -> Self {
        Self::IrError { message: message.into() }
    }

    pub fn alloc(message: impl Into<String>) -> Self {
        Self::AllocError { message: message.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }

    /// Process exit code this error maps to. Every compilation error is 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<std::io::Error> for PicoError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

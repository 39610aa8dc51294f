//! Diagnostic message handling for the pico compiler

use crate::{PicoError, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for diagnostic messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Debug => write!(f, "debug"),
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn info(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{}: {} at {}", self.severity, self.message, span),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Collection of diagnostic messages with a severity filter.
///
/// Messages below the filter threshold are dropped on insertion. The
/// compiler is single-threaded, so one collection is threaded through
/// the passes without locking.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
    filter: Severity,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            filter: Severity::Info,
        }
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: Severity) -> Self {
        Self {
            messages: Vec::new(),
            filter,
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity <= self.filter {
            self.messages.push(diagnostic);
        }
    }

    pub fn error(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.add(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.add(Diagnostic::warning(message, span));
    }

    pub fn info(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.add(Diagnostic::info(message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Error)
    }
}

impl From<PicoError> for Diagnostic {
    fn from(error: PicoError) -> Self {
        Diagnostic::error(error.to_string(), None)
    }
}

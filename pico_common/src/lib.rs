//! Shared utilities and error types for the pico compiler
//!
//! This crate provides common functionality used across all compiler stages:
//! - Error types and handling utilities
//! - Source location tracking
//! - Diagnostic collection with severity filtering

pub mod diagnostics;
pub mod error;
pub mod span;

pub use diagnostics::*;
pub use error::*;
pub use span::*;

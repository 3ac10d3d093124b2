//! Error handling foundation for the registrar console.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own error types in its own error module; the
//! console binary wraps them in a `Report` at the outermost layer.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

//! Diagnostics module for error collection and schema validation

mod collector;
mod validator;

pub use collector::{Diagnostic, DiagnosticCollector, DiagnosticKind};
pub use validator::{validate, NodeDescIndex, ValidationResult};

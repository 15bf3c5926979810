//! Structured diagnostics for the Halcyon place-and-route flow.
//!
//! All user-visible progress and warning output from the packer, placer,
//! router, timing analyzer, and constraint parsers goes through a
//! [`DiagnosticSink`]. PnR input has no source text, so diagnostics carry an
//! optional constraint-file line number instead of a span.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use severity::Severity;
pub use sink::DiagnosticSink;

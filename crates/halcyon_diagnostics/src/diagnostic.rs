//! Structured diagnostic messages with severity, codes, and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structured diagnostic message.
///
/// Diagnostics are the mechanism for reporting progress, warnings, and
/// errors to the user. PnR operates on netlists and binary device data with
/// no source text, so location information is an optional line number into
/// the constraint file being parsed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// For constraint-file diagnostics, the 1-based line the issue is on.
    pub line: Option<u32>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            line: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            line: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new informational diagnostic.
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
            line: None,
            notes: Vec::new(),
        }
    }

    /// Attaches a constraint-file line number.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn error_constructor() {
        let d = Diagnostic::error(DiagnosticCode::new(Category::Pack, 3), "bad cell");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "bad cell");
        assert!(d.line.is_none());
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::warning(DiagnosticCode::new(Category::Constraint, 7), "unknown key")
            .at_line(12)
            .with_note("ignored");
        assert_eq!(d.line, Some(12));
        assert_eq!(d.notes, vec!["ignored".to_string()]);
    }

    #[test]
    fn display_format() {
        let d = Diagnostic::error(DiagnosticCode::new(Category::Route, 2), "no path").at_line(4);
        assert_eq!(format!("{d}"), "error [R002]: no path (line 4)");
    }

    #[test]
    fn serde_roundtrip() {
        let d = Diagnostic::info(DiagnosticCode::new(Category::Timing, 1), "fmax 101.2 MHz");
        let json = serde_json::to_string(&d).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, d.message);
    }
}

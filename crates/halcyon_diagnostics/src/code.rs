//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stage a diagnostic originates from, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Device database loading and validation, prefixed with `D`.
    Device,
    /// Packer transforms, prefixed with `P`.
    Pack,
    /// Placement and validity checking, prefixed with `L`.
    Place,
    /// Routing, prefixed with `R`.
    Route,
    /// Timing analysis, prefixed with `T`.
    Timing,
    /// Constraint file parsing, prefixed with `C`.
    Constraint,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Device => 'D',
            Category::Pack => 'P',
            Category::Place => 'L',
            Category::Route => 'R',
            Category::Timing => 'T',
            Category::Constraint => 'C',
        }
    }
}

/// A diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit
/// number, e.g. `P012`, `R001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of the diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

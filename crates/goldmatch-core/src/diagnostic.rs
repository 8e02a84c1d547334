//! Mismatch diagnostics
//!
//! IMPORTANT: mismatch codes end up in persisted score reports.
//! NEVER rename or remove codes - downstream analysis keys on them.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Why a candidate did not match the gold result
///
/// These codes are STABLE and VERSIONED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchKind {
    /// Column or row counts disagree after projection
    ShapeMismatch,

    /// Same rows, different order (order-sensitive comparison only)
    OrderMismatch,

    /// Same shape, differing content
    ValueMismatch,
}

impl MismatchKind {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShapeMismatch => "SHAPE_MISMATCH",
            Self::OrderMismatch => "ORDER_MISMATCH",
            Self::ValueMismatch => "VALUE_MISMATCH",
        }
    }
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position of a cell in the projected tables (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLocation {
    /// Row index
    pub row: usize,

    /// Projected column index
    pub column: usize,
}

/// A structured non-match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Stable code
    pub kind: MismatchKind,

    /// Human-readable message
    pub message: String,

    /// Offending cell, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<CellLocation>,

    /// Gold-side value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Candidate-side value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Mismatch {
    /// Create a mismatch with just a code and message
    pub fn new(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            expected: None,
            actual: None,
        }
    }

    /// Shape mismatch shorthand
    pub fn shape(message: impl Into<String>) -> Self {
        Self::new(MismatchKind::ShapeMismatch, message)
    }

    /// Set the cell location
    pub fn at(mut self, row: usize, column: usize) -> Self {
        self.location = Some(CellLocation { row, column });
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {}, got {})", expected, actual)?;
        }
        Ok(())
    }
}

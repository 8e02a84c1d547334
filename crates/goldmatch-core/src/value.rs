//! Cell values and boundary parsing

use serde::{Deserialize, Serialize};

/// A single result-set cell
///
/// Result sets coming out of different warehouses (and out of hand-written
/// CSV files) are loosely typed, so every cell carries an explicit tag.
/// Construction never coerces text into numbers; the comparator decides
/// whether a text cell should be read numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing / SQL NULL
    Null,

    /// Numeric cell
    Number(f64),

    /// Anything else, verbatim
    Text(String),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Parse a raw text cell (CSV field, etc.)
    ///
    /// Cells matching one of the null tokens become `Null`, everything else
    /// is kept as text.
    pub fn from_cell(raw: &str, null_tokens: &NullTokens) -> Self {
        if null_tokens.is_null(raw) {
            Self::Null
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Convert a JSON scalar into a cell
    ///
    /// Booleans become `"true"`/`"false"` text, arrays and objects are kept
    /// as compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Text(b.to_string()),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Text(n.to_string()),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Returns true for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric reading of this value, if it has one
    ///
    /// Text is read as a number only when the whole (trimmed) string parses
    /// to a finite `f64`; `"inf"`, `"NaN"` and friends stay text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => parse_finite(s),
            Self::Null => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // f64::from_str accepts "inf"/"nan"; those must stay text.
    if !trimmed
        .bytes()
        .any(|b| b.is_ascii_digit())
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Raw cell spellings that represent NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NullTokens(Vec<String>);

impl NullTokens {
    /// Build from an explicit token list
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Only the empty string is NULL
    pub fn empty_only() -> Self {
        Self(vec![String::new()])
    }

    /// Whether a raw cell is one of the tokens
    pub fn is_null(&self, raw: &str) -> bool {
        self.0.iter().any(|t| t == raw)
    }

    /// Configured tokens
    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl Default for NullTokens {
    fn default() -> Self {
        Self::new(["", "NULL", "null", "None", "NaN", "nan"])
    }
}

//! Column type profiling
//!
//! Result tables carry no schema, so a column that mixes numbers with free
//! text (or empty strings with several other kinds) is a strong hint that a
//! loader or the query itself produced something unexpected.

use goldmatch_core::{Table, Value};
use serde::{Deserialize, Serialize};

/// Cell-kind counts for one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Column position
    pub position: usize,

    /// Column name
    pub name: String,

    pub nulls: usize,
    pub numbers: usize,
    pub numeric_text: usize,
    pub text: usize,
    pub empty_text: usize,
}

impl ColumnProfile {
    fn observe(&mut self, value: &Value) {
        match value {
            Value::Null => self.nulls += 1,
            Value::Number(_) => self.numbers += 1,
            Value::Text(s) if s.trim().is_empty() => self.empty_text += 1,
            Value::Text(_) if value.as_number().is_some() => self.numeric_text += 1,
            Value::Text(_) => self.text += 1,
        }
    }

    /// Number of distinct non-empty-text kinds present
    fn other_kinds(&self) -> usize {
        [self.nulls, self.numbers, self.numeric_text, self.text]
            .iter()
            .filter(|&&count| count > 0)
            .count()
    }

    /// Whether this column mixes incompatible kinds
    ///
    /// Numbers (native or textual) alongside non-numeric text, or empty
    /// strings alongside two or more other kinds.
    pub fn is_mixed(&self) -> bool {
        let numeric = self.numbers + self.numeric_text > 0;
        (numeric && self.text > 0) || (self.empty_text > 0 && self.other_kinds() >= 2)
    }

    /// Short description of the kinds present, e.g. `"number(3), text(1)"`
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            ("null", self.nulls),
            ("number", self.numbers),
            ("numeric-text", self.numeric_text),
            ("text", self.text),
            ("empty-text", self.empty_text),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(kind, count)| format!("{}({})", kind, count))
        .collect();

        if parts.is_empty() {
            "empty".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Profile of a whole table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl TableProfile {
    /// Columns flagged as mixed-type
    pub fn mixed_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.is_mixed())
    }

    /// True when any column is mixed-type
    pub fn has_mixed_columns(&self) -> bool {
        self.mixed_columns().next().is_some()
    }
}

/// Classify every cell of every column
pub fn profile_table(table: &Table) -> TableProfile {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let mut profile = ColumnProfile {
                position,
                name: name.clone(),
                ..ColumnProfile::default()
            };
            for value in table.column_values(position) {
                profile.observe(value);
            }
            profile
        })
        .collect();

    TableProfile {
        rows: table.height(),
        columns,
    }
}

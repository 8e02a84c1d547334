//! Schema-less result tables

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// How to treat rows whose width disagrees with the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaggedRows {
    /// Any width mismatch is a load error
    #[default]
    Reject,

    /// Rows shorter than the header are padded with NULL; longer rows are
    /// still rejected
    PadShort,
}

/// The result of executing one query
///
/// Column names may repeat (some engines happily return `SELECT a, a`);
/// columns are identified by position everywhere in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, rejecting ragged rows
    pub fn load(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        Self::load_with(columns, rows, RaggedRows::Reject)
    }

    /// Build a table, padding short rows with NULL
    pub fn load_padded(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        Self::load_with(columns, rows, RaggedRows::PadShort)
    }

    /// Build a table with an explicit ragged-row policy
    pub fn load_with(
        columns: Vec<String>,
        mut rows: Vec<Vec<Value>>,
        ragged: RaggedRows,
    ) -> Result<Self, TableError> {
        let width = columns.len();

        for (index, row) in rows.iter_mut().enumerate() {
            if row.len() == width {
                continue;
            }
            if row.len() < width && ragged == RaggedRows::PadShort {
                row.resize(width, Value::Null);
                continue;
            }
            return Err(TableError::Malformed {
                row: index,
                expected: width,
                found: row.len(),
            });
        }

        Ok(Self { columns, rows })
    }

    /// A table with no columns and no rows
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Restrict to the given column positions, in the given order
    pub fn project(&self, positions: &[usize]) -> Result<Table, TableError> {
        let width = self.width();
        if let Some(&index) = positions.iter().find(|&&p| p >= width) {
            return Err(TableError::ColumnIndex { index, width });
        }

        let columns = positions.iter().map(|&p| self.columns[p].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
            .collect();

        Ok(Table { columns, rows })
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the cells of one column
    pub fn column_values(&self, position: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(position))
    }
}

/// Table construction / projection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("malformed table: row {row} has {found} values, expected {expected}")]
    Malformed {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column index {index} out of range for table with {width} columns")]
    ColumnIndex { index: usize, width: usize },
}

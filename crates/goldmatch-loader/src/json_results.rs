//! JSON result files
//!
//! Accepts either a bare array of row objects or a query-service response
//! (`{"status": ..., "results": [...], "errors": [...]}`). Rows are
//! flattened one level: a nested object under `key` contributes
//! `key.<nested>` columns.

use crate::adapter::{LoadError, TableLoader};
use goldmatch_core::{Table, Value};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Loads result tables from a directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonResultLoader {
    root: PathBuf,
}

impl JsonResultLoader {
    /// Create a loader over a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the result file for an instance
    pub fn path_for(&self, instance_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", instance_id))
    }
}

#[async_trait::async_trait]
impl TableLoader for JsonResultLoader {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn load(&self, instance_id: &str) -> Result<Table, LoadError> {
        let path = self.path_for(instance_id);
        if !path.is_file() {
            return Err(LoadError::NotFound(format!(
                "{} (expected {})",
                instance_id,
                path.display()
            )));
        }

        tracing::debug!(instance_id, path = %path.display(), "Reading JSON result");
        let text = tokio::fs::read_to_string(&path).await?;
        parse_json_result(&text).map_err(|e| match e {
            LoadError::Malformed(msg) => LoadError::Malformed(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

/// Read a JSON result file from disk
pub fn read_json_file(path: &Path) -> Result<Table, LoadError> {
    let text = std::fs::read_to_string(path)?;
    parse_json_result(&text)
}

/// Parse a JSON result document into a table
///
/// Columns are the sorted union of (flattened) keys across all rows; keys
/// missing from a row read as NULL. An empty result is an empty table.
pub fn parse_json_result(text: &str) -> Result<Table, LoadError> {
    let document: Json =
        serde_json::from_str(text).map_err(|e| LoadError::Malformed(e.to_string()))?;

    let rows = match document {
        Json::Array(rows) => rows,
        Json::Object(mut response) => {
            if let Some(message) = response_error(&response) {
                return Err(LoadError::Execution(message));
            }
            match response.remove("results") {
                Some(Json::Array(rows)) => rows,
                Some(Json::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(LoadError::Malformed(format!(
                        "\"results\" must be an array, found {}",
                        json_kind(&other)
                    )))
                }
            }
        }
        other => {
            return Err(LoadError::Malformed(format!(
                "expected an array or a response object, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut flattened = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match row {
            Json::Object(object) => flattened.push(flatten(object)),
            other => {
                return Err(LoadError::Malformed(format!(
                    "row {} is {}, expected an object",
                    index,
                    json_kind(other)
                )))
            }
        }
    }

    let columns: Vec<String> = flattened
        .iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = flattened
        .into_iter()
        .map(|mut row| {
            columns
                .iter()
                .map(|column| row.remove(column).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Table::load(columns, rows)?)
}

/// First error message of a failed query-service response
fn response_error(response: &Map<String, Json>) -> Option<String> {
    let failed = matches!(response.get("status"), Some(Json::String(s)) if s == "errors" || s == "fatal");
    if !failed {
        return None;
    }

    let message = response
        .get("errors")
        .and_then(Json::as_array)
        .and_then(|errors| errors.first())
        .map(|first| match first.get("msg").and_then(Json::as_str) {
            Some(msg) => msg.to_string(),
            None => first.to_string(),
        })
        .unwrap_or_else(|| "query service reported errors".to_string());

    Some(message)
}

fn flatten(object: &Map<String, Json>) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    for (key, value) in object {
        match value {
            Json::Object(nested) => {
                for (nested_key, nested_value) in nested {
                    row.insert(format!("{}.{}", key, nested_key), Value::from_json(nested_value));
                }
            }
            other => {
                row.insert(key.clone(), Value::from_json(other));
            }
        }
    }
    row
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

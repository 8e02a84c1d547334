//! CSV result directories
//!
//! Layout: one file per instance, `<dir>/<instance_id>.csv`, header row
//! first. Gold directories may also hold alternative results for the same
//! instance as `<instance_id>_a.csv`, `<instance_id>_b.csv`, ...

use crate::adapter::{LoadError, TableLoader};
use goldmatch_core::{NullTokens, RaggedRows, Table, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Loads result tables from a directory of CSV files
#[derive(Debug, Clone)]
pub struct CsvDirectoryLoader {
    root: PathBuf,
    null_tokens: NullTokens,
    ragged: RaggedRows,
}

impl CsvDirectoryLoader {
    /// Create a loader over a directory with default null tokens
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            null_tokens: NullTokens::default(),
            ragged: RaggedRows::default(),
        }
    }

    /// Set the spellings read as NULL
    pub fn with_null_tokens(mut self, null_tokens: NullTokens) -> Self {
        self.null_tokens = null_tokens;
        self
    }

    /// Set ragged-row handling
    pub fn with_ragged_rows(mut self, ragged: RaggedRows) -> Self {
        self.ragged = ragged;
        self
    }

    /// Directory this loader reads from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the primary result file for an instance
    pub fn path_for(&self, instance_id: &str) -> PathBuf {
        self.root.join(format!("{}.csv", instance_id))
    }

    /// All result files for an instance, primary first, then variants by name
    pub fn variant_paths(&self, instance_id: &str) -> Result<Vec<PathBuf>, LoadError> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| LoadError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_variant_file(name, instance_id) {
                    paths.push(entry.into_path());
                }
            }
        }

        // "<id>.csv" sorts before "<id>_a.csv" ('.' < '_')
        paths.sort();
        Ok(paths)
    }

    async fn read(&self, path: PathBuf) -> Result<Table, LoadError> {
        let null_tokens = self.null_tokens.clone();
        let ragged = self.ragged;

        tokio::task::spawn_blocking(move || read_csv_file(&path, &null_tokens, ragged))
            .await
            .map_err(|e| LoadError::Io(format!("CSV reader task failed: {}", e)))?
    }
}

/// Whether `file_name` is `<instance_id>.csv` or `<instance_id>_<letters>.csv`
fn is_variant_file(file_name: &str, instance_id: &str) -> bool {
    let Some(stem) = file_name.strip_suffix(".csv") else {
        return false;
    };
    let Some(rest) = stem.strip_prefix(instance_id) else {
        return false;
    };

    match rest.strip_prefix('_') {
        None => rest.is_empty(),
        Some(suffix) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_lowercase()),
    }
}

/// Read one CSV file into a table
///
/// The first record is the header. An empty file is a table with no
/// columns and no rows.
pub fn read_csv_file(
    path: &Path,
    null_tokens: &NullTokens,
    ragged: RaggedRows,
) -> Result<Table, LoadError> {
    let display = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(&display, e))?;

    let mut records = reader.records();

    let columns: Vec<String> = match records.next() {
        None => return Ok(Table::empty()),
        Some(header) => header
            .map_err(|e| csv_error(&display, e))?
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| csv_error(&display, e))?;
        rows.push(
            record
                .iter()
                .map(|cell| Value::from_cell(cell, null_tokens))
                .collect(),
        );
    }

    Table::load_with(columns, rows, ragged)
        .map_err(|e| LoadError::Malformed(format!("{}: {}", display, e)))
}

fn csv_error(path: &str, err: csv::Error) -> LoadError {
    if err.is_io_error() {
        LoadError::Io(format!("{}: {}", path, err))
    } else {
        LoadError::Malformed(format!("{}: {}", path, err))
    }
}

#[async_trait::async_trait]
impl TableLoader for CsvDirectoryLoader {
    fn name(&self) -> &'static str {
        "csv"
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
        self.read(path).await
    }

    async fn load_variants(&self, instance_id: &str) -> Result<Vec<Table>, LoadError> {
        if !self.root.is_dir() {
            return Err(LoadError::Io(format!(
                "result directory {} does not exist",
                self.root.display()
            )));
        }

        let paths = self.variant_paths(instance_id)?;
        if paths.is_empty() {
            return Err(LoadError::NotFound(format!(
                "{} (no result files in {})",
                instance_id,
                self.root.display()
            )));
        }

        tracing::debug!(instance_id, variants = paths.len(), "Reading CSV results");

        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            tables.push(self.read(path).await?);
        }
        Ok(tables)
    }
}

//! Result-table loaders and benchmark sources
//!
//! This crate sits at the boundary: it turns files (or canned tables) into
//! [`goldmatch_core::Table`] values and reads the instance list and
//! evaluation standards. Nothing here influences comparison semantics.
//!
//! ## Loaders
//!
//! - [`CsvDirectoryLoader`] - `<dir>/<instance_id>.csv`, with gold variants
//!   `<instance_id>_a.csv`, `<instance_id>_b.csv`, ...
//! - [`JsonResultLoader`] - `<dir>/<instance_id>.json`, rows as objects
//! - [`MockLoader`] - in-memory tables for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use goldmatch_loader::{CsvDirectoryLoader, TableLoader};
//!
//! let gold = CsvDirectoryLoader::new("gold/exec_result");
//! let variants = gold.load_variants("bq011").await?;
//! ```

pub mod adapter;
pub mod csv_dir;
pub mod json_results;
pub mod mock;
pub mod sources;

pub use adapter::{LoadError, TableLoader};
pub use csv_dir::{read_csv_file, CsvDirectoryLoader};
pub use json_results::{parse_json_result, read_json_file, JsonResultLoader};
pub use mock::{MockLoader, MockLoaderBuilder};
pub use sources::{load_instances, load_policies, parse_instances, parse_policies, SourceError};

use goldmatch_core::{NullTokens, RaggedRows, ResultFormat, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build a directory loader for the given result format
pub fn directory_loader(
    format: ResultFormat,
    root: impl Into<PathBuf>,
    null_tokens: NullTokens,
    ragged: RaggedRows,
) -> Arc<dyn TableLoader> {
    match format {
        ResultFormat::Csv => Arc::new(
            CsvDirectoryLoader::new(root)
                .with_null_tokens(null_tokens)
                .with_ragged_rows(ragged),
        ),
        ResultFormat::Json => Arc::new(JsonResultLoader::new(root)),
    }
}

/// Read a single result file, choosing the format by extension
///
/// `.json` files are read as JSON results, everything else as CSV.
pub fn read_result_file(
    path: &Path,
    null_tokens: &NullTokens,
    ragged: RaggedRows,
) -> Result<Table, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        read_json_file(path)
    } else {
        read_csv_file(path, null_tokens, ragged)
    }
}

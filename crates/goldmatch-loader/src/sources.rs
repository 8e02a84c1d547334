//! Benchmark sources: instance lists and evaluation standards (JSONL)
//!
//! Evaluation standard lines look like:
//!
//! ```text
//! {"instance_id": "bq011", "condition_cols": [0, 2], "ignore_order": true}
//! {"instance_id": "bq002", "condition_cols": [[0], [1]], "ignore_order": false}
//! {"instance_id": "local007", "condition_cols": "none", "tolerance": 0.5}
//! ```
//!
//! `condition_cols` may be absent or `[]` (all columns), a flat list of gold
//! positions, one list per gold variant, or the keyword `"none"`.

use goldmatch_core::{ColumnSelection, ComparisonPolicy, Instance, PolicySet};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Errors reading instance or policy sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {}: {}", path.display(), message)]
    Io { path: PathBuf, message: String },

    #[error("{}:{}: {}", path.display(), line, message)]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{}: duplicate instance id '{}'", path.display(), line, instance_id)]
    Duplicate {
        path: PathBuf,
        line: usize,
        instance_id: String,
    },
}

/// Read benchmark instances from a JSONL file
pub fn load_instances(path: &Path) -> Result<Vec<Instance>, SourceError> {
    let text = read(path)?;
    parse_instances(&text, path)
}

/// Parse JSONL instances; `origin` is only used in error messages
pub fn parse_instances(text: &str, origin: &Path) -> Result<Vec<Instance>, SourceError> {
    let mut seen = HashSet::new();
    let mut instances = Vec::new();

    for (line, raw) in jsonl_lines(text) {
        let instance: Instance = serde_json::from_str(raw).map_err(|e| SourceError::Parse {
            path: origin.to_path_buf(),
            line,
            message: e.to_string(),
        })?;

        if !seen.insert(instance.instance_id.clone()) {
            return Err(SourceError::Duplicate {
                path: origin.to_path_buf(),
                line,
                instance_id: instance.instance_id,
            });
        }
        instances.push(instance);
    }

    Ok(instances)
}

/// Read evaluation standards from a JSONL file
///
/// Fields a line leaves out are taken from `defaults`.
pub fn load_policies(path: &Path, defaults: ComparisonPolicy) -> Result<PolicySet, SourceError> {
    let text = read(path)?;
    parse_policies(&text, path, defaults)
}

/// Parse JSONL evaluation standards; `origin` is only used in error messages
pub fn parse_policies(
    text: &str,
    origin: &Path,
    defaults: ComparisonPolicy,
) -> Result<PolicySet, SourceError> {
    let mut set = PolicySet::new(defaults.clone());

    for (line, raw) in jsonl_lines(text) {
        let parse_error = |message: String| SourceError::Parse {
            path: origin.to_path_buf(),
            line,
            message,
        };

        let standard: RawStandard =
            serde_json::from_str(raw).map_err(|e| parse_error(e.to_string()))?;

        if set.contains(&standard.instance_id) {
            return Err(SourceError::Duplicate {
                path: origin.to_path_buf(),
                line,
                instance_id: standard.instance_id,
            });
        }

        let mut policy = defaults.clone();
        match standard.condition_cols {
            None => {}
            Some(RawColumns::Flat(positions)) => {
                policy.columns = ColumnSelection::from_positions(positions);
            }
            Some(RawColumns::PerVariant(mut lists)) => {
                if lists.len() == 1 {
                    policy.columns = ColumnSelection::from_positions(lists.remove(0));
                } else {
                    policy.columns = ColumnSelection::All;
                    policy.variant_columns =
                        lists.into_iter().map(ColumnSelection::from_positions).collect();
                }
            }
            Some(RawColumns::Keyword(keyword)) => {
                policy.columns = match keyword.to_ascii_lowercase().as_str() {
                    "none" => ColumnSelection::Nothing,
                    "all" => ColumnSelection::All,
                    _ => {
                        return Err(parse_error(format!(
                            "unknown condition_cols keyword '{}' (expected \"none\" or \"all\")",
                            keyword
                        )))
                    }
                };
            }
        }
        if let Some(ignore_order) = standard.ignore_order {
            policy.ignore_order = ignore_order;
        }
        if let Some(tolerance) = standard.tolerance {
            policy.tolerance = tolerance;
        }

        set.insert(standard.instance_id, policy);
    }

    Ok(set)
}

#[derive(Debug, Deserialize)]
struct RawStandard {
    instance_id: String,

    #[serde(default)]
    condition_cols: Option<RawColumns>,

    #[serde(default)]
    ignore_order: Option<bool>,

    #[serde(default)]
    tolerance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumns {
    Flat(Vec<usize>),
    PerVariant(Vec<Vec<usize>>),
    Keyword(String),
}

fn read(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Non-blank lines with 1-based line numbers
fn jsonl_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

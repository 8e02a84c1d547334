//! Configuration schema (goldmatch.toml)

use crate::policy::{ComparisonPolicy, ExtraColumns, TextNormalization, DEFAULT_TOLERANCE};
use crate::table::RaggedRows;
use crate::value::NullTokens;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk format of candidate results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// `<instance_id>.csv` with a header row
    #[default]
    Csv,

    /// `<instance_id>.json`, rows as objects
    Json,
}

impl std::str::FromStr for ResultFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::ParseError(format!(
                "unknown result format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// What the scorer does when a gold table cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoldErrorMode {
    /// Stop the whole run
    #[default]
    Abort,

    /// Record a harness error for the instance and keep going
    Record,
}

/// Input locations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Benchmark instances (JSONL)
    #[serde(default)]
    pub instances: Option<PathBuf>,

    /// Per-instance evaluation standards (JSONL)
    #[serde(default)]
    pub policies: Option<PathBuf>,

    /// Directory of gold results
    #[serde(default)]
    pub gold_dir: Option<PathBuf>,

    /// Directory of candidate results
    #[serde(default)]
    pub candidate_dir: Option<PathBuf>,
}

impl PathsConfig {
    fn resolve_against(&mut self, root: &Path) {
        for path in [
            &mut self.instances,
            &mut self.policies,
            &mut self.gold_dir,
            &mut self.candidate_dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }
}

/// Comparison defaults applied to instances without an explicit standard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Absolute numeric tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Default order sensitivity
    #[serde(default)]
    pub ignore_order: bool,

    /// Case-insensitive text comparison
    #[serde(default)]
    pub case_insensitive: bool,

    /// Trim whitespace before text comparison
    #[serde(default)]
    pub trim_whitespace: bool,

    /// Extra candidate columns
    #[serde(default)]
    pub extra_columns: ExtraColumns,

    /// Ragged-row handling for loaded tables
    #[serde(default)]
    pub ragged_rows: RaggedRows,

    /// Raw cell spellings read as NULL
    #[serde(default)]
    pub null_tokens: NullTokens,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            ignore_order: false,
            case_insensitive: false,
            trim_whitespace: false,
            extra_columns: ExtraColumns::default(),
            ragged_rows: RaggedRows::default(),
            null_tokens: NullTokens::default(),
        }
    }
}

impl ComparisonConfig {
    /// Policy used for instances absent from the policy source
    pub fn default_policy(&self) -> ComparisonPolicy {
        ComparisonPolicy::default()
            .with_tolerance(self.tolerance)
            .with_ignore_order(self.ignore_order)
            .with_text(TextNormalization {
                case_insensitive: self.case_insensitive,
                trim_whitespace: self.trim_whitespace,
            })
            .with_extra_columns(self.extra_columns)
    }
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Concurrent instances
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Per-load timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Gold failure handling
    #[serde(default)]
    pub on_gold_error: GoldErrorMode,

    /// Candidate result format
    #[serde(default)]
    pub candidate_format: ResultFormat,
}

fn default_parallel() -> usize {
    4
}

fn default_timeout() -> u64 {
    30
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            timeout_seconds: default_timeout(),
            on_gold_error: GoldErrorMode::default(),
            candidate_format: ResultFormat::default(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Comparison defaults
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Batch settings
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load config from TOML file
    ///
    /// Relative paths are resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            config.paths.resolve_against(parent);
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let tolerance = self.comparison.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "comparison.tolerance must be finite and non-negative (got {})",
                tolerance
            )));
        }
        if self.run.parallel == 0 {
            return Err(ConfigError::Invalid("run.parallel must be at least 1".into()));
        }
        if self.run.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "run.timeout_seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.comparison.tolerance, 0.01);
        assert_eq!(config.run.parallel, 4);
        assert_eq!(config.run.timeout_seconds, 30);
        assert_eq!(config.run.on_gold_error, GoldErrorMode::Abort);
        assert_eq!(config.run.candidate_format, ResultFormat::Csv);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [comparison]
            tolerance = 0.001
            case_insensitive = true

            [run]
            on_gold_error = "record"
            "#,
        )
        .unwrap();

        assert_eq!(config.comparison.tolerance, 0.001);
        assert!(config.comparison.case_insensitive);
        assert!(!config.comparison.trim_whitespace);
        assert_eq!(config.run.on_gold_error, GoldErrorMode::Record);
        assert_eq!(config.run.parallel, 4);
        assert_eq!(config.comparison.null_tokens, NullTokens::default());
    }

    #[test]
    fn default_policy_from_comparison_config() {
        let mut comparison = ComparisonConfig::default();
        comparison.ignore_order = true;
        comparison.trim_whitespace = true;

        let policy = comparison.default_policy();
        assert!(policy.ignore_order);
        assert!(policy.text.trim_whitespace);
        assert!(!policy.text.case_insensitive);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml("[comparison]\ntolerance = -0.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[run]\nparallel = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goldmatch.toml");
        std::fs::write(
            &path,
            "[paths]\ngold_dir = \"gold/exec_result\"\ncandidate_dir = \"/abs/results\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.paths.gold_dir.as_deref(),
            Some(dir.path().join("gold/exec_result").as_path())
        );
        assert_eq!(
            config.paths.candidate_dir.as_deref(),
            Some(Path::new("/abs/results"))
        );
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn result_format_parsing() {
        assert_eq!("CSV".parse::<ResultFormat>().unwrap(), ResultFormat::Csv);
        assert_eq!("json".parse::<ResultFormat>().unwrap(), ResultFormat::Json);
        assert!("xml".parse::<ResultFormat>().is_err());
    }
}

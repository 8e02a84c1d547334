//! Per-instance comparison policy

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default absolute numeric tolerance
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Which gold columns take part in a comparison
///
/// This is deliberately a tri-state: "compare everything" and "compare
/// nothing" are different instructions and must not share a representation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "positions")]
pub enum ColumnSelection {
    /// Every gold column
    #[default]
    All,

    /// Only these gold positions, in this order (never empty)
    Subset(Vec<usize>),

    /// No columns: the comparison is vacuously a match
    Nothing,
}

impl ColumnSelection {
    /// Build from an external position list, where an empty list means "all"
    pub fn from_positions(positions: Vec<usize>) -> Self {
        if positions.is_empty() {
            Self::All
        } else {
            Self::Subset(positions)
        }
    }

    /// Concrete gold positions for a gold table of the given width
    ///
    /// Returns `None` for `Nothing`.
    pub fn resolve(&self, gold_width: usize) -> Option<Vec<usize>> {
        match self {
            Self::All => Some((0..gold_width).collect()),
            Self::Subset(positions) => Some(positions.clone()),
            Self::Nothing => None,
        }
    }

    /// Check positions against the gold width
    pub fn validate(&self, gold_width: usize) -> Result<(), PolicyError> {
        let Self::Subset(positions) = self else {
            return Ok(());
        };

        if positions.is_empty() {
            return Err(PolicyError::EmptySubset);
        }

        let mut seen = HashSet::new();
        for &index in positions {
            if index >= gold_width {
                return Err(PolicyError::ColumnOutOfRange {
                    index,
                    width: gold_width,
                });
            }
            if !seen.insert(index) {
                return Err(PolicyError::DuplicateColumn { index });
            }
        }
        Ok(())
    }
}

/// Text normalization applied before string equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextNormalization {
    /// Compare text case-insensitively
    #[serde(default)]
    pub case_insensitive: bool,

    /// Trim leading/trailing whitespace before comparing
    #[serde(default)]
    pub trim_whitespace: bool,
}

impl TextNormalization {
    /// Apply the normalization to a string
    pub fn apply<'a>(&self, s: &'a str) -> std::borrow::Cow<'a, str> {
        let s = if self.trim_whitespace { s.trim() } else { s };
        if self.case_insensitive {
            std::borrow::Cow::Owned(s.to_lowercase())
        } else {
            std::borrow::Cow::Borrowed(s)
        }
    }
}

/// What to do when the candidate has more columns than the comparison needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraColumns {
    /// Project the candidate down and ignore the rest
    #[default]
    Allow,

    /// A candidate wider than the gold table is a shape mismatch
    Reject,
}

/// Comparison rules for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPolicy {
    /// Gold columns to compare
    #[serde(default)]
    pub columns: ColumnSelection,

    /// Per-gold-variant column selections (index = variant number)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_columns: Vec<ColumnSelection>,

    /// Treat both tables as multisets of rows
    #[serde(default)]
    pub ignore_order: bool,

    /// Absolute tolerance for numeric cells
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Text normalization
    #[serde(default)]
    pub text: TextNormalization,

    /// Extra candidate columns
    #[serde(default)]
    pub extra_columns: ExtraColumns,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            columns: ColumnSelection::All,
            variant_columns: Vec::new(),
            ignore_order: false,
            tolerance: DEFAULT_TOLERANCE,
            text: TextNormalization::default(),
            extra_columns: ExtraColumns::Allow,
        }
    }
}

impl ComparisonPolicy {
    /// Restrict the comparison to the given gold positions
    pub fn with_columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = columns;
        self
    }

    /// Set order sensitivity
    pub fn with_ignore_order(mut self, ignore_order: bool) -> Self {
        self.ignore_order = ignore_order;
        self
    }

    /// Set numeric tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set text normalization
    pub fn with_text(mut self, text: TextNormalization) -> Self {
        self.text = text;
        self
    }

    /// Set extra-column handling
    pub fn with_extra_columns(mut self, extra_columns: ExtraColumns) -> Self {
        self.extra_columns = extra_columns;
        self
    }

    /// Column selection for a given gold variant
    pub fn columns_for_variant(&self, variant: usize) -> &ColumnSelection {
        self.variant_columns.get(variant).unwrap_or(&self.columns)
    }

    /// Validate this policy against a gold variant
    pub fn validate(&self, variant: usize, gold_width: usize) -> Result<(), PolicyError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PolicyError::InvalidTolerance(self.tolerance));
        }
        self.columns_for_variant(variant).validate(gold_width)
    }
}

/// Policy misconfiguration (a benchmark-definition bug)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("condition column {index} out of range: gold table has {width} columns")]
    ColumnOutOfRange { index: usize, width: usize },

    #[error("condition column {index} listed more than once")]
    DuplicateColumn { index: usize },

    #[error("explicit column subset is empty")]
    EmptySubset,

    #[error("tolerance must be a finite, non-negative number (got {0})")]
    InvalidTolerance(f64),
}

/// Policies for a whole benchmark, with a fallback
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    defaults: ComparisonPolicy,
    by_instance: HashMap<String, ComparisonPolicy>,
}

impl PolicySet {
    /// Create an empty set with the given defaults
    pub fn new(defaults: ComparisonPolicy) -> Self {
        Self {
            defaults,
            by_instance: HashMap::new(),
        }
    }

    /// Register an explicit policy
    pub fn insert(&mut self, instance_id: impl Into<String>, policy: ComparisonPolicy) {
        self.by_instance.insert(instance_id.into(), policy);
    }

    /// Policy for an instance, or the defaults when none is registered
    pub fn lookup(&self, instance_id: &str) -> ComparisonPolicy {
        self.by_instance
            .get(instance_id)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }

    /// Whether an explicit policy exists
    pub fn contains(&self, instance_id: &str) -> bool {
        self.by_instance.contains_key(instance_id)
    }

    /// Defaults used for unknown instances
    pub fn defaults(&self) -> &ComparisonPolicy {
        &self.defaults
    }

    /// Number of explicit policies
    pub fn len(&self) -> usize {
        self.by_instance.len()
    }

    /// True when no explicit policies are registered
    pub fn is_empty(&self) -> bool {
        self.by_instance.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = ComparisonPolicy::default();
        assert_eq!(policy.columns, ColumnSelection::All);
        assert!(!policy.ignore_order);
        assert_eq!(policy.tolerance, 0.01);
        assert_eq!(policy.extra_columns, ExtraColumns::Allow);
        assert!(!policy.text.case_insensitive);
        assert!(!policy.text.trim_whitespace);
    }

    #[test]
    fn empty_positions_mean_all_columns() {
        assert_eq!(ColumnSelection::from_positions(vec![]), ColumnSelection::All);
        assert_eq!(
            ColumnSelection::from_positions(vec![1]),
            ColumnSelection::Subset(vec![1])
        );
    }

    #[test]
    fn tri_state_resolution() {
        assert_eq!(ColumnSelection::All.resolve(3), Some(vec![0, 1, 2]));
        assert_eq!(ColumnSelection::Subset(vec![2, 0]).resolve(3), Some(vec![2, 0]));
        assert_eq!(ColumnSelection::Nothing.resolve(3), None);
        // All on a zero-width gold table is an empty projection, not Nothing
        assert_eq!(ColumnSelection::All.resolve(0), Some(vec![]));
    }

    #[test]
    fn out_of_range_is_policy_error() {
        let err = ColumnSelection::Subset(vec![0, 3]).validate(3).unwrap_err();
        assert_eq!(err, PolicyError::ColumnOutOfRange { index: 3, width: 3 });
    }

    #[test]
    fn duplicate_positions_rejected() {
        let err = ColumnSelection::Subset(vec![1, 1]).validate(3).unwrap_err();
        assert_eq!(err, PolicyError::DuplicateColumn { index: 1 });
    }

    #[test]
    fn constructed_empty_subset_rejected() {
        let err = ColumnSelection::Subset(vec![]).validate(3).unwrap_err();
        assert_eq!(err, PolicyError::EmptySubset);
    }

    #[test]
    fn invalid_tolerance() {
        let policy = ComparisonPolicy::default().with_tolerance(-1.0);
        assert!(matches!(policy.validate(0, 1), Err(PolicyError::InvalidTolerance(_))));
        let policy = ComparisonPolicy::default().with_tolerance(f64::NAN);
        assert!(policy.validate(0, 1).is_err());
    }

    #[test]
    fn variant_columns_fall_back() {
        let mut policy = ComparisonPolicy::default().with_columns(ColumnSelection::Subset(vec![0]));
        policy.variant_columns = vec![ColumnSelection::Subset(vec![1])];
        assert_eq!(policy.columns_for_variant(0), &ColumnSelection::Subset(vec![1]));
        assert_eq!(policy.columns_for_variant(1), &ColumnSelection::Subset(vec![0]));
    }

    #[test]
    fn text_normalization() {
        let strict = TextNormalization::default();
        assert_eq!(strict.apply(" Abc "), " Abc ");

        let loose = TextNormalization {
            case_insensitive: true,
            trim_whitespace: true,
        };
        assert_eq!(loose.apply(" Abc "), "abc");
    }

    #[test]
    fn policy_set_lookup_falls_back_to_defaults() {
        let mut set = PolicySet::new(ComparisonPolicy::default());
        set.insert("bq001", ComparisonPolicy::default().with_ignore_order(true));

        assert!(set.lookup("bq001").ignore_order);
        assert!(!set.lookup("local002").ignore_order);
        assert!(set.contains("bq001"));
        assert!(!set.contains("local002"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn policy_toml_defaults() {
        let policy: ComparisonPolicy = toml::from_str("ignore_order = true").unwrap();
        assert!(policy.ignore_order);
        assert_eq!(policy.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(policy.columns, ColumnSelection::All);
    }
}

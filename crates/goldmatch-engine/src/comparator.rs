//! Table comparator
//!
//! Decides whether a candidate result table is equivalent to a gold table
//! under a comparison policy. Pure and deterministic: the same inputs always
//! produce the same verdict and the same mismatch detail.

use crate::matching::{unmatched_gold_row, CellRules};
use goldmatch_core::{
    ComparisonPolicy, ExtraColumns, Mismatch, MismatchKind, PolicyError, Table,
};

/// Outcome of comparing a candidate against gold
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Candidate is equivalent to gold
    Match,

    /// Candidate differs from gold
    Mismatch(Mismatch),
}

impl Verdict {
    /// Returns true for `Match`
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Mismatch detail, if any
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Match => None,
            Self::Mismatch(m) => Some(m),
        }
    }
}

impl From<Mismatch> for Verdict {
    fn from(mismatch: Mismatch) -> Self {
        Self::Mismatch(mismatch)
    }
}

/// Compares candidate tables against gold tables
pub struct TableComparator;

impl TableComparator {
    /// Compare a candidate against a single gold table
    pub fn compare(
        candidate: &Table,
        gold: &Table,
        policy: &ComparisonPolicy,
    ) -> Result<Verdict, PolicyError> {
        policy.validate(0, gold.width())?;
        Ok(Self::compare_validated(candidate, gold, policy, 0))
    }

    /// Compare a candidate against every acceptable gold variant
    ///
    /// Matches if any variant matches. The policy is validated against every
    /// variant before anything is compared, so a broken policy is reported
    /// even when an earlier variant would have matched. When nothing matches
    /// the first variant's mismatch is returned.
    pub fn compare_variants(
        candidate: &Table,
        golds: &[Table],
        policy: &ComparisonPolicy,
    ) -> Result<Verdict, PolicyError> {
        for (variant, gold) in golds.iter().enumerate() {
            policy.validate(variant, gold.width())?;
        }

        let mut first_mismatch = None;
        for (variant, gold) in golds.iter().enumerate() {
            match Self::compare_validated(candidate, gold, policy, variant) {
                Verdict::Match => return Ok(Verdict::Match),
                Verdict::Mismatch(m) => {
                    first_mismatch.get_or_insert(m);
                }
            }
        }

        Ok(first_mismatch
            .unwrap_or_else(|| Mismatch::shape("no gold variant to compare against"))
            .into())
    }

    fn compare_validated(
        candidate: &Table,
        gold: &Table,
        policy: &ComparisonPolicy,
        variant: usize,
    ) -> Verdict {
        let Some(positions) = policy.columns_for_variant(variant).resolve(gold.width()) else {
            return Verdict::Match;
        };

        if let Some(mismatch) = check_width(candidate, gold, policy, &positions) {
            return mismatch.into();
        }

        let (candidate, gold) = match (candidate.project(&positions), gold.project(&positions)) {
            (Ok(c), Ok(g)) => (c, g),
            (Err(e), _) | (_, Err(e)) => return Mismatch::shape(e.to_string()).into(),
        };

        if candidate.height() != gold.height() {
            return Mismatch::shape(format!(
                "candidate has {} rows, gold has {}",
                candidate.height(),
                gold.height()
            ))
            .with_comparison(gold.height().to_string(), candidate.height().to_string())
            .into();
        }

        let rules = CellRules::new(policy.tolerance, &policy.text);
        if policy.ignore_order {
            compare_unordered(&rules, &candidate, &gold)
        } else {
            compare_ordered(&rules, &candidate, &gold)
        }
    }
}

/// Width checks that must pass before projection
fn check_width(
    candidate: &Table,
    gold: &Table,
    policy: &ComparisonPolicy,
    positions: &[usize],
) -> Option<Mismatch> {
    if policy.extra_columns == ExtraColumns::Reject && candidate.width() > gold.width() {
        return Some(
            Mismatch::shape(format!(
                "candidate has {} columns, gold has {} and extra columns are rejected",
                candidate.width(),
                gold.width()
            ))
            .with_comparison(gold.width().to_string(), candidate.width().to_string()),
        );
    }

    let needed = positions.iter().max().map_or(0, |&p| p + 1);
    if candidate.width() < needed {
        return Some(
            Mismatch::shape(format!(
                "candidate has {} columns, comparison needs at least {}",
                candidate.width(),
                needed
            ))
            .with_comparison(needed.to_string(), candidate.width().to_string()),
        );
    }

    None
}

fn compare_ordered(rules: &CellRules<'_>, candidate: &Table, gold: &Table) -> Verdict {
    let first_difference = candidate
        .rows()
        .iter()
        .zip(gold.rows())
        .enumerate()
        .find_map(|(row, (c, g))| rules.first_difference(c, g).map(|column| (row, column)));

    let Some((row, column)) = first_difference else {
        return Verdict::Match;
    };

    if unmatched_gold_row(rules, candidate.rows(), gold.rows()).is_none() {
        return Mismatch::new(
            MismatchKind::OrderMismatch,
            format!("same rows in a different order (first out of place: row {})", row),
        )
        .at(row, column)
        .into();
    }

    let expected = &gold.rows()[row][column];
    let actual = &candidate.rows()[row][column];
    Mismatch::new(
        MismatchKind::ValueMismatch,
        format!(
            "row {}, column {} ('{}') differs",
            row,
            column,
            gold.columns()[column]
        ),
    )
    .at(row, column)
    .with_comparison(expected.to_string(), actual.to_string())
    .into()
}

fn compare_unordered(rules: &CellRules<'_>, candidate: &Table, gold: &Table) -> Verdict {
    match unmatched_gold_row(rules, candidate.rows(), gold.rows()) {
        None => Verdict::Match,
        Some(row) => {
            let rendered: Vec<String> = gold.rows()[row].iter().map(|v| v.to_string()).collect();
            Mismatch::new(
                MismatchKind::ValueMismatch,
                format!(
                    "gold row {} [{}] has no matching candidate row",
                    row,
                    rendered.join(", ")
                ),
            )
            .into()
        }
    }
}

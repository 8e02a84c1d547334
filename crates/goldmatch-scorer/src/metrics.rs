//! Score metrics collection and aggregation

use goldmatch_core::{report::ratio, Backend, Instance, Mismatch, ScoreStatus};
use goldmatch_loader::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What happened when an instance was evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// Candidate matched a gold variant
    Pass,

    /// Candidate loaded but did not match
    WrongAnswer { mismatch: Mismatch },

    /// Candidate result could not be loaded (missing, failed, timed out)
    CandidateUnavailable(LoadFailure),

    /// The instance's comparison policy is broken
    PolicyError { message: String },

    /// Gold result could not be loaded
    GoldUnavailable(LoadFailure),

    /// Evaluation itself panicked or was torn down
    Crashed { message: String },
}

impl ScoreOutcome {
    /// Pass / fail / error tag
    pub fn status(&self) -> ScoreStatus {
        match self {
            Self::Pass => ScoreStatus::Pass,
            Self::WrongAnswer { .. } | Self::CandidateUnavailable(_) => ScoreStatus::Fail,
            Self::PolicyError { .. } | Self::GoldUnavailable(_) | Self::Crashed { .. } => {
                ScoreStatus::Error
            }
        }
    }

    /// Stable failure code, `None` for a pass
    ///
    /// Wrong answers use the mismatch code, load failures are prefixed with
    /// the side that failed (e.g. `candidate:not_found`).
    pub fn failure_code(&self) -> Option<String> {
        match self {
            Self::Pass => None,
            Self::WrongAnswer { mismatch } => Some(mismatch.kind.as_str().to_string()),
            Self::CandidateUnavailable(failure) => Some(format!("candidate:{}", failure.code)),
            Self::PolicyError { .. } => Some("POLICY_ERROR".to_string()),
            Self::GoldUnavailable(failure) => Some(format!("gold:{}", failure.code)),
            Self::Crashed { .. } => Some("CRASHED".to_string()),
        }
    }

    /// Human-readable reason, `None` for a pass
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Pass => None,
            Self::WrongAnswer { mismatch } => Some(mismatch.to_string()),
            Self::CandidateUnavailable(failure) => {
                Some(format!("candidate unavailable: {}", failure.message))
            }
            Self::PolicyError { message } => Some(format!("policy error: {}", message)),
            Self::GoldUnavailable(failure) => Some(format!("gold unavailable: {}", failure.message)),
            Self::Crashed { message } => Some(format!("evaluation crashed: {}", message)),
        }
    }
}

/// Serializable summary of a load error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Short error code (`not_found`, `timeout`, ...)
    pub code: String,

    /// Full error message
    pub message: String,
}

impl From<&LoadError> for LoadFailure {
    fn from(err: &LoadError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result for a single instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Instance id (e.g., "bq011")
    pub instance_id: String,

    /// Back-end family
    pub backend: Backend,

    /// Pass / fail / error
    pub status: ScoreStatus,

    /// Outcome detail
    pub outcome: ScoreOutcome,

    /// Wall time spent on the instance
    pub duration_ms: u64,
}

impl ScoreRecord {
    pub fn new(instance: &Instance, outcome: ScoreOutcome, duration_ms: u64) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            backend: instance.backend(),
            status: outcome.status(),
            outcome,
            duration_ms,
        }
    }

    /// True when the harness could not evaluate the instance
    pub fn is_harness_error(&self) -> bool {
        self.status == ScoreStatus::Error
    }
}

/// Counters for a group of instances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStats {
    /// Instances recorded
    pub total: usize,

    /// Instances the harness could evaluate (pass + fail)
    pub attempted: usize,

    /// Instances whose candidate matched
    pub correct: usize,

    /// Candidates that loaded but did not match
    pub wrong_answers: usize,

    /// Candidates that could not be loaded
    pub candidate_errors: usize,

    /// Policy and gold problems
    pub harness_errors: usize,
}

impl BackendStats {
    fn count(&mut self, outcome: &ScoreOutcome) {
        self.total += 1;
        match outcome {
            ScoreOutcome::Pass => {
                self.attempted += 1;
                self.correct += 1;
            }
            ScoreOutcome::WrongAnswer { .. } => {
                self.attempted += 1;
                self.wrong_answers += 1;
            }
            ScoreOutcome::CandidateUnavailable(_) => {
                self.attempted += 1;
                self.candidate_errors += 1;
            }
            ScoreOutcome::PolicyError { .. }
            | ScoreOutcome::GoldUnavailable(_)
            | ScoreOutcome::Crashed { .. } => {
                self.harness_errors += 1;
            }
        }
    }

    /// correct / attempted (0.0 when nothing was attempted)
    pub fn score(&self) -> f64 {
        ratio(self.correct, self.attempted)
    }
}

/// Aggregate metrics for a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetrics {
    /// Overall counters
    pub overall: BackendStats,

    /// Per-backend counters
    pub by_backend: BTreeMap<Backend, BackendStats>,

    /// Failure code -> count
    pub failure_codes: HashMap<String, usize>,

    /// Per-instance results, in instance order
    pub records: Vec<ScoreRecord>,

    /// The run was stopped before every instance was launched
    pub cancelled: bool,
}

impl ScoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance result and update aggregate counters
    pub fn add_record(&mut self, record: ScoreRecord) {
        self.overall.count(&record.outcome);
        self.by_backend
            .entry(record.backend)
            .or_default()
            .count(&record.outcome);

        if let Some(code) = record.outcome.failure_code() {
            *self.failure_codes.entry(code).or_insert(0) += 1;
        }

        self.records.push(record);
    }

    /// correct / attempted (0.0 when nothing was attempted)
    pub fn score(&self) -> f64 {
        self.overall.score()
    }

    /// Records tagged fail (wrong answers and missing candidates)
    pub fn failures(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.records.iter().filter(|r| r.status == ScoreStatus::Fail)
    }

    /// Records tagged error (policy and gold problems)
    pub fn harness_errors(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.records.iter().filter(|r| r.is_harness_error())
    }

    /// True when any instance could not be evaluated
    pub fn has_harness_errors(&self) -> bool {
        self.overall.harness_errors > 0
    }

    /// Get top N failure codes by frequency (ties broken by code)
    pub fn top_failure_codes(&self, n: usize) -> Vec<(String, usize)> {
        let mut codes: Vec<(String, usize)> = self
            .failure_codes
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        codes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        codes.into_iter().take(n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldmatch_core::MismatchKind;

    fn record(id: &str, outcome: ScoreOutcome) -> ScoreRecord {
        ScoreRecord::new(&Instance::new(id, "db", "q"), outcome, 1)
    }

    fn wrong() -> ScoreOutcome {
        ScoreOutcome::WrongAnswer {
            mismatch: Mismatch::new(MismatchKind::ValueMismatch, "differs"),
        }
    }

    fn missing() -> ScoreOutcome {
        ScoreOutcome::CandidateUnavailable(LoadFailure::from(&LoadError::NotFound("x".into())))
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(ScoreOutcome::Pass.status(), ScoreStatus::Pass);
        assert_eq!(wrong().status(), ScoreStatus::Fail);
        assert_eq!(missing().status(), ScoreStatus::Fail);
        assert_eq!(
            ScoreOutcome::PolicyError { message: "bad".into() }.status(),
            ScoreStatus::Error
        );

        let crashed = ScoreOutcome::Crashed { message: "task panicked".into() };
        assert_eq!(crashed.status(), ScoreStatus::Error);
        assert_eq!(crashed.failure_code().as_deref(), Some("CRASHED"));
    }

    #[test]
    fn test_score_excludes_harness_errors() {
        let mut metrics = ScoreMetrics::new();
        metrics.add_record(record("bq001", ScoreOutcome::Pass));
        metrics.add_record(record("bq002", missing()));
        metrics.add_record(record(
            "local003",
            ScoreOutcome::PolicyError { message: "column 4 out of range".into() },
        ));

        assert_eq!(metrics.overall.total, 3);
        assert_eq!(metrics.overall.attempted, 2);
        assert_eq!(metrics.score(), 0.5);
        assert!(metrics.has_harness_errors());
        assert_eq!(metrics.harness_errors().count(), 1);
        assert_eq!(metrics.failures().count(), 1);
    }

    #[test]
    fn test_empty_score_is_zero() {
        assert_eq!(ScoreMetrics::new().score(), 0.0);
    }

    #[test]
    fn test_per_backend_breakdown() {
        let mut metrics = ScoreMetrics::new();
        metrics.add_record(record("bq001", ScoreOutcome::Pass));
        metrics.add_record(record("bq002", wrong()));
        metrics.add_record(record("local001", ScoreOutcome::Pass));

        let bq = &metrics.by_backend[&Backend::BigQuery];
        assert_eq!((bq.correct, bq.attempted), (1, 2));
        assert_eq!(metrics.by_backend[&Backend::Sqlite].score(), 1.0);
        assert!(!metrics.by_backend.contains_key(&Backend::Snowflake));
    }

    #[test]
    fn test_top_failure_codes() {
        let mut metrics = ScoreMetrics::new();
        metrics.add_record(record("a", wrong()));
        metrics.add_record(record("b", wrong()));
        metrics.add_record(record("c", missing()));

        assert_eq!(
            metrics.top_failure_codes(5),
            vec![
                ("VALUE_MISMATCH".to_string(), 2),
                ("candidate:not_found".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&missing()).unwrap();
        assert!(json.contains("\"type\":\"candidate_unavailable\""));
        assert!(json.contains("\"code\":\"not_found\""));
    }
}

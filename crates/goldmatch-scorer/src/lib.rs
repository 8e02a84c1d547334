//! Batch scoring of candidate results against gold results
//!
//! This crate runs a benchmark's instances through the table comparator and
//! aggregates:
//! - Score (correct / attempted)
//! - Wrong answers vs. candidates that could not be loaded
//! - Harness errors (broken evaluation standards, missing gold results)
//! - Per-backend breakdown

pub mod harness;
pub mod metrics;
pub mod report;

pub use harness::{BatchScorer, ScorerError, ScorerOptions, StopSignal};
pub use metrics::{BackendStats, LoadFailure, ScoreMetrics, ScoreOutcome, ScoreRecord};
pub use report::{FailureEntry, ScoreReport, ScoreSummary};

//! Score report generation

use crate::metrics::{BackendStats, ScoreMetrics, ScoreRecord};
use colored::Colorize;
use goldmatch_core::{Backend, ReportVersion, ScoreStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Versioned result of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Report format version
    pub version: ReportVersion,

    /// When the report was generated (RFC3339)
    pub timestamp: String,

    /// Headline numbers
    pub summary: ScoreSummary,

    /// Per-backend breakdown
    pub by_backend: BTreeMap<Backend, BackendStats>,

    /// Wrong answers and missing candidates
    pub failures: Vec<FailureEntry>,

    /// Instances the harness could not evaluate
    pub harness_errors: Vec<FailureEntry>,

    /// Every per-instance record, in instance order
    pub records: Vec<ScoreRecord>,
}

/// Headline numbers of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub score: f64,
    pub correct: usize,
    pub attempted: usize,
    pub total: usize,
    pub wrong_answers: usize,
    pub candidate_errors: usize,
    pub harness_errors: usize,
    pub cancelled: bool,
}

/// One failing instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub instance_id: String,
    pub status: ScoreStatus,
    pub code: String,
    pub reason: String,
}

impl FailureEntry {
    fn from_record(record: &ScoreRecord) -> Self {
        Self {
            instance_id: record.instance_id.clone(),
            status: record.status,
            code: record.outcome.failure_code().unwrap_or_default(),
            reason: record.outcome.reason().unwrap_or_default(),
        }
    }
}

impl ScoreReport {
    /// Build a report from batch metrics, stamped with the current time
    pub fn new(metrics: &ScoreMetrics) -> Self {
        let overall = &metrics.overall;
        let summary = ScoreSummary {
            score: metrics.score(),
            correct: overall.correct,
            attempted: overall.attempted,
            total: overall.total,
            wrong_answers: overall.wrong_answers,
            candidate_errors: overall.candidate_errors,
            harness_errors: overall.harness_errors,
            cancelled: metrics.cancelled,
        };

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary,
            by_backend: metrics.by_backend.clone(),
            failures: metrics.failures().map(FailureEntry::from_record).collect(),
            harness_errors: metrics
                .harness_errors()
                .map(FailureEntry::from_record)
                .collect(),
            records: metrics.records.clone(),
        }
    }

    /// Generate a human-readable terminal report
    pub fn print_terminal_report(&self) {
        println!("\n{}", "╔══════════════════════════════════════════════════════════════════╗".cyan());
        println!("{}", "║       goldmatch Score Report                                     ║".cyan().bold());
        println!("{}", "╚══════════════════════════════════════════════════════════════════╝".cyan());

        let s = &self.summary;
        println!("\n{}", "Summary:".bold());
        println!("  Score:                       {:.4}", s.score);
        println!("  Correct / Attempted:         {}/{}", s.correct, s.attempted);
        println!("  Instances:                   {}", s.total);
        println!("  Wrong Answers:               {}", s.wrong_answers);
        println!("  Candidate Load Errors:       {}", s.candidate_errors);
        println!("  Harness Errors:              {}", s.harness_errors);

        if !self.by_backend.is_empty() {
            println!("\n{}", "Per-Backend Breakdown:".bold());
            for (backend, stats) in &self.by_backend {
                println!(
                    "  {:<12} {}/{} ({:.1}%)",
                    backend.to_string().green(),
                    stats.correct,
                    stats.attempted,
                    stats.score() * 100.0
                );
            }
        }

        if !self.failures.is_empty() {
            println!("\n{}", "Failing Instances:".bold());
            for failure in &self.failures {
                println!(
                    "  {} [{}] {}",
                    failure.instance_id.red(),
                    failure.code.yellow(),
                    preview(&failure.reason).dimmed()
                );
            }
        }

        if !self.harness_errors.is_empty() {
            println!(
                "\n{}",
                format!(
                    "HARNESS ERRORS ({}): these instances could not be evaluated",
                    self.harness_errors.len()
                )
                .red()
                .bold()
            );
            for error in &self.harness_errors {
                println!("  {} {}", "✗".red(), error.instance_id.red().bold());
                println!("      {}", error.reason);
            }
        }

        if s.cancelled {
            println!(
                "\n  {} Run was cancelled before every instance was launched",
                "!".yellow()
            );
        }

        println!();
    }

    /// Export report as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export report as JSON to file
    pub fn save_json(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn preview(reason: &str) -> String {
    const LIMIT: usize = 100;
    match reason.char_indices().nth(LIMIT - 3) {
        Some((cut, _)) if reason.chars().count() > LIMIT => format!("{}...", &reason[..cut]),
        _ => reason.to_string(),
    }
}

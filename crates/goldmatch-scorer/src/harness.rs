//! Batch scorer: runs every instance through the comparator

use crate::metrics::{LoadFailure, ScoreMetrics, ScoreOutcome, ScoreRecord};

use goldmatch_core::config::RunConfig;
use goldmatch_core::{
    ComparisonPolicy, GoldErrorMode, Instance, PolicyError, PolicySet, Table,
};
use goldmatch_engine::{profile_table, TableComparator, Verdict};
use goldmatch_loader::{LoadError, TableLoader};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Fatal batch errors
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("Gold result unavailable for {instance_id}: {source}")]
    GoldUnavailable {
        instance_id: String,
        #[source]
        source: LoadError,
    },

    #[error("Worker pool closed unexpectedly")]
    PoolClosed,
}

/// Shared flag that stops a running batch from launching new instances
///
/// Instances already in flight still finish.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch scorer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerOptions {
    /// Maximum instances evaluated at once
    pub parallel: usize,

    /// Bound on every single load call
    pub load_timeout: Duration,

    /// What a gold load failure does to the batch
    pub on_gold_error: GoldErrorMode,
}

impl Default for ScorerOptions {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

impl ScorerOptions {
    pub fn from_config(run: &RunConfig) -> Self {
        Self {
            parallel: run.parallel.max(1),
            load_timeout: Duration::from_secs(run.timeout_seconds),
            on_gold_error: run.on_gold_error,
        }
    }
}

/// Scores candidate results against gold results for a list of instances
///
/// Instances are evaluated concurrently, at most `parallel` at a time.
/// Records come back in instance order no matter which finishes first.
#[derive(Debug, Clone, Default)]
pub struct BatchScorer {
    options: ScorerOptions,
    stop: StopSignal,
}

impl BatchScorer {
    pub fn new(options: ScorerOptions) -> Self {
        Self {
            options,
            stop: StopSignal::new(),
        }
    }

    /// Use an externally owned stop signal (e.g. raised on Ctrl-C)
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.options.parallel = parallel.max(1);
        self
    }

    pub fn with_timeout(mut self, load_timeout: Duration) -> Self {
        self.options.load_timeout = load_timeout;
        self
    }

    pub fn with_gold_error_mode(mut self, mode: GoldErrorMode) -> Self {
        self.options.on_gold_error = mode;
        self
    }

    pub fn options(&self) -> &ScorerOptions {
        &self.options
    }

    /// Handle for stopping this scorer
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Evaluate every instance and aggregate the results
    ///
    /// Candidate load failures, wrong answers, policy errors and crashed
    /// evaluations are recorded per instance. A gold load failure either
    /// aborts the run or is recorded, depending on `on_gold_error`.
    pub async fn run(
        &self,
        instances: &[Instance],
        policies: &PolicySet,
        candidates: Arc<dyn TableLoader>,
        golds: Arc<dyn TableLoader>,
    ) -> Result<ScoreMetrics, ScorerError> {
        tracing::info!(
            instances = instances.len(),
            parallel = self.options.parallel,
            candidate_loader = candidates.name(),
            gold_loader = golds.name(),
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.parallel.max(1)));
        let aborted = StopSignal::new();
        let mut handles = Vec::with_capacity(instances.len());
        let mut cancelled = false;

        for instance in instances {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ScorerError::PoolClosed)?;

            if aborted.is_stopped() {
                break;
            }
            if self.stop.is_stopped() {
                cancelled = true;
                break;
            }

            let task = InstanceTask {
                instance: instance.clone(),
                policy: policies.lookup(&instance.instance_id),
                candidates: Arc::clone(&candidates),
                golds: Arc::clone(&golds),
                options: self.options,
                aborted: aborted.clone(),
            };
            let span = tracing::info_span!("instance", instance_id = %instance.instance_id);

            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    task.evaluate().await
                }
                .instrument(span),
            );
            handles.push((instance, Instant::now(), handle));
        }

        let mut metrics = ScoreMetrics::new();
        let mut first_error = None;

        // Joined in launch order, which is instance order
        for (instance, launched, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(
                        instance_id = %instance.instance_id,
                        error = %err,
                        "HARNESS ERROR: evaluation task failed"
                    );
                    let outcome = ScoreOutcome::Crashed {
                        message: err.to_string(),
                    };
                    let elapsed = launched.elapsed().as_millis() as u64;
                    Ok(ScoreRecord::new(instance, outcome, elapsed))
                }
            };
            match result {
                Ok(record) => metrics.add_record(record),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            tracing::error!(error = %err, "Batch aborted");
            return Err(err);
        }

        metrics.cancelled = cancelled;
        if cancelled {
            tracing::warn!(
                launched = metrics.records.len(),
                total = instances.len(),
                "Batch stopped before all instances were launched"
            );
        }

        tracing::info!(
            correct = metrics.overall.correct,
            attempted = metrics.overall.attempted,
            harness_errors = metrics.overall.harness_errors,
            score = metrics.score(),
            "Batch finished"
        );

        Ok(metrics)
    }
}

struct InstanceTask {
    instance: Instance,
    policy: ComparisonPolicy,
    candidates: Arc<dyn TableLoader>,
    golds: Arc<dyn TableLoader>,
    options: ScorerOptions,
    aborted: StopSignal,
}

impl InstanceTask {
    async fn evaluate(self) -> Result<ScoreRecord, ScorerError> {
        let started = Instant::now();
        let id = self.instance.instance_id.as_str();

        let golds = match self.bounded(self.golds.load_variants(id)).await {
            Ok(golds) => golds,
            Err(err) => match self.options.on_gold_error {
                GoldErrorMode::Abort => {
                    self.aborted.stop();
                    return Err(ScorerError::GoldUnavailable {
                        instance_id: id.to_string(),
                        source: err,
                    });
                }
                GoldErrorMode::Record => {
                    tracing::error!(error = %err, "HARNESS ERROR: gold result unavailable");
                    let outcome = ScoreOutcome::GoldUnavailable(LoadFailure::from(&err));
                    return Ok(self.finish(outcome, started));
                }
            },
        };

        // A broken policy is a harness error whatever the candidate does
        for (variant, gold) in golds.iter().enumerate() {
            if let Err(err) = self.policy.validate(variant, gold.width()) {
                return Ok(self.finish(policy_error(&err), started));
            }
        }

        let candidate = match self.bounded(self.candidates.load(id)).await {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Candidate unavailable");
                let outcome = ScoreOutcome::CandidateUnavailable(LoadFailure::from(&err));
                return Ok(self.finish(outcome, started));
            }
        };

        let policy = self.policy.clone();
        let compared = tokio::task::spawn_blocking(move || {
            let verdict = TableComparator::compare_variants(&candidate, &golds, &policy);
            (candidate, verdict)
        })
        .await;

        let (candidate, verdict) = match compared {
            Ok(done) => done,
            Err(err) => {
                tracing::error!(error = %err, "HARNESS ERROR: comparison failed");
                let outcome = ScoreOutcome::Crashed {
                    message: err.to_string(),
                };
                return Ok(self.finish(outcome, started));
            }
        };

        let outcome = match verdict {
            Ok(Verdict::Match) => {
                tracing::debug!("Candidate matches");
                ScoreOutcome::Pass
            }
            Ok(Verdict::Mismatch(mismatch)) => {
                tracing::debug!(kind = %mismatch.kind, detail = %mismatch, "Wrong answer");
                log_mixed_columns(&candidate);
                ScoreOutcome::WrongAnswer { mismatch }
            }
            Err(err) => policy_error(&err),
        };

        Ok(self.finish(outcome, started))
    }

    /// Apply the load timeout to one loader call
    async fn bounded<T>(
        &self,
        load: impl Future<Output = Result<T, LoadError>>,
    ) -> Result<T, LoadError> {
        match tokio::time::timeout(self.options.load_timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(LoadError::Timeout {
                instance_id: self.instance.instance_id.clone(),
                limit: self.options.load_timeout,
            }),
        }
    }

    fn finish(&self, outcome: ScoreOutcome, started: Instant) -> ScoreRecord {
        let elapsed = started.elapsed().as_millis() as u64;
        ScoreRecord::new(&self.instance, outcome, elapsed)
    }
}

fn policy_error(err: &PolicyError) -> ScoreOutcome {
    tracing::error!(error = %err, "HARNESS ERROR: evaluation standard is broken");
    ScoreOutcome::PolicyError {
        message: err.to_string(),
    }
}

fn log_mixed_columns(candidate: &Table) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let profile = profile_table(candidate);
    for column in profile.mixed_columns() {
        tracing::debug!(
            column = column.position,
            name = %column.name,
            kinds = %column.summary(),
            "Candidate column mixes value kinds"
        );
    }
}

//! Integration tests for the batch scorer
//!
//! Gold and candidate results come from mock loaders, so every failure mode
//! (missing files, execution errors, slow loads) can be staged precisely.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p goldmatch-scorer --test integration_tests
//! ```

use goldmatch_core::{
    Backend, ColumnSelection, ComparisonPolicy, GoldErrorMode, Instance, MismatchKind, PolicySet,
    ScoreStatus, Table, Value,
};
use goldmatch_loader::{LoadError, MockLoader, MockLoaderBuilder, TableLoader};
use goldmatch_scorer::{
    BatchScorer, ScoreOutcome, ScoreReport, ScorerError, ScorerOptions, StopSignal,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Helpers
// =============================================================================

fn id_total(rows: &[(f64, f64)]) -> Table {
    Table::load(
        vec!["id".into(), "total".into()],
        rows.iter()
            .map(|(id, total)| vec![Value::Number(*id), Value::Number(*total)])
            .collect(),
    )
    .unwrap()
}

fn instances(ids: &[&str]) -> Vec<Instance> {
    ids.iter()
        .map(|id| Instance::new(*id, "E_commerce", "What is the total?"))
        .collect()
}

fn default_policies() -> PolicySet {
    PolicySet::new(ComparisonPolicy::default())
}

fn loader(builder: MockLoaderBuilder) -> Arc<dyn TableLoader> {
    Arc::new(builder.build())
}

fn scorer() -> BatchScorer {
    BatchScorer::new(ScorerOptions::default())
}

/// Candidate source that panics for one instance and serves the rest
struct PanicsOn {
    instance_id: &'static str,
    inner: MockLoader,
}

#[async_trait::async_trait]
impl TableLoader for PanicsOn {
    fn name(&self) -> &'static str {
        "panics-on"
    }

    async fn load(&self, instance_id: &str) -> Result<Table, LoadError> {
        if instance_id == self.instance_id {
            panic!("loader blew up on {}", instance_id);
        }
        self.inner.load(instance_id).await
    }
}

// =============================================================================
// Scoring Scenarios
// =============================================================================

#[tokio::test]
async fn test_identical_tables_score_one() {
    let table = id_total(&[(1.0, 10.0), (2.0, 20.0)]);
    let gold = loader(MockLoaderBuilder::new().with_table("local001", table.clone()));
    let candidate = loader(MockLoaderBuilder::new().with_table("local001", table));

    let metrics = scorer()
        .run(&instances(&["local001"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.score(), 1.0);
    assert_eq!((metrics.overall.correct, metrics.overall.attempted), (1, 1));
    assert_eq!(metrics.records[0].outcome, ScoreOutcome::Pass);
    assert!(!metrics.cancelled);
}

#[tokio::test]
async fn test_value_within_tolerance_matches() {
    let gold = loader(MockLoaderBuilder::new().with_table("local002", id_total(&[(1.0, 10.0)])));
    let candidate =
        loader(MockLoaderBuilder::new().with_table("local002", id_total(&[(1.0, 10.005)])));

    let metrics = scorer()
        .run(&instances(&["local002"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.records[0].status, ScoreStatus::Pass);
}

#[tokio::test]
async fn test_missing_candidate_is_load_error_not_wrong_answer() {
    let table = id_total(&[(1.0, 10.0)]);
    let gold = loader(
        MockLoaderBuilder::new()
            .with_table("local001", table.clone())
            .with_table("local002", table.clone()),
    );
    let candidate = loader(MockLoaderBuilder::new().with_table("local001", table));

    let metrics = scorer()
        .run(
            &instances(&["local001", "local002"]),
            &default_policies(),
            candidate,
            gold,
        )
        .await
        .unwrap();

    assert_eq!(metrics.score(), 0.5);
    assert_eq!(metrics.overall.candidate_errors, 1);
    assert_eq!(metrics.overall.wrong_answers, 0);

    let missing = &metrics.records[1];
    assert_eq!(missing.instance_id, "local002");
    assert_eq!(missing.status, ScoreStatus::Fail);
    match &missing.outcome {
        ScoreOutcome::CandidateUnavailable(failure) => assert_eq!(failure.code, "not_found"),
        other => panic!("expected a candidate load error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wrong_answer_carries_mismatch() {
    let gold = loader(MockLoaderBuilder::new().with_table("bq001", id_total(&[(1.0, 10.0)])));
    let candidate = loader(MockLoaderBuilder::new().with_table("bq001", id_total(&[(1.0, 11.0)])));

    let metrics = scorer()
        .run(&instances(&["bq001"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.overall.wrong_answers, 1);
    assert_eq!(metrics.score(), 0.0);
    match &metrics.records[0].outcome {
        ScoreOutcome::WrongAnswer { mismatch } => {
            assert_eq!(mismatch.kind, MismatchKind::ValueMismatch)
        }
        other => panic!("expected a wrong answer, got {:?}", other),
    }
    assert_eq!(metrics.by_backend[&Backend::BigQuery].wrong_answers, 1);
}

#[tokio::test]
async fn test_execution_error_recorded_as_candidate_failure() {
    let gold = loader(MockLoaderBuilder::new().with_table("sf001", id_total(&[(1.0, 1.0)])));
    let candidate = loader(
        MockLoaderBuilder::new().with_error("sf001", LoadError::Execution("SQL compilation error".into())),
    );

    let metrics = scorer()
        .run(&instances(&["sf001"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(
        metrics.records[0].outcome.failure_code().as_deref(),
        Some("candidate:execution")
    );
}

#[tokio::test]
async fn test_gold_variants_any_match() {
    let gold = loader(MockLoaderBuilder::new().with_variants(
        "bq002",
        vec![id_total(&[(1.0, 100.0)]), id_total(&[(1.0, 101.0)])],
    ));
    let candidate = loader(MockLoaderBuilder::new().with_table("bq002", id_total(&[(1.0, 101.0)])));

    let metrics = scorer()
        .run(&instances(&["bq002"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.overall.correct, 1);
}

// =============================================================================
// Harness Errors
// =============================================================================

#[tokio::test]
async fn test_policy_error_is_harness_error() {
    let table = id_total(&[(1.0, 10.0)]);
    let gold = loader(
        MockLoaderBuilder::new()
            .with_table("local001", table.clone())
            .with_table("local002", table.clone()),
    );
    let candidate = loader(
        MockLoaderBuilder::new()
            .with_table("local001", table.clone())
            .with_table("local002", table),
    );

    let mut policies = default_policies();
    policies.insert(
        "local002",
        ComparisonPolicy::default().with_columns(ColumnSelection::Subset(vec![7])),
    );

    let metrics = scorer()
        .run(&instances(&["local001", "local002"]), &policies, candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.overall.harness_errors, 1);
    assert_eq!(metrics.overall.attempted, 1);
    assert_eq!(metrics.score(), 1.0);
    assert_eq!(metrics.records[1].status, ScoreStatus::Error);
    assert!(matches!(
        metrics.records[1].outcome,
        ScoreOutcome::PolicyError { .. }
    ));

    let report = ScoreReport::new(&metrics);
    assert_eq!(report.harness_errors.len(), 1);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_broken_policy_reported_before_candidate_load() {
    let gold = loader(MockLoaderBuilder::new().with_table("bq001", id_total(&[(1.0, 1.0)])));
    let candidate = loader(MockLoaderBuilder::new());

    let mut policies = default_policies();
    policies.insert(
        "bq001",
        ComparisonPolicy::default().with_columns(ColumnSelection::Subset(vec![5])),
    );

    let metrics = scorer()
        .run(&instances(&["bq001"]), &policies, candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.overall.harness_errors, 1);
    assert_eq!(metrics.overall.candidate_errors, 0);
    assert_eq!(metrics.overall.attempted, 0);
    assert_eq!(metrics.records[0].status, ScoreStatus::Error);
    match &metrics.records[0].outcome {
        ScoreOutcome::PolicyError { message } => assert!(message.contains('5'), "{}", message),
        other => panic!("expected a policy error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_panicking_evaluation_is_recorded_not_fatal() {
    let table = id_total(&[(1.0, 1.0)]);
    let gold = loader(
        MockLoaderBuilder::new()
            .with_table("bq001", table.clone())
            .with_table("bq002", table.clone())
            .with_table("bq003", table.clone()),
    );
    let inner = MockLoader::new();
    for id in ["bq001", "bq002", "bq003"] {
        inner.add_table(id, table.clone()).await;
    }
    let candidate: Arc<dyn TableLoader> = Arc::new(PanicsOn {
        instance_id: "bq002",
        inner,
    });

    let metrics = scorer()
        .with_parallel(2)
        .run(
            &instances(&["bq001", "bq002", "bq003"]),
            &default_policies(),
            candidate,
            gold,
        )
        .await
        .unwrap();

    assert_eq!(metrics.records.len(), 3);
    assert_eq!(metrics.overall.correct, 2);
    assert_eq!(metrics.overall.harness_errors, 1);

    let crashed = &metrics.records[1];
    assert_eq!(crashed.instance_id, "bq002");
    assert_eq!(crashed.status, ScoreStatus::Error);
    assert!(matches!(crashed.outcome, ScoreOutcome::Crashed { .. }));
    assert_eq!(crashed.outcome.failure_code().as_deref(), Some("CRASHED"));
}

#[tokio::test]
async fn test_gold_error_aborts_by_default() {
    let gold = loader(MockLoaderBuilder::new());
    let candidate = loader(MockLoaderBuilder::new().with_table("bq009", id_total(&[(1.0, 1.0)])));

    let err = scorer()
        .with_parallel(1)
        .run(&instances(&["bq009", "bq010"]), &default_policies(), candidate, gold)
        .await
        .unwrap_err();

    match err {
        ScorerError::GoldUnavailable {
            instance_id,
            source,
        } => {
            assert_eq!(instance_id, "bq009");
            assert_eq!(source, LoadError::NotFound("bq009".into()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_gold_error_recorded_when_configured() {
    let table = id_total(&[(1.0, 1.0)]);
    let gold = loader(MockLoaderBuilder::new().with_table("bq010", table.clone()));
    let candidate = loader(
        MockLoaderBuilder::new()
            .with_table("bq009", table.clone())
            .with_table("bq010", table),
    );

    let metrics = scorer()
        .with_gold_error_mode(GoldErrorMode::Record)
        .run(&instances(&["bq009", "bq010"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    assert_eq!(metrics.overall.harness_errors, 1);
    assert_eq!(metrics.overall.correct, 1);
    assert!(matches!(
        metrics.records[0].outcome,
        ScoreOutcome::GoldUnavailable(_)
    ));
}

// =============================================================================
// Concurrency, Timeouts and Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_candidate_times_out() {
    let table = id_total(&[(1.0, 1.0)]);
    let gold = loader(MockLoaderBuilder::new().with_table("local005", table.clone()));
    let candidate = loader(
        MockLoaderBuilder::new()
            .with_table("local005", table)
            .with_delay_for("local005", 60_000),
    );

    let metrics = scorer()
        .with_timeout(Duration::from_millis(1_500))
        .run(&instances(&["local005"]), &default_policies(), candidate, gold)
        .await
        .unwrap();

    match &metrics.records[0].outcome {
        ScoreOutcome::CandidateUnavailable(failure) => {
            assert_eq!(failure.code, "timeout");
            assert!(failure.message.contains("1.5s"), "{}", failure.message);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_records_follow_instance_order() {
    let ids = ["local001", "local002", "local003", "local004"];
    let table = id_total(&[(1.0, 1.0)]);

    // Later instances finish first
    let mut gold = MockLoaderBuilder::new();
    let mut candidate = MockLoaderBuilder::new();
    for (i, id) in ids.iter().enumerate() {
        gold = gold
            .with_table(*id, table.clone())
            .with_delay_for(*id, 1_000 * (ids.len() - i) as u64);
        candidate = candidate.with_table(*id, table.clone());
    }

    let metrics = scorer()
        .with_parallel(4)
        .run(&instances(&ids), &default_policies(), loader(candidate), loader(gold))
        .await
        .unwrap();

    let order: Vec<&str> = metrics
        .records
        .iter()
        .map(|r| r.instance_id.as_str())
        .collect();
    assert_eq!(order, ids.to_vec());
    assert_eq!(metrics.score(), 1.0);
}

#[tokio::test]
async fn test_stopped_before_start() {
    let stop = StopSignal::new();
    stop.stop();

    let table = id_total(&[(1.0, 1.0)]);
    let mock = MockLoader::new();
    mock.add_table("local001", table).await;

    let metrics = scorer()
        .with_stop_signal(stop)
        .run(
            &instances(&["local001"]),
            &default_policies(),
            Arc::new(mock.clone()),
            Arc::new(mock),
        )
        .await
        .unwrap();

    assert!(metrics.cancelled);
    assert!(metrics.records.is_empty());
    assert_eq!(metrics.score(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_instance_finish() {
    let table = id_total(&[(1.0, 1.0)]);
    let gold = loader(
        MockLoaderBuilder::new()
            .with_table("local001", table.clone())
            .with_table("local002", table.clone())
            .with_latency(1_000),
    );
    let candidate = loader(
        MockLoaderBuilder::new()
            .with_table("local001", table.clone())
            .with_table("local002", table),
    );

    let scorer = scorer().with_parallel(1);
    let stop = scorer.stop_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.stop();
    });

    let metrics = scorer
        .run(
            &instances(&["local001", "local002"]),
            &default_policies(),
            candidate,
            gold,
        )
        .await
        .unwrap();

    assert!(metrics.cancelled);
    assert_eq!(metrics.records.len(), 1);
    assert_eq!(metrics.records[0].status, ScoreStatus::Pass);
}

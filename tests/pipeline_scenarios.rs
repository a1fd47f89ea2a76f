//! End-to-end pipeline behaviour against a mocked completion backend.

mod common;

use common::{plan_transcript, MockLlmProvider, Reply};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use writeforge::llm::{SamplingParams, TextCompleter};
use writeforge::pipeline::{
    PipelineConfig, PipelineOrchestrator, PipelineResult, StageInput, StageKind, StageRunner,
    StagedWritingPrompts, WorkItem,
};
use writeforge::scheduler::{BatchStatistics, Scheduler};
use writeforge::sink::{recorded_indices, recorded_results, JsonlSink, ResultSink};
use writeforge::text::length_units;
use writeforge::validation::{StageValidator, ValidationThresholds};

fn config(stage_attempts: u32) -> PipelineConfig {
    PipelineConfig::default()
        .with_stage_max_attempts(stage_attempts)
        .with_request_max_attempts(2)
}

fn items(count: u64) -> Vec<WorkItem> {
    (0..count)
        .map(|i| WorkItem::new(i, format!("Write an essay about topic {}", i)))
        .collect()
}

async fn read_results(path: &std::path::Path) -> Vec<PipelineResult> {
    tokio::fs::read_to_string(path)
        .await
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn plan_transcript_of_600_units_passes_first_attempt() {
    let transcript = plan_transcript(600);
    assert_eq!(length_units(&transcript), 600);

    let provider = Arc::new(MockLlmProvider::new(
        Reply::Text(transcript.clone()),
        Reply::Fail,
        Reply::Fail,
    ));
    let runner = StageRunner::new(
        TextCompleter::new(provider.clone(), SamplingParams::default()),
        Arc::new(StageValidator::new(ValidationThresholds::default())),
        Arc::new(StagedWritingPrompts),
        10,
        2,
    );

    let outcome = runner
        .run_stage(&StageInput::Plan { query: "Explain tides" }, 0)
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.stage, StageKind::Plan);
    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(outcome.raw_text, Some(transcript));
}

#[tokio::test]
async fn always_failing_backend_stops_at_plan() {
    let provider = Arc::new(MockLlmProvider::always_failing());
    let orchestrator = PipelineOrchestrator::from_config(provider.clone(), &config(3));

    let result = orchestrator.run_item(&WorkItem::new(9, "q")).await;

    assert!(!result.passed(StageKind::Plan));
    assert_eq!(result.attempts(StageKind::Plan), 3);
    assert_eq!(result.failed_stage, Some(StageKind::Plan));
    assert!(result.final_text.is_none());
    assert_eq!(provider.prompts_with_prefix("Superwrite-Stage-2"), 0);
    // 3 stage attempts x 2 requests each
    assert_eq!(provider.prompts_with_prefix("Superwrite-Stage-1"), 6);
}

#[tokio::test]
async fn batch_of_fifty_all_succeed() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.jsonl");
    let sink = Arc::new(JsonlSink::create(&output, 1).await.unwrap());

    let provider = Arc::new(MockLlmProvider::all_valid());
    let orchestrator = PipelineOrchestrator::from_config(provider, &config(10));
    let scheduler = Scheduler::new(orchestrator, sink.clone(), 8);

    let stats = scheduler.run_batch(items(50)).await;
    let totals = sink.finalize().await.unwrap();

    assert_eq!(stats.total, 50);
    for stage in StageKind::ALL {
        assert_eq!(stats.successes(stage), 50, "stage {}", stage);
    }
    assert_eq!(stats.unexpected_errors, 0);
    assert_eq!(totals.saved, 50);

    let results = read_results(&output).await;
    assert_eq!(results.len(), 50);
    let indices: HashSet<u64> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices.len(), 50);
    assert!(results
        .iter()
        .all(|r| r.final_text.as_deref() == Some("final 0\nfinal 1\nfinal 2\nfinal 3")));
}

#[tokio::test]
async fn hundred_concurrent_saves_stay_well_formed() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.jsonl");
    let sink = Arc::new(JsonlSink::create(&output, 1).await.unwrap());

    let mut handles = Vec::new();
    for item in items(100) {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let result = PipelineResult::unexpected_failure(&item, "synthetic");
            sink.save(&result).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    sink.finalize().await.unwrap();

    let content = tokio::fs::read_to_string(&output).await.unwrap();
    assert_eq!(content.lines().count(), 100);
    let results = read_results(&output).await;
    let indices: HashSet<u64> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices.len(), 100);
}

#[tokio::test]
async fn results_are_monotonic_under_intermittent_failures() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.jsonl");
    let sink = Arc::new(JsonlSink::create(&output, 4).await.unwrap());

    let provider = Arc::new(MockLlmProvider::all_valid().with_sabotage_every(3));
    let orchestrator = PipelineOrchestrator::from_config(provider, &config(2));
    let scheduler = Scheduler::new(orchestrator, sink.clone(), 6);

    let stats = scheduler.run_batch(items(30)).await;
    sink.finalize().await.unwrap();

    let results = read_results(&output).await;
    assert_eq!(results.len(), 30);
    assert!(results.iter().all(PipelineResult::is_monotonic));
    assert!(stats.successes(StageKind::Plan) >= stats.successes(StageKind::Write));
    assert!(stats.successes(StageKind::Write) >= stats.successes(StageKind::Refine));
    assert_eq!(
        stats.successes(StageKind::Refine),
        stats.successes(StageKind::Final)
    );
}

#[tokio::test]
async fn write_failure_is_recorded_with_partial_progress() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.jsonl");
    let sink = Arc::new(JsonlSink::create(&output, 1).await.unwrap());

    let provider = Arc::new(MockLlmProvider::new(
        Reply::Valid,
        Reply::Text("<answer>too thin</answer>".to_string()),
        Reply::Valid,
    ));
    let orchestrator = PipelineOrchestrator::from_config(provider.clone(), &config(3));
    let stats = Scheduler::new(orchestrator, sink.clone(), 4)
        .run_batch(items(5))
        .await;
    sink.finalize().await.unwrap();

    assert_eq!(stats.successes(StageKind::Plan), 5);
    assert_eq!(stats.successes(StageKind::Write), 0);
    assert_eq!(stats.average_attempts(StageKind::Write), 3.0);
    assert_eq!(provider.prompts_with_prefix("Superwrite-Stage-3"), 0);

    for result in read_results(&output).await {
        assert_eq!(result.failed_stage, Some(StageKind::Write));
        assert_eq!(result.partial_text, Some(plan_transcript(600)));
    }
}

#[tokio::test]
async fn resume_skips_recorded_items() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.jsonl");

    let first_sink = Arc::new(JsonlSink::create(&output, 1).await.unwrap());
    let orchestrator =
        PipelineOrchestrator::from_config(Arc::new(MockLlmProvider::all_valid()), &config(2));
    Scheduler::new(orchestrator, first_sink.clone(), 4)
        .run_batch(items(6).into_iter().take(3).collect())
        .await;
    first_sink.finalize().await.unwrap();

    let previous = recorded_results(&output).await.unwrap();
    let done: HashSet<u64> = previous.iter().map(|r| r.index).collect();
    assert_eq!(done, HashSet::from([0u64, 1, 2]));
    assert_eq!(recorded_indices(&output).await.unwrap(), done);

    let remaining: Vec<WorkItem> = items(6)
        .into_iter()
        .filter(|item| !done.contains(&item.index))
        .collect();
    let second_sink = Arc::new(JsonlSink::append(&output, 1).await.unwrap());
    let orchestrator =
        PipelineOrchestrator::from_config(Arc::new(MockLlmProvider::all_valid()), &config(2));
    let mut stats = Scheduler::new(orchestrator, second_sink.clone(), 4)
        .run_batch(remaining)
        .await;
    second_sink.finalize().await.unwrap();

    assert_eq!(stats.total, 3);
    stats.merge(&BatchStatistics::from_results(&previous));
    assert_eq!(stats.total, 6);
    assert_eq!(stats.successes(StageKind::Final), 6);

    let indices: HashSet<u64> = read_results(&output).await.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..6).collect::<HashSet<u64>>());
}

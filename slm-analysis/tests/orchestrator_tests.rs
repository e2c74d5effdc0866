//! Analyzer orchestration tests
//!
//! Scripted analyzers stand in for real backends: ordering, timeouts,
//! failure omission and the concurrency bound are checked end to end
//! through the consensus engine.

mod helpers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use helpers::{ConcurrencyProbe, MockAnalyzer};
use slm_analysis::analyzers::{AnalysisOrchestrator, OrchestratorSettings, SampleAudio};
use slm_analysis::consensus::{AgreementLevel, ConsensusEngine, EstimateValue, Property};
use uuid::Uuid;

fn sample() -> SampleAudio {
    SampleAudio {
        sample_id: Uuid::new_v4(),
        path: PathBuf::from("/samples/loop.wav"),
    }
}

fn orchestrator(max_concurrent: usize, timeout_ms: u64) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(
        ConsensusEngine::default(),
        OrchestratorSettings {
            max_concurrent_analyzers: max_concurrent,
            analyzer_timeout_ms: timeout_ms,
        },
    )
}

fn source_ids(record: &slm_analysis::consensus::AnalysisRecord) -> Vec<&str> {
    record
        .all_estimates
        .iter()
        .map(|e| e.source_id.as_str())
        .collect()
}

#[tokio::test]
async fn test_estimates_follow_registration_order() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(
            MockAnalyzer::number("slow", Property::Tempo, 120.0, 0.9)
                .with_delay(Duration::from_millis(80))
                .into_arc(),
        )
        .with_analyzer(MockAnalyzer::number("fast", Property::Tempo, 121.0, 0.8).into_arc())
        .with_analyzer(
            MockAnalyzer::number("medium", Property::Tempo, 119.0, 0.7)
                .with_delay(Duration::from_millis(20))
                .into_arc(),
        );

    let record = orchestrator
        .analyze_property(&sample(), Property::Tempo)
        .await
        .unwrap();

    assert_eq!(source_ids(&record), vec!["slow", "fast", "medium"]);
    assert_eq!(record.num_contributing_analyzers, 3);
    assert_eq!(record.agreement_level, AgreementLevel::High);
}

#[tokio::test]
async fn test_source_id_comes_from_registration() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(MockAnalyzer::label("essentia", Property::Genre, "house", 0.8).into_arc());

    let estimates = orchestrator.collect_estimates(&sample(), Property::Genre).await;
    assert_eq!(estimates.len(), 1);
    assert_eq!(estimates[0].source_id, "essentia");
}

#[tokio::test]
async fn test_timed_out_analyzer_is_omitted() {
    let orchestrator = orchestrator(4, 50)
        .with_analyzer(MockAnalyzer::number("quick", Property::Tempo, 128.0, 0.8).into_arc())
        .with_analyzer(
            MockAnalyzer::number("stuck", Property::Tempo, 60.0, 1.0)
                .with_delay(Duration::from_secs(5))
                .into_arc(),
        );

    let record = orchestrator
        .analyze_property(&sample(), Property::Tempo)
        .await
        .unwrap();

    assert_eq!(source_ids(&record), vec!["quick"]);
    assert_eq!(record.final_value, Some(EstimateValue::Number(128.0)));
    assert_eq!(record.confidence, Some(68));
}

#[tokio::test]
async fn test_failed_analyzer_is_omitted() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(MockAnalyzer::failing("broken", Property::Key, "model not loaded").into_arc())
        .with_analyzer(MockAnalyzer::label("keyfinder", Property::Key, "A minor", 0.9).into_arc());

    let record = orchestrator
        .analyze_property(&sample(), Property::Key)
        .await
        .unwrap();

    assert_eq!(source_ids(&record), vec!["keyfinder"]);
    assert_eq!(record.agreement_level, AgreementLevel::Medium);
}

#[tokio::test]
async fn test_malformed_backend_estimate_is_omitted() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(MockAnalyzer::number("overconfident", Property::Tempo, 100.0, 1.5).into_arc())
        .with_analyzer(MockAnalyzer::label("confused", Property::Tempo, "fast", 0.5).into_arc())
        .with_analyzer(MockAnalyzer::number("sane", Property::Tempo, 101.0, 0.6).into_arc());

    let record = orchestrator
        .analyze_property(&sample(), Property::Tempo)
        .await
        .unwrap();

    assert_eq!(source_ids(&record), vec!["sane"]);
}

#[tokio::test]
async fn test_no_supporting_analyzer_is_not_analyzed() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(MockAnalyzer::number("bpm", Property::Tempo, 120.0, 0.9).into_arc());

    let record = orchestrator
        .analyze_property(&sample(), Property::Mood)
        .await
        .unwrap();

    assert!(!record.is_analyzed());
    assert_eq!(record.final_value, None);
    assert_eq!(record.confidence, None);
    assert_eq!(record.agreement_level, AgreementLevel::None);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let mut orchestrator = orchestrator(2, 5_000);
    for i in 0..6 {
        orchestrator.register(
            MockAnalyzer::number(&format!("a{}", i), Property::Loudness, -14.0, 0.7)
                .with_delay(Duration::from_millis(30))
                .with_probe(Arc::clone(&probe))
                .into_arc(),
        );
    }

    let estimates = orchestrator.collect_estimates(&sample(), Property::Loudness).await;

    assert_eq!(estimates.len(), 6);
    assert_eq!(probe.calls(), 6);
    assert!(probe.peak() <= 2, "peak concurrency {} exceeded limit", probe.peak());
}

#[tokio::test]
async fn test_analyze_returns_one_outcome_per_property() {
    let orchestrator = orchestrator(4, 5_000)
        .with_analyzer(
            MockAnalyzer::number("multi", Property::Tempo, 124.0, 0.8)
                .also_supports(Property::Loudness)
                .into_arc(),
        )
        .with_analyzer(MockAnalyzer::label("genre-net", Property::Genre, "techno", 0.7).into_arc());

    let outcomes = orchestrator
        .analyze(&sample(), &[Property::Tempo, Property::Genre, Property::Key])
        .await;

    let properties: Vec<Property> = outcomes.iter().map(|o| o.property).collect();
    assert_eq!(properties, vec![Property::Tempo, Property::Genre, Property::Key]);

    let tempo = outcomes[0].result.as_ref().unwrap();
    assert_eq!(tempo.final_value, Some(EstimateValue::Number(124.0)));

    let genre = outcomes[1].result.as_ref().unwrap();
    assert_eq!(genre.final_value, Some(EstimateValue::Label("techno".to_string())));

    let key = outcomes[2].result.as_ref().unwrap();
    assert!(!key.is_analyzed());
}

//! Analyzer fan-out
//!
//! Calls every registered analyzer that supports a property, at most
//! `max_concurrent_analyzers` at a time, each bounded by
//! `analyzer_timeout`. Estimates are collected in registration order
//! regardless of completion order, so the same backend answers always yield
//! the same record.

use super::{Analyzer, AnalyzerError, SampleAudio};
use crate::consensus::{
    kind_of, validation, AnalysisRecord, ConsensusEngine, ConsensusError, Estimate, Property,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fan-out limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub max_concurrent_analyzers: usize,
    pub analyzer_timeout_ms: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_analyzers: 4,
            analyzer_timeout_ms: 30_000,
        }
    }
}

impl OrchestratorSettings {
    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_millis(self.analyzer_timeout_ms)
    }
}

/// Result of one property run
#[derive(Debug)]
pub struct PropertyOutcome {
    pub property: Property,
    pub result: Result<AnalysisRecord, ConsensusError>,
}

/// Runs analyzers and feeds their estimates to the consensus engine
pub struct AnalysisOrchestrator {
    analyzers: Vec<Arc<dyn Analyzer>>,
    engine: ConsensusEngine,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    pub fn new(engine: ConsensusEngine, settings: OrchestratorSettings) -> Self {
        Self {
            analyzers: Vec::new(),
            engine,
            settings,
        }
    }

    /// Register an analyzer; registration order is estimate order
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        info!(source_id = analyzer.source_id(), "Registered analyzer");
        self.analyzers.push(analyzer);
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.register(analyzer);
        self
    }

    pub fn analyzer_ids(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.source_id()).collect()
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Collect estimates for one property
    ///
    /// Failed, timed-out and malformed responses are logged and omitted.
    pub async fn collect_estimates(&self, sample: &SampleAudio, property: Property) -> Vec<Estimate> {
        let timeout = self.settings.analyzer_timeout();
        let timeout_ms = self.settings.analyzer_timeout_ms;
        let limit = self.settings.max_concurrent_analyzers.max(1);

        let calls = self
            .analyzers
            .iter()
            .filter(|a| a.supports(property))
            .map(|analyzer| {
                let analyzer = Arc::clone(analyzer);
                async move {
                    let source_id = analyzer.source_id().to_string();
                    let result = match tokio::time::timeout(timeout, analyzer.analyze(sample, property)).await {
                        Ok(result) => result,
                        Err(_) => Err(AnalyzerError::Timeout {
                            source_id: source_id.clone(),
                            timeout_ms,
                        }),
                    };
                    (source_id, result)
                }
            })
            .collect::<Vec<_>>();

        // buffered (not buffer_unordered) keeps registration order
        let results: Vec<(String, Result<Estimate, AnalyzerError>)> =
            stream::iter(calls).buffered(limit).collect().await;

        let kind = kind_of(property);
        let mut estimates = Vec::with_capacity(results.len());
        for (source_id, result) in results {
            let checked = result.and_then(|mut estimate| {
                estimate.source_id = source_id.clone();
                validation::validate_estimates(std::slice::from_ref(&estimate), kind)
                    .map_err(|failure| AnalyzerError::InvalidEstimate(failure.reason))?;
                Ok(estimate)
            });
            match checked {
                Ok(estimate) => estimates.push(estimate),
                Err(e) => {
                    warn!(%source_id, %property, error = %e, "Analyzer failed; estimate omitted");
                }
            }
        }

        debug!(
            sample_id = %sample.sample_id,
            %property,
            collected = estimates.len(),
            "Estimates collected"
        );
        estimates
    }

    /// Collect estimates and build the record for one property
    pub async fn analyze_property(
        &self,
        sample: &SampleAudio,
        property: Property,
    ) -> Result<AnalysisRecord, ConsensusError> {
        let estimates = self.collect_estimates(sample, property).await;
        self.engine.build_analysis(property, estimates)
    }

    /// Analyze several properties of one sample
    ///
    /// Properties run one after another; concurrency is spent across
    /// analyzers within a property.
    pub async fn analyze(&self, sample: &SampleAudio, properties: &[Property]) -> Vec<PropertyOutcome> {
        let mut outcomes = Vec::with_capacity(properties.len());
        for &property in properties {
            let result = self.analyze_property(sample, property).await;
            outcomes.push(PropertyOutcome { property, result });
        }
        outcomes
    }
}

//! Scripted analyzer backend for orchestration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use slm_analysis::analyzers::{Analyzer, AnalyzerError, SampleAudio};
use slm_analysis::consensus::{Estimate, EstimateValue, Property};

/// Tracks how many analyzers are inside `analyze` at once
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Behavior {
    Answer(EstimateValue, f64),
    Fail(String),
}

/// Analyzer answering one property with a fixed value after an optional delay
pub struct MockAnalyzer {
    source_id: String,
    properties: Vec<Property>,
    behavior: Behavior,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl MockAnalyzer {
    pub fn number(source_id: &str, property: Property, value: f64, confidence: f64) -> Self {
        Self::new(source_id, property, Behavior::Answer(EstimateValue::Number(value), confidence))
    }

    pub fn label(source_id: &str, property: Property, label: &str, confidence: f64) -> Self {
        Self::new(
            source_id,
            property,
            Behavior::Answer(EstimateValue::Label(label.to_string()), confidence),
        )
    }

    pub fn failing(source_id: &str, property: Property, message: &str) -> Self {
        Self::new(source_id, property, Behavior::Fail(message.to_string()))
    }

    fn new(source_id: &str, property: Property, behavior: Behavior) -> Self {
        Self {
            source_id: source_id.to_string(),
            properties: vec![property],
            behavior,
            delay: Duration::ZERO,
            probe: None,
        }
    }

    pub fn also_supports(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn into_arc(self) -> Arc<dyn Analyzer> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl Analyzer for MockAnalyzer {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn supports(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }

    async fn analyze(
        &self,
        _sample: &SampleAudio,
        _property: Property,
    ) -> Result<Estimate, AnalyzerError> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        match &self.behavior {
            // The orchestrator must overwrite whatever id a backend claims
            Behavior::Answer(value, confidence) => Ok(Estimate {
                value: value.clone(),
                self_confidence: *confidence,
                source_id: "claimed-by-backend".to_string(),
            }),
            Behavior::Fail(message) => Err(AnalyzerError::Failed(message.clone())),
        }
    }
}

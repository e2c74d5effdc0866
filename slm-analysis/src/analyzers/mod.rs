//! Analyzer backends and orchestration
//!
//! Each backend is a black box returning one [`Estimate`] per property. The
//! orchestrator fans calls out with bounded concurrency, drops failures and
//! timeouts, and hands the collected estimates to the consensus engine.

pub mod http_analyzer;
pub mod orchestrator;

pub use http_analyzer::HttpAnalyzer;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorSettings, PropertyOutcome};

use crate::consensus::{Estimate, Property, ValidationReason};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Audio handed to analyzers
#[derive(Debug, Clone)]
pub struct SampleAudio {
    pub sample_id: Uuid,
    /// Location of the uploaded audio file
    pub path: PathBuf,
}

/// Analyzer call failure; the orchestrator omits the estimate
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer '{0}' does not support property {1}")]
    Unsupported(String, Property),

    #[error("Analyzer '{source_id}' timed out after {timeout_ms} ms")]
    Timeout { source_id: String, timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Invalid estimate: {0}")]
    InvalidEstimate(#[from] ValidationReason),

    #[error("Analysis failed: {0}")]
    Failed(String),
}

/// One analysis backend
///
/// # Example
/// ```rust,ignore
/// struct FixedTempo;
///
/// #[async_trait::async_trait]
/// impl Analyzer for FixedTempo {
///     fn source_id(&self) -> &str { "fixed" }
///     fn supports(&self, property: Property) -> bool { property == Property::Tempo }
///     async fn analyze(&self, _: &SampleAudio, _: Property) -> Result<Estimate, AnalyzerError> {
///         Ok(Estimate::numeric(120.0, 0.5, "fixed"))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Identifier recorded as `source_id` on every estimate
    fn source_id(&self) -> &str;

    fn supports(&self, property: Property) -> bool;

    async fn analyze(
        &self,
        sample: &SampleAudio,
        property: Property,
    ) -> Result<Estimate, AnalyzerError>;
}

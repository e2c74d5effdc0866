//! Remote analysis backend over HTTP
//!
//! Request: `POST {endpoint}` with `{"sample_id", "path", "property"}`.
//! Response: `{"value": <number|string>, "self_confidence": <0..1>}`.
//! The `source_id` always comes from local configuration; a backend cannot
//! choose how it is identified in the audit trail.

use super::{Analyzer, AnalyzerError, SampleAudio};
use crate::consensus::{Estimate, EstimateValue, Property};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    sample_id: uuid::Uuid,
    path: String,
    property: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    value: EstimateValue,
    self_confidence: f64,
}

/// Analyzer backed by a remote HTTP service
pub struct HttpAnalyzer {
    source_id: String,
    endpoint: String,
    properties: HashSet<Property>,
    client: reqwest::Client,
}

impl HttpAnalyzer {
    /// Create a client for `endpoint` answering for `properties`
    ///
    /// `request_timeout` bounds a single HTTP exchange; the orchestrator
    /// applies its own per-call timeout on top.
    pub fn new(
        source_id: impl Into<String>,
        endpoint: impl Into<String>,
        properties: impl IntoIterator<Item = Property>,
        request_timeout: Duration,
    ) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("slm-analysis/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            source_id: source_id.into(),
            endpoint: endpoint.into(),
            properties: properties.into_iter().collect(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Analyzer for HttpAnalyzer {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn supports(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }

    async fn analyze(
        &self,
        sample: &SampleAudio,
        property: Property,
    ) -> Result<Estimate, AnalyzerError> {
        if !self.supports(property) {
            return Err(AnalyzerError::Unsupported(self.source_id.clone(), property));
        }

        let request = AnalyzeRequest {
            sample_id: sample.sample_id,
            path: sample.path.to_string_lossy().to_string(),
            property: property.as_str(),
        };

        debug!(source_id = %self.source_id, %property, endpoint = %self.endpoint, "Calling analyzer");

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::MalformedResponse(e.to_string()))?;

        Ok(Estimate {
            value: body.value,
            self_confidence: body.self_confidence,
            source_id: self.source_id.clone(),
        })
    }
}

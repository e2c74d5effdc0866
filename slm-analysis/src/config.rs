//! Service configuration for slm-analysis
//!
//! Loaded from `<config_dir>/slm/slm-analysis.toml` (or `--config`). A
//! missing file yields defaults; a malformed or invalid file is an error.
//!
//! ```toml
//! port = 5790
//! root_folder = "/srv/slm"   # read by the root folder resolver
//!
//! [logging]
//! level = "debug"
//!
//! [consensus]
//! outlier_mad_multiplier = 3.0
//!
//! [orchestrator]
//! max_concurrent_analyzers = 2
//!
//! [[analyzers]]
//! source_id = "beatnet"
//! endpoint = "http://127.0.0.1:7001/analyze"
//! properties = ["tempo"]
//! ```

use crate::analyzers::{AnalysisOrchestrator, AnalyzerError, HttpAnalyzer, OrchestratorSettings};
use crate::consensus::{ConsensusEngine, ConsensusPolicy, Property};
use serde::{Deserialize, Serialize};
use slm_common::config::{load_toml_config, LoggingConfig};
use slm_common::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Module name used for the config file and root folder resolution
pub const MODULE_NAME: &str = "slm-analysis";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5790;

/// One remote analyzer backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerEndpoint {
    pub source_id: String,
    pub endpoint: String,
    pub properties: Vec<Property>,
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisServiceConfig {
    pub port: u16,
    pub logging: LoggingConfig,
    pub consensus: ConsensusPolicy,
    pub orchestrator: OrchestratorSettings,
    pub analyzers: Vec<AnalyzerEndpoint>,
}

impl Default for AnalysisServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            consensus: ConsensusPolicy::default(),
            orchestrator: OrchestratorSettings::default(),
            analyzers: Vec::new(),
        }
    }
}

impl AnalysisServiceConfig {
    /// Load and validate; defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let config = match load_toml_config::<Self>(path)? {
            Some(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                info!("No configuration at {}; using defaults", path.display());
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.consensus
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        if self.orchestrator.max_concurrent_analyzers == 0 {
            return Err(Error::Config(
                "orchestrator.max_concurrent_analyzers must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.analyzer_timeout_ms == 0 {
            return Err(Error::Config(
                "orchestrator.analyzer_timeout_ms must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for analyzer in &self.analyzers {
            if analyzer.source_id.trim().is_empty() {
                return Err(Error::Config("analyzer source_id must not be empty".to_string()));
            }
            if !seen.insert(analyzer.source_id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate analyzer source_id '{}'",
                    analyzer.source_id
                )));
            }
            if !analyzer.endpoint.starts_with("http://") && !analyzer.endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "analyzer '{}' endpoint must be an http(s) URL, got '{}'",
                    analyzer.source_id, analyzer.endpoint
                )));
            }
            if analyzer.properties.is_empty() {
                return Err(Error::Config(format!(
                    "analyzer '{}' lists no properties",
                    analyzer.source_id
                )));
            }
        }
        Ok(())
    }

    pub fn engine(&self) -> ConsensusEngine {
        ConsensusEngine::new(self.consensus.clone())
    }

    /// Build an orchestrator with one `HttpAnalyzer` per configured endpoint
    pub fn build_orchestrator(&self) -> std::result::Result<AnalysisOrchestrator, AnalyzerError> {
        let mut orchestrator = AnalysisOrchestrator::new(self.engine(), self.orchestrator.clone());
        for endpoint in &self.analyzers {
            let analyzer = HttpAnalyzer::new(
                endpoint.source_id.clone(),
                endpoint.endpoint.clone(),
                endpoint.properties.iter().copied(),
                self.orchestrator.analyzer_timeout(),
            )?;
            orchestrator.register(Arc::new(analyzer));
        }
        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: AnalysisServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalysisServiceConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_toml() {
        let config: AnalysisServiceConfig = toml::from_str(
            r#"
            port = 6000

            [logging]
            level = "debug"

            [consensus]
            outlier_mad_multiplier = 3.0

            [orchestrator]
            max_concurrent_analyzers = 2

            [[analyzers]]
            source_id = "beatnet"
            endpoint = "http://127.0.0.1:7001/analyze"
            properties = ["tempo", "key"]
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.consensus.outlier_mad_multiplier, 3.0);
        assert_eq!(config.orchestrator.max_concurrent_analyzers, 2);
        assert_eq!(config.orchestrator.analyzer_timeout_ms, 30_000);
        assert_eq!(config.analyzers[0].properties, vec![Property::Tempo, Property::Key]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let endpoint = AnalyzerEndpoint {
            source_id: "a".to_string(),
            endpoint: "http://localhost:1/analyze".to_string(),
            properties: vec![Property::Tempo],
        };
        let config = AnalysisServiceConfig {
            analyzers: vec![endpoint.clone(), endpoint],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = AnalysisServiceConfig {
            orchestrator: OrchestratorSettings {
                max_concurrent_analyzers: 0,
                analyzer_timeout_ms: 1000,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_orchestrator_registers_in_order() {
        let config = AnalysisServiceConfig {
            analyzers: vec![
                AnalyzerEndpoint {
                    source_id: "first".to_string(),
                    endpoint: "http://localhost:1/analyze".to_string(),
                    properties: vec![Property::Tempo],
                },
                AnalyzerEndpoint {
                    source_id: "second".to_string(),
                    endpoint: "http://localhost:2/analyze".to_string(),
                    properties: vec![Property::Genre],
                },
            ],
            ..Default::default()
        };
        let orchestrator = config.build_orchestrator().unwrap();
        assert_eq!(orchestrator.analyzer_ids(), vec!["first", "second"]);
    }
}

//! Tracing subscriber set-up shared by SLM binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level
/// applied to the SLM crates plus `tower_http`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.level.trim().to_lowercase();
        EnvFilter::new(format!(
            "slm_common={level},slm_analysis={level},tower_http={level}"
        ))
    })
}

/// Install the global tracing subscriber
///
/// Logs go to the configured file when one is set, stderr otherwise.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .map_err(|e| Error::Config(format!("Logging init failed: {}", e)))
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Logging init failed: {}", e))),
    }
}

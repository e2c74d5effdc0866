//! Bootstrap configuration and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SLM_ROOT_FOLDER` environment variable
//! 3. `SLM_ROOT` environment variable
//! 4. `root_folder` key of the module's TOML config file
//! 5. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file never aborts start-up: the resolver
//! logs a warning and falls through to the next source.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name used under the platform config/data dirs
pub const APP_DIR_NAME: &str = "slm";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "slm.db";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/slm
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/var/lib/slm"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/slm
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/slm"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\slm
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\slm"))
    } else {
        PathBuf::from("./slm_data")
    }
}

/// Path of a module's TOML config file (`<config_dir>/slm/<module>.toml`)
pub fn module_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Resolves the root folder for one service module
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Highest-priority override, typically from `--root-folder`
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Config file to read `root_folder` from, typically `--config`
    ///
    /// `None` keeps the module's default config path.
    pub fn with_config_file(mut self, config_file: Option<PathBuf>) -> Self {
        self.config_file = config_file;
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Config file consulted at priority 4
    pub fn config_file_path(&self) -> Option<PathBuf> {
        self.config_file
            .clone()
            .or_else(|| module_config_path(&self.module_name))
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        for var in ["SLM_ROOT_FOLDER", "SLM_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!("Root folder from {}: {}", var, path);
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = self.config_file_path() {
            if let Some(root) = root_folder_from_toml(&path) {
                debug!("Root folder from {}: {}", path.display(), root.display());
                return root;
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

fn root_folder_from_toml(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read config file {}: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str::<toml::Value>(&content) {
        Ok(value) => value
            .get("root_folder")
            .and_then(|v| v.as_str())
            .map(PathBuf::from),
        Err(e) => {
            warn!("Ignoring malformed config file {}: {}", path.display(), e);
            None
        }
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Load a TOML config file into `T`
///
/// Returns `Ok(None)` when the file does not exist; parse errors are reported.
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults_when_section_empty() {
        let config: LoggingConfig = toml::from_str("").unwrap();
        assert_eq!(config.level, "info");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = RootFolderResolver::new("test-module")
            .with_cli_arg(Some(PathBuf::from("/tmp/slm-cli-root")));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/slm-cli-root"));
    }

    #[test]
    fn test_database_path_is_inside_root() {
        let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/slm-root"));
        assert_eq!(initializer.database_path(), PathBuf::from("/tmp/slm-root/slm.db"));
    }
}

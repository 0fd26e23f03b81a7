//! Application configuration for ContentFlow.
//!
//! User config lives at `~/.contentflow/contentflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentFlowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentflow";

// ---------------------------------------------------------------------------
// Config structs (matching contentflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Package validation rules.
    #[serde(default)]
    pub package: PackageConfig,

    /// Publish settings.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Audit history storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root under which per-content working directories are created.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Graph id stamped on audit records.
    #[serde(default = "default_graph_id")]
    pub graph_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            graph_id: default_graph_id(),
        }
    }
}

fn default_work_dir() -> String {
    "~/contentflow-work".into()
}
fn default_graph_id() -> String {
    "domain".into()
}

/// `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Largest accepted archive, in bytes.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Largest accepted number of archive entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Whether archives may contain other archives.
    #[serde(default)]
    pub allow_nested_archives: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_entries: default_max_entries(),
            allow_nested_archives: false,
        }
    }
}

fn default_max_size_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_max_entries() -> usize {
    10_000
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Timeout for fetching an existing artifact, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
        }
    }
}

fn default_download_timeout() -> u64 {
    60
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Whether runs are recorded in the audit history.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the audit history database.
    #[serde(default = "default_audit_db")]
    pub audit_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            audit_db: default_audit_db(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_audit_db() -> String {
    "~/.contentflow/audit.db".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, derived from the config file.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest accepted archive, in bytes.
    pub max_package_bytes: u64,
    /// Largest accepted number of archive entries.
    pub max_package_entries: usize,
    /// Whether archives may contain other archives.
    pub allow_nested_archives: bool,
    /// Timeout for fetching an existing artifact, in seconds.
    pub download_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_package_bytes: config.package.max_size_bytes,
            max_package_entries: config.package.max_entries,
            allow_nested_archives: config.package.allow_nested_archives,
            download_timeout_secs: config.publish.download_timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentFlowError::configuration("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentflow/contentflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentFlowError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ContentFlowError::configuration(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentFlowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config)
        .map_err(|e| ContentFlowError::configuration(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentFlowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

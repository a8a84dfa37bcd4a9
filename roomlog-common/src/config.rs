//! Configuration loading and root folder resolution
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ROOMLOG_ROOT`)
//! 3. TOML config file (`roomlog.toml` in the platform config dir)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "ROOMLOG_ROOT";

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and object store
    pub root_folder: Option<String>,
    /// Bind address for the HTTP server, e.g. "127.0.0.1:5850"
    pub bind: Option<String>,
    /// Secret used to sign time-limited object URLs
    pub signing_secret: Option<String>,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: Option<usize>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub signing_secret: String,
    pub max_upload_bytes: usize,
}

/// Default bind address for the image service
pub const DEFAULT_BIND: &str = "127.0.0.1:5850";

/// Default maximum upload size: 25 MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent default
    default_root_folder()
}

/// Load the TOML config from the platform config directory, if present
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = config_file_path()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    load_toml_config_from(&path)
}

/// Load a TOML config from an explicit path
pub fn load_toml_config_from(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Resolve the service configuration: environment overrides TOML, TOML
/// overrides compiled defaults. A missing signing secret gets a random
/// ephemeral one (previously minted URLs stop verifying after restart).
pub fn resolve_service_config(toml_config: &TomlConfig) -> ServiceConfig {
    let bind = std::env::var("ROOMLOG_BIND")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| toml_config.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let signing_secret = std::env::var("ROOMLOG_SIGNING_SECRET")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| toml_config.signing_secret.clone())
        .unwrap_or_else(|| {
            tracing::warn!(
                "No signing secret configured; generating an ephemeral one. \
                 Signed URLs will not survive a restart."
            );
            random_secret()
        });

    let max_upload_bytes = toml_config
        .max_upload_bytes
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

    ServiceConfig {
        bind,
        signing_secret,
        max_upload_bytes,
    }
}

/// Database file path inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("roomlog.db")
}

/// Object store directory inside the root folder
pub fn objects_path(root_folder: &Path) -> PathBuf {
    root_folder.join("objects")
}

/// Ensure the root folder exists, creating it if missing
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    std::fs::create_dir_all(root_folder)?;
    Ok(())
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("roomlog").join("roomlog.toml"))
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("roomlog"))
        .unwrap_or_else(|| PathBuf::from("./roomlog_data"))
}

fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

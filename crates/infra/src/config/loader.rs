//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if present
//! 2. If any `SCAFFOLD_*` variable is set, builds the config from the
//!    environment on top of defaults
//! 3. Otherwise probes for a config file (JSON or TOML)
//! 4. Otherwise uses defaults
//!
//! ## Environment Variables
//! - `SCAFFOLD_CACHE_SHARDS`: Store shard count (power of two)
//! - `SCAFFOLD_CACHE_LIFE_WINDOW_MS`: Entry life window in milliseconds
//! - `SCAFFOLD_CACHE_CLEAN_WINDOW_MS`: Sweep interval in milliseconds (0 = off)
//! - `SCAFFOLD_CACHE_MAX_ENTRY_SIZE`: Expected entry size in bytes
//! - `SCAFFOLD_CACHE_MAX_ENTRIES_IN_WINDOW`: Expected live entry count
//! - `SCAFFOLD_CACHE_HARD_MAX_MB`: Memory cap in MiB (0 = unlimited)
//! - `SCAFFOLD_CACHE_VERBOSE`: Log store growth (true/false)
//! - `SCAFFOLD_LOG_LEVEL`: Default log level
//! - `SCAFFOLD_LOG_FORMAT`: `text` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./scaffold.{toml,json}` then `./config.{toml,json}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::{AppConfig, LogFormat};
use crate::errors::{InfraError, InfraResult};

const ENV_PREFIX: &str = "SCAFFOLD_";
const FILE_NAMES: [&str; 4] = ["scaffold.toml", "scaffold.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `InfraError::Config` if the environment or the discovered file
/// holds invalid values.
pub fn load() -> InfraResult<AppConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    if env_configured() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load configuration from environment variables
///
/// Unset variables keep their defaults, but at least one `SCAFFOLD_*`
/// variable must be present.
///
/// # Errors
/// Returns `InfraError::Config` if no variable is set or a value is invalid.
pub fn load_from_env() -> InfraResult<AppConfig> {
    if !env_configured() {
        return Err(InfraError::Config(format!("No {ENV_PREFIX}* environment variables set")));
    }

    let mut config = AppConfig::default();
    let cache = &mut config.cache;

    if let Some(shards) = env_parse("SCAFFOLD_CACHE_SHARDS")? {
        cache.shards = shards;
    }
    if let Some(millis) = env_parse("SCAFFOLD_CACHE_LIFE_WINDOW_MS")? {
        cache.life_window = Duration::from_millis(millis);
    }
    if let Some(millis) = env_parse("SCAFFOLD_CACHE_CLEAN_WINDOW_MS")? {
        cache.clean_window = Duration::from_millis(millis);
    }
    if let Some(bytes) = env_parse("SCAFFOLD_CACHE_MAX_ENTRY_SIZE")? {
        cache.max_entry_size = bytes;
    }
    if let Some(entries) = env_parse("SCAFFOLD_CACHE_MAX_ENTRIES_IN_WINDOW")? {
        cache.max_entries_in_window = entries;
    }
    if let Some(mb) = env_parse("SCAFFOLD_CACHE_HARD_MAX_MB")? {
        cache.hard_max_cache_size_mb = mb;
    }
    cache.verbose = env_bool("SCAFFOLD_CACHE_VERBOSE", cache.verbose);

    if let Ok(level) = std::env::var("SCAFFOLD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(format) = std::env::var("SCAFFOLD_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    validate(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `InfraError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> InfraResult<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(InfraError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            InfraError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| InfraError::Config(format!("Failed to read config file: {}", e)))?;

    validate(parse_config(&contents, &config_path)?)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> InfraResult<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| InfraError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| InfraError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(InfraError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn validate(config: AppConfig) -> InfraResult<AppConfig> {
    config
        .cache
        .validate()
        .map_err(|e| InfraError::Config(format!("Invalid cache settings: {}", e)))?;
    Ok(config)
}

/// Whether any `SCAFFOLD_*` variable is present
fn env_configured() -> bool {
    std::env::vars_os()
        .any(|(key, _)| key.to_str().is_some_and(|key| key.starts_with(ENV_PREFIX)))
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `InfraError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> InfraResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| InfraError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_log_format(raw: &str) -> InfraResult<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(InfraError::Config(format!("Unsupported log format: {}", other))),
    }
}

//! Persistence of the discovered server endpoint.
//!
//! The endpoint found by one discovery round is written under the config
//! directory and read back as the canonical address for subsequent sessions,
//! until a rediscovery replaces it. Writes are temp-file + rename so a crash
//! mid-write never leaves a corrupt cache.

use crate::error::cache::CacheError;

use common::{ErrorLocation, ServerEndpoint};

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::info;

const ENDPOINT_FILE_NAME: &str = "server_endpoint.json";

/// Default configuration directory, `~/.mangahub`.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mangahub")
}

/// Persist the discovered endpoint under `{config_dir}/server_endpoint.json`.
///
/// Uses temp file + rename for atomicity.
///
/// # Errors
///
/// Returns [`CacheError`] if directory creation, serialization, write or
/// rename fails.
pub fn save_endpoint(config_dir: &Path, endpoint: &ServerEndpoint) -> Result<(), CacheError> {
    std::fs::create_dir_all(config_dir).map_err(|e| CacheError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: config_dir.to_path_buf(),
        source: e,
    })?;

    let cache_path = config_dir.join(ENDPOINT_FILE_NAME);
    let temp_path = config_dir.join(format!("{}.tmp", ENDPOINT_FILE_NAME));

    let json = serde_json::to_string_pretty(endpoint).map_err(|e| CacheError::Serialize {
        location: ErrorLocation::from(Location::caller()),
        reason: e.to_string(),
    })?;

    std::fs::write(&temp_path, json).map_err(|e| CacheError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: temp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&temp_path, &cache_path).map_err(|e| CacheError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: cache_path.clone(),
        source: e,
    })?;

    info!("Cached server endpoint {endpoint} at {}", cache_path.display());
    Ok(())
}

/// Load the cached endpoint.
///
/// # Errors
///
/// Returns [`CacheError::Read`] if the file is missing or unreadable,
/// [`CacheError::Parse`] if it exists but does not decode.
pub fn load_endpoint(config_dir: &Path) -> Result<ServerEndpoint, CacheError> {
    let cache_path = config_dir.join(ENDPOINT_FILE_NAME);

    let contents = std::fs::read_to_string(&cache_path).map_err(|e| CacheError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: cache_path.clone(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| CacheError::Parse {
        location: ErrorLocation::from(Location::caller()),
        path: cache_path,
        reason: e.to_string(),
    })
}

/// Host half of the cached endpoint - the canonical host the sync transport
/// dials.
pub fn load_server_host(config_dir: &Path) -> Result<String, CacheError> {
    load_endpoint(config_dir).map(|endpoint| endpoint.host)
}

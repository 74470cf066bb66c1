//! Where parley keeps its files, and the optional `config.toml` inside it.

use std::path::{Path, PathBuf};

use parley_types::config::GlobalConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PARLEY_DATA_DIR";

pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_DIR_NAME: &str = ".parley";

/// `$PARLEY_DATA_DIR` if set and non-blank, else `~/.parley`, else `./.parley`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_default()
            .join(DEFAULT_DIR_NAME),
    }
}

/// Read `config.toml` from `data_dir`.
///
/// A broken config never stops the program: a missing file is silent, an
/// unreadable or invalid one logs a warning, and both yield the defaults.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let path = data_dir.join(CONFIG_FILE);
    match read_config(&path).await {
        Ok(Some(config)) => {
            tracing::debug!(path = %path.display(), "Loaded config");
            config
        }
        Ok(None) => GlobalConfig::default(),
        Err(reason) => {
            tracing::warn!(path = %path.display(), %reason, "Ignoring config file");
            GlobalConfig::default()
        }
    }
}

async fn read_config(path: &Path) -> Result<Option<GlobalConfig>, String> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    toml::from_str(&text).map(Some).map_err(|e| e.to_string())
}

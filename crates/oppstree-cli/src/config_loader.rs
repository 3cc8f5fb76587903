//! Configuration discovery and loading.
//!
//! The config file is located by checking, in order:
//! 1. the `--config` flag,
//! 2. the `OPPSTREE_CONFIG` environment variable,
//! 3. `~/.oppstree/config.json`.
//!
//! With no file found, defaults are used. Keys are normalized from
//! camelCase to snake_case before deserializing.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use oppstree_types::Config;

/// Environment variable naming an explicit config path.
pub const CONFIG_ENV: &str = "OPPSTREE_CONFIG";

/// Find the config file to load, if any.
///
/// `env_path` is the value of [`CONFIG_ENV`]; it wins over the home
/// directory and is returned without an existence check.
pub fn discover_config_path(env_path: Option<String>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    let candidate = home_dir?.join(".oppstree").join("config.json");
    candidate.exists().then_some(candidate)
}

/// Load configuration from `config_override` or via discovery.
pub async fn load_config(config_override: Option<&str>) -> anyhow::Result<Config> {
    let path = match config_override {
        Some(p) => {
            let path = PathBuf::from(p);
            if !path.exists() {
                anyhow::bail!("config file not found: {p}");
            }
            Some(path)
        }
        None => discover_config_path(std::env::var(CONFIG_ENV).ok(), dirs::home_dir()),
    };

    let Some(path) = path else {
        debug!("no config file found, using defaults");
        return Ok(Config::default());
    };

    load_config_file(&path).await
}

/// Read, normalize and deserialize one config file.
pub async fn load_config_file(path: &Path) -> anyhow::Result<Config> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
    let config: Config = serde_json::from_value(normalize_keys(value))
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;

    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Recursively convert object keys from camelCase to snake_case.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (camel_to_snake(&key), normalize_keys(val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// `batchSize` → `batch_size`, `HTTPTimeout` → `http_timeout`.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next.is_some_and(|c| c.is_lowercase()))
            {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}

//! Backing data for the daemon's loader

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use peercache::BoxError;
use tracing::info;

/// Built-in dataset used when no `--source` file is given
fn default_dataset() -> HashMap<String, String> {
    [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Load a JSON object of string keys to string values, or the built-in
/// dataset when `path` is `None`
pub fn load(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let Some(path) = path else {
        return Ok(default_dataset());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading source file {}", path.display()))?;
    let data: HashMap<String, String> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing source file {}", path.display()))?;

    info!(path = %path.display(), keys = data.len(), "loaded source data");
    Ok(data)
}

/// Loader serving values from `data`
pub fn loader(
    data: HashMap<String, String>,
) -> impl Fn(&str) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static {
    move |key: &str| {
        info!(key, "[SlowDB] search key");
        data.get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| format!("{key} not exist").into())
    }
}

//! Persisted configuration files.
//!
//! A stored configuration is a flat table from option name to value, written
//! as JSON or TOML depending on the file extension.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, bail};
use serde_json::{Map, Value};

fn extension(path: &Path) -> &str {
    path.extension().and_then(|s| s.to_str()).unwrap_or("")
}

/// Read a stored configuration.
///
/// A missing or blank file yields an empty table.
pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<Map<String, Value>> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("config {} does not exist, starting from defaults", path.display());
        return Ok(Map::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value = match extension(path) {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        "toml" | "tml" => {
            let v: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            serde_json::to_value(v)?
        }
        ext => bail!("Unsupported config file extension: {ext:?}"),
    };

    match value {
        Value::Object(map) => Ok(map),
        other => bail!(
            "{} must contain a table of options, found {}",
            path.display(),
            other
        ),
    }
}

/// Write a stored configuration, backing up any existing file first.
///
/// The backup lands next to the file as `<stem>.bk-<unix-secs>.<ext>`; its
/// path is returned.
pub fn write_config(
    path: impl AsRef<Path>,
    config: &Map<String, Value>,
) -> anyhow::Result<Option<PathBuf>> {
    let path = path.as_ref();
    let ext = extension(path);

    let content = match ext {
        "toml" | "tml" => toml::to_string_pretty(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        _ => bail!("Unsupported config file extension: {ext:?}"),
    };

    let mut backup = None;
    if path.exists() {
        let bk = format!(
            "bk-{}.{ext}",
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)?
                .as_secs()
        );
        let backup_path = path.with_extension(bk);
        fs::copy(path, &backup_path)
            .with_context(|| format!("Failed to back up {}", path.display()))?;
        debug!("backed up {} to {}", path.display(), backup_path.display());
        backup = Some(backup_path);
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("configuration written to {}", path.display());
    Ok(backup)
}

//! XML configuration support.
//! - Loads settings from config.xml (quick_xml).
//! - A missing file means defaults; a malformed or invalid file is an error.
//!
//! Example:
//! ```xml
//! <config>
//!   <log_level>info</log_level>
//!   <log_file>/var/log/sponge.log</log_file>
//!   <retry_limit>500</retry_limit>
//!   <durable>true</durable>
//! </config>
//! ```

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::default_config_path;
use crate::config::types::{Config, LogLevel};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    #[serde(rename = "log_level")]
    log_level: Option<String>,
    #[serde(rename = "log_file")]
    log_file: Option<String>,
    #[serde(rename = "retry_limit")]
    retry_limit: Option<String>,
    #[serde(rename = "durable")]
    durable: Option<String>,
}

/// Load the config from the default location, falling back to defaults when absent.
pub fn load_config() -> Result<Config> {
    match default_config_path() {
        Some(path) => Ok(load_config_from_xml_path(&path)?.unwrap_or_default()),
        None => {
            debug!("no config directory available; using defaults");
            Ok(Config::default())
        }
    }
}

/// Read config from an explicit XML path.
/// Returns `Ok(None)` if the file does not exist.
pub fn load_config_from_xml_path(path: &Path) -> Result<Option<Config>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found; using defaults");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read config '{}'", path.display()));
        }
    };
    let cfg = parse_config(&content).with_context(|| format!("config '{}'", path.display()))?;
    debug!(path = %path.display(), ?cfg, "loaded config");
    Ok(Some(cfg))
}

fn parse_config(content: &str) -> Result<Config> {
    let parsed: XmlConfig = from_xml_str(content).context("malformed XML")?;
    let mut cfg = Config::default();

    if let Some(s) = non_empty(parsed.log_level.as_deref()) {
        cfg.log_level = LogLevel::parse(s).with_context(|| format!("invalid log_level '{s}'"))?;
    }
    cfg.log_file = non_empty(parsed.log_file.as_deref()).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.retry_limit.as_deref()) {
        let n: u32 = s
            .parse()
            .with_context(|| format!("invalid retry_limit '{s}'"))?;
        if n == 0 {
            bail!("retry_limit must be at least 1");
        }
        cfg.retry_limit = n;
    }
    if let Some(s) = non_empty(parsed.durable.as_deref()) {
        cfg.durable = match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => bail!("invalid durable value '{s}' (expected true or false)"),
        };
    }
    Ok(cfg)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

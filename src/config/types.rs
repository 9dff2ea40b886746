//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::replace::{DurabilityMode, ReplaceOptions, RetryBudget};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and errors (default)
    #[default]
    Normal,
    /// Lifecycle of each replacement
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Stderr/log-file verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Staging-name attempts before giving up
    pub retry_limit: u32,
    /// fsync staged data before publishing
    pub durable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: None,
            retry_limit: RetryBudget::DEFAULT_ATTEMPTS,
            durable: true,
        }
    }
}

impl Config {
    /// Options handed to every atomic writer opened under this config.
    pub fn replace_options(&self) -> ReplaceOptions {
        ReplaceOptions {
            retry_budget: RetryBudget::new(self.retry_limit),
            durability: if self.durable {
                DurabilityMode::Full
            } else {
                DurabilityMode::Data
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse(" DEBUG "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Quiet"), Some(LogLevel::Quiet));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn defaults_map_to_durable_options() {
        let opts = Config::default().replace_options();
        assert_eq!(opts.durability, DurabilityMode::Full);
        assert_eq!(opts.retry_budget.max_attempts(), 10_000);
    }

    #[test]
    fn non_durable_config_uses_data_mode() {
        let cfg = Config {
            durable: false,
            retry_limit: 7,
            ..Config::default()
        };
        let opts = cfg.replace_options();
        assert_eq!(opts.durability, DurabilityMode::Data);
        assert_eq!(opts.retry_budget.max_attempts(), 7);
    }
}

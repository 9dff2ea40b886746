//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - FILE omitted or `-` means standard output.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};
use crate::sink::SinkTarget;

/// Soak up standard input and write it to a file.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sponge",
    author,
    version,
    about = "Soak up standard input and write it to a file"
)]
pub struct Args {
    /// Append to FILE instead of overwriting it.
    #[arg(short = 'a', long)]
    pub append: bool,

    /// Replace FILE atomically: readers see the old contents or the new, never a mix.
    #[arg(short = 'r', long)]
    pub replace: bool,

    /// Output file; omitted or `-` writes to standard output.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, value_parser = clap::value_parser!(LogLevel), help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<LogLevel>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Skip fsync of the staged file before an atomic replace.
    #[arg(long)]
    pub no_fsync: bool,

    /// Attempts at a free staging name before giving up.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_limit: Option<u32>,
}

impl Args {
    /// Where the soaked-up bytes go.
    pub fn sink_target(&self) -> SinkTarget {
        match self.file.as_deref() {
            None => SinkTarget::Stdout,
            Some(p) if p.as_os_str() == "-" => SinkTarget::Stdout,
            Some(p) if self.replace => SinkTarget::Atomic {
                path: p.to_path_buf(),
                append: self.append,
            },
            Some(p) => SinkTarget::Plain {
                path: p.to_path_buf(),
                append: self.append,
            },
        }
    }

    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.clone()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        if let Some(n) = self.retry_limit {
            cfg.retry_limit = n;
        }
        if self.no_fsync {
            cfg.durable = false;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

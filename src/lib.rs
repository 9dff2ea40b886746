//! Core library for `sponge`.
//!
//! Soak up all of standard input, then write it out, optionally replacing the
//! destination atomically. The heart of the crate is [`replace`]: a writer that stages
//! bytes next to the target and publishes them in one step, so readers observe either
//! the old file or the complete new one.
//!
//! ```no_run
//! use std::io::Write;
//!
//! let mut w = sponge::open("settings.conf", false)?;
//! w.write_all(b"key = value\n")?;
//! w.commit()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod output;
pub mod platform;
pub mod replace;
pub mod shutdown;
pub mod sink;

pub use config::{
    Config, LogLevel, default_config_path, load_config, load_config_from_xml_path,
    path_has_symlink_ancestor,
};
pub use errors::ReplaceError;
pub use platform::{NativePublisher, PublishStrategy};
pub use replace::{
    AtomicWriter, DurabilityMode, ReplaceOptions, ReplacementRequest, RetryBudget, describe,
    open,
};
pub use sink::{Sink, SinkTarget};

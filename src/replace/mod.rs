//! Atomic file replacement: staging, writing, publishing.

mod helpers;
mod io_copy;
mod staging;
pub(crate) mod util;
mod writer;

pub use helpers::{describe, hint_for, io_error_with_help};
pub use io_copy::DurabilityMode;
pub use staging::{
    NameSource, PermissionSnapshot, RandomHexNames, ReplacementRequest, RetryBudget,
    StagingAllocator, StagingArtifact, STAGING_NAME_HEX_LEN, STAGING_SUFFIX,
};
pub use writer::{AtomicWriter, ReplaceOptions};

use crate::errors::ReplaceError;
use std::path::Path;

/// Open an atomic writer for `target` with default options.
pub fn open(target: impl AsRef<Path>, append: bool) -> Result<AtomicWriter, ReplaceError> {
    AtomicWriter::open(target, append)
}

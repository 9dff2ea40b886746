//! Platform-specific helpers.
//! Each OS module implements `PublishStrategy` with the primitive that OS offers for
//! atomically replacing a file; `NativePublisher` names the one compiled for this
//! target so the rest of the crate never branches on the platform.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use std::fs::File;
use std::io;
use std::path::Path;

use crate::errors::ReplaceError;
use crate::replace::{DurabilityMode, PermissionSnapshot};

#[cfg(unix)]
pub use unix::{
    RenamePublisher, apply_permissions, close_file, open_log_file_secure_append,
};
#[cfg(unix)]
pub type NativePublisher = unix::RenamePublisher;

#[cfg(windows)]
pub use windows::{
    HandleRenamePublisher, apply_permissions, close_file, open_log_file_secure_append,
};
#[cfg(windows)]
pub type NativePublisher = windows::HandleRenamePublisher;

/// "Atomically make staged content visible at a path", one implementation per OS.
pub trait PublishStrategy {
    /// Create `path` exclusively (fail with `AlreadyExists` if present), opened for
    /// writing with whatever access the later `publish`/`discard` need.
    fn create_exclusive(&self, path: &Path, perms: &PermissionSnapshot) -> io::Result<File>;

    /// Move `staging` onto `target`, consuming the handle.
    ///
    /// On failure the staging file has been removed and its handle released; the
    /// returned error joins every failure that happened on the way.
    fn publish(
        &self,
        file: File,
        staging: &Path,
        target: &Path,
        durability: DurabilityMode,
    ) -> Result<(), ReplaceError>;

    /// Release the handle and remove `path` from the filesystem.
    fn discard(&self, file: File, path: &Path) -> Result<(), ReplaceError>;

    /// Release a handle, reporting errors the OS returns from closing it.
    fn close(&self, file: File) -> io::Result<()> {
        close_file(file)
    }
}

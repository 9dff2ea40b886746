//! Unix implementations of platform helpers.
//!
//! Publishing is a single rename(2): the kernel swaps the target's directory entry in one
//! step whether or not the target exists or is open elsewhere, so readers see either the
//! old file or the new one.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::IntoRawFd;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::debug;

use super::PublishStrategy;
use crate::errors::ReplaceError;
use crate::replace::util::{fsync_dir, parent_dir, remove_if_present};
use crate::replace::{DurabilityMode, PermissionSnapshot};

/// Mode for files created without a snapshot (before umask).
const DEFAULT_MODE: u32 = 0o666;

/// POSIX rename-over-target publisher.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenamePublisher;

impl PublishStrategy for RenamePublisher {
    fn create_exclusive(&self, path: &Path, perms: &PermissionSnapshot) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .custom_flags(libc::O_CLOEXEC)
            .mode(create_mode(perms))
            .open(path)
    }

    fn publish(
        &self,
        file: File,
        staging: &Path,
        target: &Path,
        durability: DurabilityMode,
    ) -> Result<(), ReplaceError> {
        let id = FileId::of(&file);
        if let Err(source) = close_file(file) {
            let err = ReplaceError::Close {
                path: staging.to_path_buf(),
                source,
            };
            return Err(ReplaceError::join(err, [remove_staging(staging, id)]));
        }

        if let Err(source) = fs::rename(staging, target) {
            let err = ReplaceError::Publish {
                from: staging.to_path_buf(),
                to: target.to_path_buf(),
                source,
            };
            return Err(ReplaceError::join(err, [remove_staging(staging, id)]));
        }

        if durability == DurabilityMode::Full {
            let dir = parent_dir(target);
            // The rename already happened; a failed directory fsync must not undo success.
            if let Err(e) = fsync_dir(dir) {
                debug!(dir = %dir.display(), error = %e, "fsync of target directory failed");
            }
        }
        Ok(())
    }

    fn discard(&self, file: File, path: &Path) -> Result<(), ReplaceError> {
        let id = FileId::of(&file);
        let close = close_file(file).err().map(|source| ReplaceError::Close {
            path: path.to_path_buf(),
            source,
        });
        match ReplaceError::join_all([close, remove_staging(path, id)]) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn create_mode(perms: &PermissionSnapshot) -> u32 {
    perms
        .permissions()
        .map(|p| p.mode() & 0o777)
        .unwrap_or(DEFAULT_MODE)
}

/// Device and inode of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    fn of(file: &File) -> Option<Self> {
        file.metadata().ok().map(|m| Self {
            dev: m.dev(),
            ino: m.ino(),
        })
    }
}

/// Unlink `path` only while it still names the file we created.
/// Another writer may have published over it since; that file is not ours to remove.
fn remove_staging(path: &Path, ours: Option<FileId>) -> Option<ReplaceError> {
    let result = match (fs::symlink_metadata(path), ours) {
        (Err(e), _) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        (Ok(m), Some(id)) if (FileId { dev: m.dev(), ino: m.ino() }) != id => {
            debug!(path = %path.display(), "path now names another file; leaving it in place");
            Ok(())
        }
        // fstat failed on our own handle: fall back to removing by name.
        _ => remove_if_present(path),
    };
    result.err().map(|source| ReplaceError::Cleanup {
        path: path.to_path_buf(),
        source,
    })
}

/// Set the captured mode on the open handle so the umask cannot narrow it.
pub fn apply_permissions(file: &File, perms: &PermissionSnapshot) -> io::Result<()> {
    match perms.permissions() {
        Some(p) => file.set_permissions(fs::Permissions::from_mode(p.mode() & 0o777)),
        None => Ok(()),
    }
}

/// close(2) the descriptor and surface its error instead of dropping it silently.
pub fn close_file(file: File) -> io::Result<()> {
    let fd = file.into_raw_fd();
    // SAFETY: `fd` was just released from an owning File and is closed exactly once here.
    let rc = unsafe { libc::close(fd) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Open log file for appending; set 0600 only when creating a new file.
/// If the file already exists, its permissions are left as the administrator set them.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .custom_flags(libc::O_NOFOLLOW)
        .mode(0o600) // applies on create
        .open(path)
}

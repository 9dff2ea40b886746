//! The publishable writer handed to callers.
//!
//! Lifecycle:
//!   open -> write* -> commit | abort
//! `commit` and `abort` consume the writer, so each runs at most once. A writer that is
//! dropped without either is aborted best-effort and the outcome is logged.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::io_copy::{self, DurabilityMode};
use super::staging::{ReplacementRequest, RetryBudget, StagingAllocator, StagingArtifact};
use crate::errors::ReplaceError;
use crate::platform::{NativePublisher, PublishStrategy};

/// Tunables for a single replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
    pub retry_budget: RetryBudget,
    pub durability: DurabilityMode,
}

/// Streams bytes into a staging artifact and atomically publishes them on commit.
#[derive(Debug)]
pub struct AtomicWriter<P: PublishStrategy = NativePublisher> {
    // Some(..) until commit/abort/drop takes it.
    artifact: Option<StagingArtifact>,
    target: PathBuf,
    staging: PathBuf,
    direct: bool,
    durability: DurabilityMode,
    publisher: P,
}

impl AtomicWriter {
    /// Open a writer for `target` with default options and the native publish strategy.
    pub fn open(target: impl AsRef<Path>, append: bool) -> Result<Self, ReplaceError> {
        Self::open_with(
            &ReplacementRequest::new(target.as_ref(), append),
            &ReplaceOptions::default(),
            NativePublisher::default(),
        )
    }
}

impl<P: PublishStrategy> AtomicWriter<P> {
    pub fn open_with(
        request: &ReplacementRequest,
        options: &ReplaceOptions,
        publisher: P,
    ) -> Result<Self, ReplaceError> {
        let artifact = StagingAllocator::new(&publisher, options.retry_budget).allocate(request)?;
        Ok(Self {
            target: artifact.target().to_path_buf(),
            staging: artifact.path().to_path_buf(),
            direct: artifact.is_direct_at_target(),
            artifact: Some(artifact),
            durability: options.durability,
            publisher,
        })
    }

    /// Path the content will be visible at after commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path currently receiving writes (equals `target()` on the direct path).
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn is_direct_at_target(&self) -> bool {
        self.direct
    }

    /// Make the written bytes visible at the target.
    ///
    /// On failure the target keeps its previous content and the staging artifact is gone.
    pub fn commit(mut self) -> Result<(), ReplaceError> {
        let Some(artifact) = self.artifact.take() else {
            return Ok(());
        };
        let (file, path, target) = artifact.into_parts();

        if let Err(source) = io_copy::sync(&file, self.durability) {
            let err = ReplaceError::Write {
                path: path.clone(),
                source,
            };
            return Err(ReplaceError::join(err, [self.publisher.discard(file, &path).err()]));
        }

        match target {
            None => {
                self.publisher
                    .close(file)
                    .map_err(|source| ReplaceError::Close {
                        path: path.clone(),
                        source,
                    })?;
                debug!(target = %path.display(), "committed file created in place");
            }
            Some(target) => {
                self.publisher.publish(file, &path, &target, self.durability)?;
                debug!(staging = %path.display(), target = %target.display(), "published staging file");
            }
        }
        Ok(())
    }

    /// Remove every trace of this writer; the target keeps its previous content.
    pub fn abort(mut self) -> Result<(), ReplaceError> {
        match self.artifact.take() {
            Some(artifact) => self.discard(artifact),
            None => Ok(()),
        }
    }

    fn discard(&self, artifact: StagingArtifact) -> Result<(), ReplaceError> {
        let (file, path, _) = artifact.into_parts();
        self.publisher.discard(file, &path)?;
        debug!(staging = %path.display(), "discarded staging file");
        Ok(())
    }

    fn live_file(&mut self) -> io::Result<&mut std::fs::File> {
        self.artifact
            .as_mut()
            .map(StagingArtifact::file_mut)
            .ok_or_else(|| io::Error::other("writer already finished"))
    }
}

impl<P: PublishStrategy> Write for AtomicWriter<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.live_file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.live_file()?.flush()
    }
}

impl<P: PublishStrategy> Drop for AtomicWriter<P> {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            match self.discard(artifact) {
                Ok(()) => debug!(staging = %self.staging.display(), "unfinished writer dropped; staging removed"),
                Err(e) => warn!(staging = %self.staging.display(), kind = e.kind(), error = %e, "unfinished writer dropped; cleanup failed"),
            }
        }
    }
}

// Descriptor escape hatch: lets a caller hand the staged file to a child process
// while the writer keeps ownership.
#[cfg(unix)]
mod fd {
    use super::*;
    use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

    impl<P: PublishStrategy> AsFd for AtomicWriter<P> {
        fn as_fd(&self) -> BorrowedFd<'_> {
            match self.artifact.as_ref() {
                Some(a) => a.file().as_fd(),
                // commit/abort consume the writer and Drop is the only other taker.
                None => unreachable!("staging artifact is present for the writer's whole life"),
            }
        }
    }

    impl<P: PublishStrategy> AsRawFd for AtomicWriter<P> {
        fn as_raw_fd(&self) -> RawFd {
            self.as_fd().as_raw_fd()
        }
    }
}

#[cfg(windows)]
mod handle {
    use super::*;
    use std::os::windows::io::{AsHandle, AsRawHandle, BorrowedHandle, RawHandle};

    impl<P: PublishStrategy> AsHandle for AtomicWriter<P> {
        fn as_handle(&self) -> BorrowedHandle<'_> {
            match self.artifact.as_ref() {
                Some(a) => a.file().as_handle(),
                None => unreachable!("staging artifact is present for the writer's whole life"),
            }
        }
    }

    impl<P: PublishStrategy> AsRawHandle for AtomicWriter<P> {
        fn as_raw_handle(&self) -> RawHandle {
            self.as_handle().as_raw_handle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::fs;

    fn no_staging_left(dir: &Path) -> bool {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .all(|e| !e.file_name().to_string_lossy().ends_with(".tmp"))
    }

    #[test]
    fn commit_new_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out.txt");
        let mut w = AtomicWriter::open(target.path(), false).unwrap();
        assert!(w.is_direct_at_target());
        w.write_all(b"hello").unwrap();
        w.commit().unwrap();
        assert_eq!(fs::read_to_string(target.path()).unwrap(), "hello");
        assert!(no_staging_left(dir.path()));
    }

    #[test]
    fn commit_replaces_existing() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out.txt");
        target.write_str("old content").unwrap();
        let mut w = AtomicWriter::open(target.path(), false).unwrap();
        assert!(!w.is_direct_at_target());
        w.write_all(b"new").unwrap();
        // Target untouched until commit.
        assert_eq!(fs::read_to_string(target.path()).unwrap(), "old content");
        w.commit().unwrap();
        assert_eq!(fs::read_to_string(target.path()).unwrap(), "new");
        assert!(no_staging_left(dir.path()));
    }

    #[test]
    fn abort_direct_removes_created_target() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out.txt");
        let mut w = AtomicWriter::open(target.path(), false).unwrap();
        w.write_all(b"partial").unwrap();
        w.abort().unwrap();
        assert!(!target.path().exists());
    }

    #[test]
    fn drop_without_commit_acts_like_abort() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out.txt");
        target.write_str("old").unwrap();
        let staging = {
            let mut w = AtomicWriter::open(target.path(), true).unwrap();
            w.write_all(b"new").unwrap();
            w.staging_path().to_path_buf()
        };
        assert!(!staging.exists());
        assert_eq!(fs::read_to_string(target.path()).unwrap(), "old");
        assert!(no_staging_left(dir.path()));
    }

    #[test]
    fn data_durability_still_publishes() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out.txt");
        target.write_str("a").unwrap();
        let options = ReplaceOptions {
            durability: DurabilityMode::Data,
            ..Default::default()
        };
        let mut w = AtomicWriter::open_with(
            &ReplacementRequest::new(target.path(), true),
            &options,
            NativePublisher::default(),
        )
        .unwrap();
        w.write_all(b"b").unwrap();
        w.commit().unwrap();
        assert_eq!(fs::read_to_string(target.path()).unwrap(), "ab");
    }
}

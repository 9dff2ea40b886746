use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use sponge::replace::{PermissionSnapshot, StagingAllocator, StagingArtifact};
use sponge::{
    AtomicWriter, DurabilityMode, NativePublisher, PublishStrategy, ReplaceError,
    ReplaceOptions, ReplacementRequest, RetryBudget,
};

/// Native behavior, except that:
/// - creating `phantom` reports AlreadyExists although nothing is there, so the
///   allocator goes on to stat a missing target;
/// - `discard` removes the file and then reports a cleanup failure when `fail_discard` is set.
#[derive(Default)]
struct Faulty {
    phantom: Option<PathBuf>,
    fail_discard: bool,
    inner: NativePublisher,
}

impl PublishStrategy for Faulty {
    fn create_exclusive(&self, path: &Path, perms: &PermissionSnapshot) -> io::Result<File> {
        if self.phantom.as_deref() == Some(path) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        self.inner.create_exclusive(path, perms)
    }

    fn publish(
        &self,
        file: File,
        staging: &Path,
        target: &Path,
        durability: DurabilityMode,
    ) -> Result<(), ReplaceError> {
        self.inner.publish(file, staging, target, durability)
    }

    fn discard(&self, file: File, path: &Path) -> Result<(), ReplaceError> {
        self.inner.discard(file, path)?;
        if self.fail_discard {
            return Err(ReplaceError::Cleanup {
                path: path.to_path_buf(),
                source: io::Error::other("injected cleanup failure"),
            });
        }
        Ok(())
    }
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn unreadable_permissions_fall_back_to_defaults() {
    let td = tempdir().unwrap();
    let target = td.path().join("out.txt");
    let publisher = Faulty {
        phantom: Some(target.clone()),
        ..Faulty::default()
    };

    let mut alloc = StagingAllocator::new(&publisher, RetryBudget::default());
    let artifact = alloc
        .allocate(&ReplacementRequest::new(&target, false))
        .expect("stat failure must not be fatal");
    assert!(matches!(artifact, StagingArtifact::Staged { .. }));
    assert_ne!(artifact.path(), target.as_path());
    let staging = artifact.path().to_path_buf();
    drop(artifact);
    std::fs::remove_file(&staging).unwrap();
    assert!(!target.exists());
}

#[test]
fn stat_fallback_still_publishes() {
    let td = tempdir().unwrap();
    let target = td.path().join("out.txt");
    let publisher = Faulty {
        phantom: Some(target.clone()),
        ..Faulty::default()
    };

    let request = ReplacementRequest::new(&target, false);
    let mut w = AtomicWriter::open_with(&request, &ReplaceOptions::default(), publisher).unwrap();
    assert!(!w.is_direct_at_target());
    w.write_all(b"fresh").unwrap();
    w.commit().unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"fresh");
    assert_eq!(entries(td.path()), 1);
}

#[test]
fn cleanup_failure_is_joined_after_the_primary_error() {
    let td = tempdir().unwrap();
    let target = td.path().join("out.txt");
    // Append mode must seed from a target that does not exist: the copy fails,
    // then the staging file is discarded and that discard fails too.
    let publisher = Faulty {
        phantom: Some(target.clone()),
        fail_discard: true,
        ..Faulty::default()
    };

    let mut alloc = StagingAllocator::new(&publisher, RetryBudget::default());
    let err = alloc
        .allocate(&ReplacementRequest::new(&target, true))
        .unwrap_err();

    assert_eq!(err.kind(), "composite");
    let kinds: Vec<&str> = err.errors().iter().map(ReplaceError::kind).collect();
    assert_eq!(kinds, ["copy", "cleanup"]);
    assert_eq!(err.primary().kind(), "copy");
    assert_eq!(
        err.io_error().map(io::Error::kind),
        Some(io::ErrorKind::NotFound)
    );
    let msg = err.to_string();
    assert!(msg.contains("; remove '"), "{msg}");
    assert!(msg.contains("injected cleanup failure"), "{msg}");
    assert_eq!(entries(td.path()), 0);
}

#[test]
fn failing_abort_reports_cleanup_error() {
    let td = tempdir().unwrap();
    let target = td.path().join("out.txt");
    std::fs::write(&target, b"old").unwrap();
    let publisher = Faulty {
        fail_discard: true,
        ..Faulty::default()
    };

    let request = ReplacementRequest::new(&target, false);
    let mut w = AtomicWriter::open_with(&request, &ReplaceOptions::default(), publisher).unwrap();
    w.write_all(b"new").unwrap();
    let err = w.abort().unwrap_err();

    assert_eq!(err.kind(), "cleanup");
    assert_eq!(std::fs::read(&target).unwrap(), b"old");
    assert_eq!(entries(td.path()), 1);
}

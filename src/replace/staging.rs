//! Staging allocation.
//! - Creates the target in place when it does not exist yet (direct path).
//! - Otherwise creates `<dir>/<8 hex>.tmp` next to the target with exclusive semantics,
//!   retrying name collisions up to a bounded budget.
//! - Carries the target's permission bits over and, for appends, its current bytes.

use rand::RngCore;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::io_copy;
use super::util::parent_dir;
use crate::errors::ReplaceError;
use crate::platform::{self, PublishStrategy};

/// Suffix shared by every staging file, so orphans are recognizable.
pub const STAGING_SUFFIX: &str = ".tmp";
/// Number of hex characters in a generated staging name.
pub const STAGING_NAME_HEX_LEN: usize = 8;

/// What the caller wants replaced, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRequest {
    target: PathBuf,
    append: bool,
}

impl ReplacementRequest {
    pub fn new(target: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            target: target.into(),
            append,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Pre-seed the staged content with the target's current bytes.
    pub fn append(&self) -> bool {
        self.append
    }
}

/// Upper bound on staging-name attempts before allocation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
}

impl RetryBudget {
    pub const DEFAULT_ATTEMPTS: u32 = 10_000;

    /// A budget of at least one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}

/// Permission bits of an existing target, or `None` for platform defaults.
#[derive(Debug, Clone, Default)]
pub struct PermissionSnapshot {
    permissions: Option<fs::Permissions>,
}

impl PermissionSnapshot {
    /// Read the permissions of `path` (follows symlinks, like the later rename target).
    pub fn capture(path: &Path) -> Result<Self, ReplaceError> {
        fs::metadata(path)
            .map(|meta| Self {
                permissions: Some(meta.permissions()),
            })
            .map_err(|source| ReplaceError::Stat {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Defaults: rw for everyone (subject to umask) on Unix, writable on Windows.
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn permissions(&self) -> Option<&fs::Permissions> {
        self.permissions.as_ref()
    }

    pub fn is_captured(&self) -> bool {
        self.permissions.is_some()
    }
}

/// Source of candidate staging file names.
pub trait NameSource {
    fn next_name(&mut self) -> String;
}

/// Random lowercase hex names with the staging suffix, e.g. `3fa09c1e.tmp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomHexNames;

impl NameSource for RandomHexNames {
    fn next_name(&mut self) -> String {
        let mut buf = [0u8; STAGING_NAME_HEX_LEN / 2];
        rand::rng().fill_bytes(&mut buf);
        format!("{}{}", hex::encode(buf), STAGING_SUFFIX)
    }
}

/// The file a writer streams into.
#[derive(Debug)]
pub enum StagingArtifact {
    /// The target did not exist and was created in place; nothing to publish.
    Direct { path: PathBuf, file: File },
    /// A sibling of `target` that must be published to become visible.
    Staged {
        path: PathBuf,
        target: PathBuf,
        file: File,
    },
}

impl StagingArtifact {
    pub fn is_direct_at_target(&self) -> bool {
        matches!(self, StagingArtifact::Direct { .. })
    }

    /// Where the bytes are currently being written.
    pub fn path(&self) -> &Path {
        match self {
            StagingArtifact::Direct { path, .. } | StagingArtifact::Staged { path, .. } => path,
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            StagingArtifact::Direct { path, .. } => path,
            StagingArtifact::Staged { target, .. } => target,
        }
    }

    pub fn file(&self) -> &File {
        match self {
            StagingArtifact::Direct { file, .. } | StagingArtifact::Staged { file, .. } => file,
        }
    }

    pub fn file_mut(&mut self) -> &mut File {
        match self {
            StagingArtifact::Direct { file, .. } | StagingArtifact::Staged { file, .. } => file,
        }
    }

    /// Split into handle, current path and (for staged artifacts) the publish target.
    pub(crate) fn into_parts(self) -> (File, PathBuf, Option<PathBuf>) {
        match self {
            StagingArtifact::Direct { path, file } => (file, path, None),
            StagingArtifact::Staged { path, target, file } => (file, path, Some(target)),
        }
    }
}

/// Resolves a `ReplacementRequest` into a live `StagingArtifact`.
pub struct StagingAllocator<'p, P: PublishStrategy, N: NameSource = RandomHexNames> {
    publisher: &'p P,
    names: N,
    budget: RetryBudget,
}

impl<'p, P: PublishStrategy> StagingAllocator<'p, P> {
    pub fn new(publisher: &'p P, budget: RetryBudget) -> Self {
        Self::with_names(publisher, RandomHexNames, budget)
    }
}

impl<'p, P: PublishStrategy, N: NameSource> StagingAllocator<'p, P, N> {
    pub fn with_names(publisher: &'p P, names: N, budget: RetryBudget) -> Self {
        Self {
            publisher,
            names,
            budget,
        }
    }

    pub fn allocate(&mut self, request: &ReplacementRequest) -> Result<StagingArtifact, ReplaceError> {
        let target = request.target();

        match self
            .publisher
            .create_exclusive(target, &PermissionSnapshot::fallback())
        {
            Ok(file) => {
                debug!(target = %target.display(), "target absent; created in place");
                return Ok(StagingArtifact::Direct {
                    path: target.to_path_buf(),
                    file,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(ReplaceError::ExclusiveCreate {
                    path: target.to_path_buf(),
                    source,
                });
            }
        }

        let perms = PermissionSnapshot::capture(target).unwrap_or_else(|e| {
            warn!(target = %target.display(), error = %e, "using default permissions for staging file");
            PermissionSnapshot::fallback()
        });
        let dir = parent_dir(target);
        let (path, mut file) = self.create_staging(dir, &perms)?;

        if let Err(source) = platform::apply_permissions(&file, &perms) {
            let err = ReplaceError::Permissions {
                path: path.clone(),
                source,
            };
            return Err(ReplaceError::join(err, [self.publisher.discard(file, &path).err()]));
        }

        if request.append() {
            match io_copy::seed_from(target, &mut file) {
                Ok(bytes) => {
                    debug!(target = %target.display(), staging = %path.display(), bytes, "seeded staging file with original contents");
                }
                Err(source) => {
                    let err = ReplaceError::Copy {
                        path: target.to_path_buf(),
                        source,
                    };
                    return Err(ReplaceError::join(err, [self.publisher.discard(file, &path).err()]));
                }
            }
        }

        Ok(StagingArtifact::Staged {
            path,
            target: target.to_path_buf(),
            file,
        })
    }

    fn create_staging(
        &mut self,
        dir: &Path,
        perms: &PermissionSnapshot,
    ) -> Result<(PathBuf, File), ReplaceError> {
        let max = self.budget.max_attempts();
        for attempt in 1..=max {
            let path = dir.join(self.names.next_name());
            match self.publisher.create_exclusive(&path, perms) {
                Ok(file) => {
                    debug!(staging = %path.display(), attempt, "staging file created");
                    return Ok((path, file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    trace!(staging = %path.display(), attempt, "staging name taken");
                }
                Err(source) => return Err(ReplaceError::ExclusiveCreate { path, source }),
            }
        }
        warn!(dir = %dir.display(), attempts = max, "gave up looking for a free staging name");
        Err(ReplaceError::RetryBudgetExhausted {
            dir: dir.to_path_buf(),
            attempts: max,
        })
    }
}

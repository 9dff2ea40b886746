//! Typed error definitions for sponge.
//! Every fatal failure of the replacement subsystem surfaces as a `ReplaceError`.
//! Teardown steps that fail while another error is already in flight are
//! joined into a `Composite` instead of being dropped.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplaceError {
    /// Reading the target's permission bits failed. Absorbed by the allocator.
    #[error("stat '{}': {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("create '{}': {source}", path.display())]
    ExclusiveCreate { path: PathBuf, source: io::Error },

    #[error("no free staging name in '{}' after {attempts} attempts", dir.display())]
    RetryBudgetExhausted { dir: PathBuf, attempts: u32 },

    #[error("apply permissions to '{}': {source}", path.display())]
    Permissions { path: PathBuf, source: io::Error },

    #[error("copy original contents of '{}': {source}", path.display())]
    Copy { path: PathBuf, source: io::Error },

    #[error("write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("publish '{}' -> '{}': {source}", from.display(), to.display())]
    Publish {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("close '{}': {source}", path.display())]
    Close { path: PathBuf, source: io::Error },

    #[error("remove '{}': {source}", path.display())]
    Cleanup { path: PathBuf, source: io::Error },

    #[error("{0}")]
    Composite(CompositeError),
}

/// Several failures that happened together, primary first.
#[derive(Debug)]
pub struct CompositeError {
    errors: Vec<ReplaceError>,
}

impl CompositeError {
    pub fn errors(&self) -> &[ReplaceError] {
        &self.errors
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl ReplaceError {
    /// Join `primary` with every secondary failure that actually occurred.
    /// Returns `primary` unchanged when there is nothing to join.
    /// Nested composites are flattened so the order of failures is preserved.
    pub fn join<I>(primary: ReplaceError, secondaries: I) -> ReplaceError
    where
        I: IntoIterator<Item = Option<ReplaceError>>,
    {
        let mut errors = Vec::new();
        push_flat(&mut errors, primary);
        for e in secondaries.into_iter().flatten() {
            push_flat(&mut errors, e);
        }
        if errors.len() == 1
            && let Some(only) = errors.pop()
        {
            return only;
        }
        ReplaceError::Composite(CompositeError { errors })
    }

    /// Fold a list of optional failures; `None` when all steps succeeded.
    pub fn join_all<I>(results: I) -> Option<ReplaceError>
    where
        I: IntoIterator<Item = Option<ReplaceError>>,
    {
        let mut iter = results.into_iter().flatten();
        let first = iter.next()?;
        Some(ReplaceError::join(first, iter.map(Some)))
    }

    /// The failure that caused the operation to stop.
    pub fn primary(&self) -> &ReplaceError {
        match self {
            ReplaceError::Composite(c) => &c.errors[0],
            other => other,
        }
    }

    /// Every contributing failure, in the order they happened.
    pub fn errors(&self) -> &[ReplaceError] {
        match self {
            ReplaceError::Composite(c) => c.errors(),
            other => std::slice::from_ref(other),
        }
    }

    /// Stable short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplaceError::Stat { .. } => "stat",
            ReplaceError::ExclusiveCreate { .. } => "exclusive_create",
            ReplaceError::RetryBudgetExhausted { .. } => "retry_budget_exhausted",
            ReplaceError::Permissions { .. } => "permissions",
            ReplaceError::Copy { .. } => "copy",
            ReplaceError::Write { .. } => "write",
            ReplaceError::Publish { .. } => "publish",
            ReplaceError::Close { .. } => "close",
            ReplaceError::Cleanup { .. } => "cleanup",
            ReplaceError::Composite(_) => "composite",
        }
    }

    /// Underlying OS error of the primary failure, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self.primary() {
            ReplaceError::Stat { source, .. }
            | ReplaceError::ExclusiveCreate { source, .. }
            | ReplaceError::Permissions { source, .. }
            | ReplaceError::Copy { source, .. }
            | ReplaceError::Write { source, .. }
            | ReplaceError::Publish { source, .. }
            | ReplaceError::Close { source, .. }
            | ReplaceError::Cleanup { source, .. } => Some(source),
            ReplaceError::RetryBudgetExhausted { .. } | ReplaceError::Composite(_) => None,
        }
    }
}

fn push_flat(out: &mut Vec<ReplaceError>, e: ReplaceError) {
    match e {
        ReplaceError::Composite(c) => out.extend(c.errors),
        other => out.push(other),
    }
}

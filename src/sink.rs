//! Output sinks for the soaked-up bytes.
//!
//! Three destinations: standard output, a plain truncate/append file, or an
//! [`AtomicWriter`]. Only the atomic sink can take back what it wrote; `abort` on a plain
//! file just closes it.

use anyhow::{Context, Result, anyhow};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::platform::close_file;
use crate::replace::{AtomicWriter, ReplaceOptions, ReplacementRequest};

/// Where output should go, as decided by the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Stdout,
    Plain { path: PathBuf, append: bool },
    Atomic { path: PathBuf, append: bool },
}

/// An open destination.
#[derive(Debug)]
pub enum Sink {
    Stdout(io::Stdout),
    Plain { file: File, path: PathBuf },
    Atomic(AtomicWriter),
}

impl Sink {
    /// Open the destination described by `target`.
    pub fn open(target: &SinkTarget, options: &ReplaceOptions) -> Result<Self> {
        match target {
            SinkTarget::Stdout => Ok(Sink::Stdout(io::stdout())),
            SinkTarget::Plain { path, append } => {
                let file = open_plain(path, *append)?;
                debug!(path = %path.display(), append, "opened plain output file");
                Ok(Sink::Plain {
                    file,
                    path: path.clone(),
                })
            }
            SinkTarget::Atomic { path, append } => {
                let request = ReplacementRequest::new(path, *append);
                let writer = AtomicWriter::open_with(&request, options, Default::default())?;
                Ok(Sink::Atomic(writer))
            }
        }
    }

    /// The file being written, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Sink::Stdout(_) => None,
            Sink::Plain { path, .. } => Some(path),
            Sink::Atomic(w) => Some(w.target()),
        }
    }

    /// Write everything; on failure close or abort the sink and report both outcomes.
    pub fn write_all_or_abort(mut self, data: &[u8]) -> Result<Self> {
        match self.write_all(data) {
            Ok(()) => Ok(self),
            Err(write_err) => match self.abort() {
                Ok(()) => Err(anyhow!("write error: {write_err}")),
                Err(close_err) => Err(anyhow!("write error: {write_err}; {close_err:#}")),
            },
        }
    }

    /// Make the output permanent.
    pub fn commit(self) -> Result<()> {
        match self {
            Sink::Stdout(mut out) => out.flush().context("flush standard output"),
            Sink::Plain { mut file, path } => {
                file.flush()
                    .with_context(|| format!("flush '{}'", path.display()))?;
                close_file(file).with_context(|| format!("close '{}'", path.display()))
            }
            Sink::Atomic(w) => Ok(w.commit()?),
        }
    }

    /// Give up on the output. Only the atomic sink restores the previous contents.
    pub fn abort(self) -> Result<()> {
        match self {
            Sink::Stdout(_) => Ok(()),
            Sink::Plain { file, path } => {
                close_file(file).with_context(|| format!("close '{}'", path.display()))
            }
            Sink::Atomic(w) => Ok(w.abort()?),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(out) => out.write(buf),
            Sink::Plain { file, .. } => file.write(buf),
            Sink::Atomic(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::Plain { file, .. } => file.flush(),
            Sink::Atomic(w) => w.flush(),
        }
    }
}

fn open_plain(path: &Path, append: bool) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o666);
    }
    opts.open(path)
        .map_err(crate::replace::io_error_with_help("open", path))
}

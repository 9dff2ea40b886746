//! Seeding and durability for staging files.
//!
//! - `seed_from` streams the target's current bytes into a fresh staging file so later
//!   writes land after them (append mode).
//! - `sync` applies the configured `DurabilityMode` before a staging file is published.
//!
//! Snapshot semantics: the original is read once from start to EOF; bytes appended to it
//! concurrently after that point are not included.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024; // 1 MiB

/// How hard commit pushes staged bytes towards stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Bytes are handed to the OS page cache only. Fastest; a crash right after
    /// publish may leave an empty or short target.
    Data,
    /// `sync_all` the staging file before publish and fsync the directory after it (Unix).
    #[default]
    Full,
}

/// Copy all of `original` into `dst` at its current position.
/// Returns the number of bytes copied.
pub(super) fn seed_from(original: &Path, dst: &mut File) -> io::Result<u64> {
    let src = File::open(original)?;
    // io::copy picks copy_file_range/sendfile on Linux when both ends are files.
    let mut reader = BufReader::with_capacity(BUF_SIZE, src);
    io::copy(&mut reader, dst)
}

/// Make the staged bytes durable according to `mode`.
pub(super) fn sync(file: &File, mode: DurabilityMode) -> io::Result<()> {
    match mode {
        // Writes go straight to the descriptor; nothing is buffered in user space.
        DurabilityMode::Data => Ok(()),
        DurabilityMode::Full => file.sync_all(),
    }
}

//! I/O error hints.
//!
//! Turns raw OS errors into actionable messages for the command-line front end:
//!   // plain file writes (anyhow code paths)
//!   File::create(p).map_err(io_error_with_help("open", p))?;
//!
//!   // subsystem failures
//!   eprintln!("{}", describe(&replace_err));

use anyhow::anyhow;
use std::io;
use std::path::Path;

use crate::errors::ReplaceError;

/// Short platform-aware hint for `e`, if one applies.
pub fn hint_for(e: &io::Error) -> Option<&'static str> {
    if let Some(hint) = os_code_hint(e) {
        return Some(hint);
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found; verify it exists"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        _ => None,
    }
}

#[cfg(unix)]
fn os_code_hint(e: &io::Error) -> Option<&'static str> {
    match e.raw_os_error()? {
        libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions of the directory"),
        libc::EXDEV => Some("cross-filesystem; atomic rename not possible"),
        libc::EBUSY => Some("resource busy; ensure no other process holds the file"),
        libc::ENOENT => Some("path not found; verify the directory exists"),
        libc::EEXIST => Some("already exists"),
        libc::EISDIR => Some("target is a directory; only regular files can be replaced"),
        libc::ENOSPC => Some("insufficient space on device"),
        libc::EROFS => Some("read-only filesystem; cannot write here"),
        libc::ENAMETOOLONG => Some("filename or path too long; shorten path segments"),
        libc::EMFILE => Some("process file descriptor limit reached"),
        _ => None,
    }
}

// Common Win32 errors
#[cfg(windows)]
fn os_code_hint(e: &io::Error) -> Option<&'static str> {
    match e.raw_os_error()? {
        5 => Some("access denied; check permissions"),            // ERROR_ACCESS_DENIED
        17 => Some("not same device; atomic rename not possible"), // ERROR_NOT_SAME_DEVICE
        32 => Some("sharing violation; file is in use"),          // ERROR_SHARING_VIOLATION
        2 | 3 => Some("path not found; verify the directory exists"),
        80 | 183 => Some("already exists"),                       // ERROR_FILE_EXISTS / ALREADY_EXISTS
        112 => Some("insufficient disk space"),                   // ERROR_DISK_FULL
        19 => Some("write protected / read-only media"),          // ERROR_WRITE_PROTECT
        206 => Some("filename or path too long"),                 // ERROR_FILENAME_EXCED_RANGE
        _ => None,
    }
}

#[cfg(not(any(unix, windows)))]
fn os_code_hint(_e: &io::Error) -> Option<&'static str> {
    None
}

fn append_hint(msg: &mut String, e: &io::Error) {
    if let Some(hint) = hint_for(e) {
        msg.push_str(" (");
        msg.push_str(hint);
        msg.push(')');
    }
    if let Some(code) = e.raw_os_error() {
        msg.push_str(&format!(" [os code: {code}]"));
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    append_hint(&mut msg, e);
    msg
}

/// User-facing rendering of a subsystem failure, with a hint for its primary cause.
pub fn describe(e: &ReplaceError) -> String {
    let mut msg = e.to_string();
    if let Some(io) = e.io_error() {
        append_hint(&mut msg, io);
    }
    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

use std::io;
use std::path::Path;

/// Directory that holds `target`'s staging files; `.` for a bare file name.
pub(crate) fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Remove `path`, treating "already gone" as success.
#[cfg_attr(windows, allow(dead_code))]
pub(crate) fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parent_of_nested_path() {
        assert_eq!(parent_dir(Path::new("a/b/out.txt")), Path::new("a/b"));
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        remove_if_present(&dir.path().join("never-created")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn fsync_existing_dir() {
        let dir = tempdir().unwrap();
        fsync_dir(dir.path()).unwrap();
    }
}

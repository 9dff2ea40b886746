//! Windows implementations of platform helpers.
//!
//! Path-based rename cannot replace a destination that is open with some sharing modes,
//! so publishing works on the staging handle instead:
//! - staging files are opened with DELETE access and full sharing from creation;
//! - publish sends FileRenameInfoEx with replace-if-exists, POSIX semantics (readers of
//!   the old file keep their view) and ignore-readonly;
//! - a failed rename, or a discard, marks the handle delete-on-close via
//!   FileDispositionInfoEx (FileDispositionInfo on older systems), so the staging file
//!   disappears when the handle closes.
//!
//! With POSIX semantics there is no window in which the target name is missing.

use std::fs::{File, OpenOptions};
use std::io;
use std::mem::{self, offset_of};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::{AsRawHandle, IntoRawHandle};
use std::path::Path;
use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{
    FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_READONLY, FILE_INFO_BY_HANDLE_CLASS, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, SetFileInformationByHandle,
};

use super::PublishStrategy;
use crate::errors::ReplaceError;
use crate::replace::{DurabilityMode, PermissionSnapshot};

const GENERIC_READ: u32 = 0x8000_0000;
const GENERIC_WRITE: u32 = 0x4000_0000;
const DELETE: u32 = 0x0001_0000;

const FILE_DISPOSITION_INFO_CLASS: FILE_INFO_BY_HANDLE_CLASS = 4; // FileDispositionInfo
const FILE_DISPOSITION_INFO_EX_CLASS: FILE_INFO_BY_HANDLE_CLASS = 21; // FileDispositionInfoEx
const FILE_RENAME_INFO_EX_CLASS: FILE_INFO_BY_HANDLE_CLASS = 22; // FileRenameInfoEx

const FILE_RENAME_FLAG_REPLACE_IF_EXISTS: u32 = 0x0000_0001;
const FILE_RENAME_FLAG_POSIX_SEMANTICS: u32 = 0x0000_0002;
const FILE_RENAME_FLAG_IGNORE_READONLY_ATTRIBUTE: u32 = 0x0000_0040;

const FILE_DISPOSITION_FLAG_DELETE: u32 = 0x0000_0001;
const FILE_DISPOSITION_FLAG_POSIX_SEMANTICS: u32 = 0x0000_0002;
const FILE_DISPOSITION_FLAG_IGNORE_READONLY_ATTRIBUTE: u32 = 0x0000_0010;

/// FILE_RENAME_INFO with the `Flags` arm of its leading union; `file_name` is variable length.
#[repr(C)]
struct FileRenameInfoEx {
    flags: u32,
    root_directory: HANDLE,
    file_name_length: u32,
    file_name: [u16; 1],
}

#[repr(C)]
struct FileDispositionInfo {
    delete_file: u8, // BOOLEAN
}

#[repr(C)]
struct FileDispositionInfoEx {
    flags: u32,
}

/// Handle-based rename-with-disposition publisher.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandleRenamePublisher;

impl PublishStrategy for HandleRenamePublisher {
    fn create_exclusive(&self, path: &Path, perms: &PermissionSnapshot) -> io::Result<File> {
        let readonly = perms.permissions().is_some_and(|p| p.readonly());
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .access_mode(GENERIC_READ | GENERIC_WRITE | DELETE)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
            .attributes(if readonly {
                FILE_ATTRIBUTE_READONLY
            } else {
                FILE_ATTRIBUTE_NORMAL
            })
            .open(path)
    }

    fn publish(
        &self,
        file: File,
        staging: &Path,
        target: &Path,
        _durability: DurabilityMode,
    ) -> Result<(), ReplaceError> {
        let renamed = std::path::absolute(target).and_then(|abs| rename_by_handle(&file, &abs));
        match renamed {
            Ok(()) => close_file(file).map_err(|source| ReplaceError::Close {
                path: target.to_path_buf(),
                source,
            }),
            Err(source) => {
                let err = ReplaceError::Publish {
                    from: staging.to_path_buf(),
                    to: target.to_path_buf(),
                    source,
                };
                Err(ReplaceError::join(err, release_for_deletion(file, staging)))
            }
        }
    }

    fn discard(&self, file: File, path: &Path) -> Result<(), ReplaceError> {
        match ReplaceError::join_all(release_for_deletion(file, path)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Mark delete-on-close, then close; both outcomes are reported.
fn release_for_deletion(file: File, path: &Path) -> [Option<ReplaceError>; 2] {
    let disposition = mark_for_deletion(&file)
        .err()
        .map(|source| ReplaceError::Cleanup {
            path: path.to_path_buf(),
            source,
        });
    let close = close_file(file).err().map(|source| ReplaceError::Close {
        path: path.to_path_buf(),
        source,
    });
    [disposition, close]
}

fn rename_by_handle(file: &File, target: &Path) -> io::Result<()> {
    let name: Vec<u16> = target.as_os_str().encode_wide().collect();
    let name_bytes = name.len() * mem::size_of::<u16>();
    // Header, name, trailing NUL.
    let total = offset_of!(FileRenameInfoEx, file_name) + name_bytes + mem::size_of::<u16>();
    let total_u32 = u32::try_from(total)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "target path too long"))?;
    let name_len_u32 = u32::try_from(name_bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "target path too long"))?;

    // u64 backing storage keeps the HANDLE field aligned.
    let mut buf = vec![0u64; total.div_ceil(mem::size_of::<u64>())];
    let info = buf.as_mut_ptr().cast::<FileRenameInfoEx>();

    // SAFETY: `buf` is zeroed, suitably aligned and at least `total` bytes long, which
    // covers the header plus `name.len() + 1` UTF-16 units starting at `file_name`.
    let ok = unsafe {
        ptr::addr_of_mut!((*info).flags).write(
            FILE_RENAME_FLAG_REPLACE_IF_EXISTS
                | FILE_RENAME_FLAG_POSIX_SEMANTICS
                | FILE_RENAME_FLAG_IGNORE_READONLY_ATTRIBUTE,
        );
        ptr::addr_of_mut!((*info).root_directory).write(ptr::null_mut());
        ptr::addr_of_mut!((*info).file_name_length).write(name_len_u32);
        let dst = ptr::addr_of_mut!((*info).file_name).cast::<u16>();
        ptr::copy_nonoverlapping(name.as_ptr(), dst, name.len());

        SetFileInformationByHandle(
            file.as_raw_handle() as HANDLE,
            FILE_RENAME_INFO_EX_CLASS,
            info.cast(),
            total_u32,
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn mark_for_deletion(file: &File) -> io::Result<()> {
    let ex = FileDispositionInfoEx {
        flags: FILE_DISPOSITION_FLAG_DELETE
            | FILE_DISPOSITION_FLAG_POSIX_SEMANTICS
            | FILE_DISPOSITION_FLAG_IGNORE_READONLY_ATTRIBUTE,
    };
    if set_info(file, FILE_DISPOSITION_INFO_EX_CLASS, &ex).is_ok() {
        return Ok(());
    }
    // Older systems and some filesystems only know the plain request.
    set_info(file, FILE_DISPOSITION_INFO_CLASS, &FileDispositionInfo { delete_file: 1 })
}

fn set_info<T>(file: &File, class: FILE_INFO_BY_HANDLE_CLASS, info: &T) -> io::Result<()> {
    // SAFETY: `info` is a live repr(C) value of exactly the size passed.
    let ok = unsafe {
        SetFileInformationByHandle(
            file.as_raw_handle() as HANDLE,
            class,
            ptr::from_ref(info).cast(),
            mem::size_of::<T>() as u32,
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read-only state is applied through the creation attributes; nothing to do afterwards.
pub fn apply_permissions(_file: &File, _perms: &PermissionSnapshot) -> io::Result<()> {
    Ok(())
}

/// CloseHandle and surface its error instead of dropping it silently.
pub fn close_file(file: File) -> io::Result<()> {
    let handle = file.into_raw_handle();
    // SAFETY: the handle was just released from an owning File and is closed exactly once.
    let ok = unsafe { CloseHandle(handle as HANDLE) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

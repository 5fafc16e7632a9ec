//! Thin, unsafe wrappers over the handful of syscalls the core needs:
//! `open`/`openat`, `fstat`/`fstatat`, `mmap`, `munmap`, and `madvise`.
//!
//! This module does no bookkeeping of its own — it is the raw layer a
//! higher-level crate builds a safe map handle on top of, the same role
//! `lmdb-sys` plays for `lmdb`. Every function here is a direct, bounds-free
//! wrapper; callers are responsible for closing file descriptors and
//! unmapping regions exactly once.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::ptr;

/// Identity of a file on disk, used to detect replacement: a new file at the
/// same path will differ in at least one of these fields from the file a
/// reader currently has mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
    pub mtime_sec: i64,
    pub mtime_nsec: i64,
}

/// Opens `path` as a directory file descriptor, suitable for use as the
/// `dir_fd` passed to [`openat_read`] and [`fstatat_identity`].
pub fn open_dir(path: &Path) -> io::Result<RawFd> {
    let c_path = path_to_cstring(path)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Opens `name` relative to `dir_fd` for reading.
pub fn openat_read(dir_fd: RawFd, name: &CString) -> io::Result<RawFd> {
    let fd = unsafe { libc::openat(dir_fd, name.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Closes a raw file descriptor. Safe to call on any fd this module handed
/// out; undefined behavior if called twice on the same value or on an fd
/// owned elsewhere.
pub fn close(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Reads device/inode/mtime identity from an already-open file descriptor.
pub fn fstat_identity(fd: RawFd) -> io::Result<(FileIdentity, u64)> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::fstat(fd, &mut st) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((identity_from_stat(&st), st.st_size as u64))
}

/// Reads device/inode/mtime identity for `name` relative to `dir_fd`, without
/// opening the file. This is the only operation `refresh_check` needs to
/// perform on the hot path.
pub fn fstatat_identity(dir_fd: RawFd, name: &CString) -> io::Result<(FileIdentity, u64)> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::fstatat(dir_fd, name.as_ptr(), &mut st, 0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((identity_from_stat(&st), st.st_size as u64))
}

fn identity_from_stat(st: &libc::stat) -> FileIdentity {
    FileIdentity {
        dev: st.st_dev as u64,
        ino: st.st_ino as u64,
        mtime_sec: st.st_mtime as i64,
        mtime_nsec: st.st_mtime_nsec as i64,
    }
}

/// Maps `len` bytes of `fd` read-only and shared. The file descriptor may be
/// closed immediately after this call succeeds; the mapping stays valid.
pub fn mmap_readonly(fd: RawFd, len: usize) -> io::Result<*mut u8> {
    if len == 0 {
        // mmap of a zero-length region is implementation defined (and
        // usually EINVAL); callers map the header unconditionally so a
        // correctly-built database is never zero bytes, but an empty/corrupt
        // file needs a clean error rather than an OS-specific surprise.
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as *mut u8)
}

/// Unmaps a region previously returned by [`mmap_readonly`].
///
/// # Safety
///
/// `ptr`/`len` must be the exact values returned by a successful
/// `mmap_readonly` call, and must not have been unmapped already.
pub unsafe fn munmap(ptr: *mut u8, len: usize) {
    libc::munmap(ptr as *mut libc::c_void, len);
}

/// Advises the kernel about expected access pattern over a mapped region.
/// Best-effort: failures are not surfaced, matching `madvise`'s advisory
/// nature.
pub fn madvise_sequential(ptr: *mut u8, len: usize) {
    unsafe {
        libc::madvise(ptr as *mut libc::c_void, len, libc::MADV_SEQUENTIAL);
    }
}

fn path_to_cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))
}

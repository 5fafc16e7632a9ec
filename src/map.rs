//! The map handle: the caller-owned root of one database's version chain.
//!
//! A [`Handle`] owns the directory file descriptor used for `stat`-by-name
//! and anchors the singly-linked chain of [`MapNode`]s. It does not itself
//! hand out references to readers — that is [`crate::registration`]'s job —
//! but it is the thing [`crate::registration::Registration::new`] walks from
//! and the thing `refresh_check`/`reopen` operate against.

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::atomic::{AtomicPtr, Ordering};

use mcdb_sys::FileIdentity;

use crate::error::{Error, Result};
use crate::node::MapNode;

/// A caller-owned database handle: the directory fd plus the root of the
/// map-version chain.
///
/// `Handle` is `Send + Sync`; the chain it anchors is designed for many
/// concurrent readers. Dropping a `Handle` frees every node still
/// reachable from its root — callers must ensure no [`crate::registration::Registration`]
/// outlives the `Handle` it was created from.
pub struct Handle {
    root: AtomicPtr<MapNode>,
    dir_fd: RawFd,
}

unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    /// Opens `basename` within `dir` and memory-maps it.
    ///
    /// The directory is opened and kept for the handle's lifetime so
    /// [`Handle::refresh_check`] can `fstatat` by name without re-resolving
    /// a path. The file descriptor for the mapped file itself is closed as
    /// soon as `mmap` succeeds — the mapping stays valid after the fd closes.
    pub fn open(dir: &Path, basename: &str) -> Result<Handle> {
        let dir_fd = mcdb_sys::open_dir(dir).map_err(Error::OpenFailed)?;
        let cbasename =
            CString::new(basename).map_err(|_| Error::Corrupt("basename contains a NUL byte"))?;
        let node = match Self::map_named(dir_fd, cbasename) {
            Ok(node) => node,
            Err(e) => {
                mcdb_sys::close(dir_fd);
                return Err(e);
            }
        };
        Ok(Handle {
            root: AtomicPtr::new(Box::into_raw(Box::new(node))),
            dir_fd,
        })
    }

    /// Builds a handle directly over an in-memory byte buffer rather than a
    /// real file. Used by tests that build a database straight into a
    /// `Vec<u8>` and want to exercise the reader without touching the
    /// filesystem. Such a handle never participates in refresh (there is no
    /// backing directory to `stat`).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Handle> {
        let identity = FileIdentity {
            dev: 0,
            ino: 0,
            mtime_sec: 0,
            mtime_nsec: 0,
        };
        let node = MapNode::new_heap(bytes, identity);
        Ok(Handle {
            root: AtomicPtr::new(Box::into_raw(Box::new(node))),
            dir_fd: -1,
        })
    }

    /// Maps an already-open file descriptor — separates
    /// the filesystem-open step from the mmap step so test fixtures can
    /// pre-open a file (e.g. to hold a descriptor across an external
    /// `rename`) before handing it to the reader.
    pub fn init(dir_fd: RawFd, fd: RawFd, basename: CString) -> Result<MapNode> {
        let (identity, size) = mcdb_sys::fstat_identity(fd).map_err(Error::OpenFailed)?;
        let base = mcdb_sys::mmap_readonly(fd, size as usize).map_err(Error::MmapFailed)?;
        Ok(MapNode::new_mmap(base, size as usize, identity, dir_fd, basename))
    }

    fn map_named(dir_fd: RawFd, basename: CString) -> Result<MapNode> {
        let fd = mcdb_sys::openat_read(dir_fd, &basename).map_err(Error::OpenFailed)?;
        let result = Self::init(dir_fd, fd, basename);
        mcdb_sys::close(fd);
        result
    }

    /// Raw root pointer, the starting point [`crate::registration::register_into`]
    /// walks from to find the newest node.
    pub(crate) fn root_ptr(&self) -> *mut MapNode {
        self.root.load(Ordering::Acquire)
    }

    /// Walks the chain to the newest node without taking a reference on it.
    /// Convenient for tests and single-threaded callers that don't need the
    /// full registration protocol; long-lived concurrent readers should go
    /// through [`crate::registration::Registration`] instead so the node
    /// cannot be freed out from under them by a concurrent refresh.
    pub fn current_node(&self) -> &MapNode {
        unsafe { &*newest(self.root_ptr()) }
    }

    /// Stats the backing file by basename and reports whether its identity
    /// (device, inode, mtime) differs from the newest node's recorded
    /// identity. The only operation on the read
    /// hot path that touches the filesystem, and only if the caller opts in
    /// by calling this between lookups.
    ///
    /// A handle with no backing directory (`Handle::from_bytes`) never
    /// reports staleness.
    pub fn refresh_check(&self) -> bool {
        let node = self.current_node();
        if node.dir_fd < 0 {
            return false;
        }
        match mcdb_sys::fstatat_identity(node.dir_fd, &node.basename) {
            Ok((identity, _size)) => {
                let changed = identity != node.identity;
                if changed {
                    log::debug!(
                        "mcdb: refresh_check observed a changed identity for {:?}",
                        node.basename
                    );
                }
                changed
            }
            Err(e) => {
                // Transient stat failures are treated as "no change": a file
                // temporarily missing mid-rename should not cause churn.
                // Strict staleness detection is the caller's job if it
                // needs one.
                log::warn!("mcdb: refresh_check stat failed, retaining current map: {e}");
                false
            }
        }
    }

    /// Must be preceded by a positive [`Handle::refresh_check`]. Opens the
    /// new file into a fresh node and splices it onto the chain as the
    /// successor of the newest node.
    ///
    /// Returns `Ok(true)` if this call published the new version,
    /// `Ok(false)` if another reader's concurrent `reopen` won the race (this
    /// call's speculative node is freed) or if opening/mapping the new file
    /// failed (the current head is left untouched).
    pub fn reopen(&self) -> Result<bool> {
        let current = newest(self.root_ptr());
        let current_ref = unsafe { &*current };

        let new_node = match Self::map_named(current_ref.dir_fd, current_ref.basename.clone()) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("mcdb: reopen failed to map replacement file, keeping old map: {e}");
                return Ok(false);
            }
        };
        let new_ptr = Box::into_raw(Box::new(new_node));

        match current_ref.next.compare_exchange(
            std::ptr::null_mut(),
            new_ptr,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                log::debug!("mcdb: reopen published a new map version");
                // If nobody was registered on the node we just superseded,
                // nobody will ever call unregister on it again — retire it
                // here so a refresh with zero concurrent readers doesn't
                // leak.
                crate::registration::try_retire(current);
                Ok(true)
            }
            Err(_) => {
                log::trace!("mcdb: reopen lost the publish race, retiring speculative node");
                unsafe {
                    drop(Box::from_raw(new_ptr));
                }
                Ok(false)
            }
        }
    }

    /// Unmaps, closes the directory fd, and frees every node in the chain
    /// Equivalent to dropping the handle; provided as a named
    /// alternative for callers that want an explicit call site.
    ///
    /// Callers must ensure no [`crate::registration::Registration`] is still
    /// outstanding against this handle's chain.
    pub fn destroy(self) {
        drop(self)
    }
}

/// How the kernel should be advised to prefetch a newly mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advise {
    /// Issue no `madvise` call; let the kernel's default policy apply.
    None,
    /// `MADV_SEQUENTIAL` — appropriate for a reader about to walk the
    /// record region with [`crate::iter::RecordIterator`] rather than do
    /// scattered point lookups.
    Sequential,
}

/// Tunable knobs for opening a database: the read-ahead window and the
/// `madvise` hint applied once the file is mapped.
///
/// `readahead` is validated against [`crate::format::HEADER_SZ`] but is
/// otherwise advisory bookkeeping: this implementation maps the whole file
/// in one `mmap` call regardless, so there is no separate read-ahead window
/// to size. The field exists so callers porting tuning from another mcdb
/// implementation have somewhere to put the number, and so a nonsensical
/// value (smaller than the header) is rejected rather than silently ignored.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    readahead: usize,
    advise: Advise,
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions {
            readahead: crate::format::MIN_READAHEAD,
            advise: Advise::None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    /// Sets the recommended read-ahead window. Must exceed
    /// [`crate::format::HEADER_SZ`] so a single fault can bring in the whole
    /// directory.
    pub fn readahead(mut self, bytes: usize) -> Result<OpenOptions> {
        if (bytes as u64) <= crate::format::HEADER_SZ {
            return Err(Error::Corrupt(
                "readahead window must exceed the directory size",
            ));
        }
        self.readahead = bytes;
        Ok(self)
    }

    /// Current configured read-ahead window.
    pub fn readahead_window(&self) -> usize {
        self.readahead
    }

    /// Advise the kernel to expect sequential access after mapping.
    pub fn advise_sequential(mut self) -> OpenOptions {
        self.advise = Advise::Sequential;
        self
    }

    /// Advise the kernel to expect random access after mapping (the
    /// default: most lookups are single-point probes, not sequential
    /// walks).
    pub fn advise_random(mut self) -> OpenOptions {
        self.advise = Advise::None;
        self
    }

    /// Opens `basename` within `dir` with these options applied.
    pub fn open(self, dir: &Path, basename: &str) -> Result<Handle> {
        let handle = Handle::open(dir, basename)?;
        if self.advise == Advise::Sequential {
            let node = handle.current_node();
            mcdb_sys::madvise_sequential(node.base_ptr() as *mut u8, node.len());
        }
        Ok(handle)
    }
}

/// Walks `next` pointers from `start` to the node whose `next` is null.
pub(crate) fn newest(start: *mut MapNode) -> *mut MapNode {
    let mut cur = start;
    loop {
        let next = unsafe { (*cur).next.load(Ordering::Acquire) };
        if next.is_null() {
            return cur;
        }
        cur = next;
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let mut cur = self.root.load(Ordering::Acquire);
        while !cur.is_null() {
            let next = unsafe { (*cur).next.load(Ordering::Acquire) };
            unsafe {
                drop(Box::from_raw(cur));
            }
            cur = next;
        }
        if self.dir_fd >= 0 {
            mcdb_sys::close(self.dir_fd);
        }
    }
}

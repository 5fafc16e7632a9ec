use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use mcdb_sys::FileIdentity;

use crate::error::{Error, Result};
use crate::format;

/// How a node's bytes are owned, and therefore how they must be released.
enum Backing {
    /// A real `mmap(2)` region; released with `munmap`.
    Mmap,
    /// A heap buffer standing in for a mapped file — used by in-memory
    /// handles (`Handle::from_bytes`) and unit tests that want to exercise
    /// bounds-checked reads without touching the filesystem.
    Heap,
}

/// One live version of a mapped database file.
///
/// A node is created on open or on refresh, and destroyed only once its
/// reference count reaches zero *and* it has a successor — the head of the
/// chain is never destroyed. Nodes form a forward-only, singly-linked chain
/// through `next`; the chain is acyclic by construction since a node's
/// `next` always points strictly forward in time.
///
/// All offset arithmetic into the mapped region goes through the
/// bounds-checked accessors below — `Error::Corrupt` is the only observable
/// consequence of an overflowed index.
pub struct MapNode {
    base: *mut u8,
    len: usize,
    backing: Backing,
    pub(crate) identity: FileIdentity,
    /// Directory fd this node's file was opened relative to. Not owned by
    /// the node — it is a copy of the fd the owning [`crate::map::Handle`]
    /// holds for its whole lifetime, kept here so a reader holding only a
    /// node reference can still perform `refresh_check`/`reopen`. Only
    /// `Handle::drop` closes it. `-1` for in-memory handles that have no
    /// backing directory.
    pub(crate) dir_fd: RawFd,
    pub(crate) basename: CString,
    pub(crate) refcnt: AtomicUsize,
    pub(crate) next: AtomicPtr<MapNode>,
    /// Latch guarding the free-iff-zero-and-superseded transition: a late
    /// unregister and a refresh can both observe "refcount zero and
    /// superseded" for the same node, and only one of them may call
    /// `Box::from_raw`. A single atomic swap resolves that race without a
    /// real mutex, since the only thing being protected is which caller
    /// wins.
    pub(crate) retired: AtomicBool,
}

// The node owns a read-only mmap region (or an equivalent heap buffer);
// reading through it from multiple threads is exactly what MAP_SHARED |
// PROT_READ supports.
unsafe impl Send for MapNode {}
unsafe impl Sync for MapNode {}

impl MapNode {
    /// Constructs a node over an already-established mapping. `base`/`len`
    /// must be the exact values returned by a successful `mmap_readonly`
    /// call.
    pub(crate) fn new_mmap(
        base: *mut u8,
        len: usize,
        identity: FileIdentity,
        dir_fd: RawFd,
        basename: CString,
    ) -> MapNode {
        MapNode {
            base,
            len,
            backing: Backing::Mmap,
            identity,
            dir_fd,
            basename,
            refcnt: AtomicUsize::new(0),
            next: AtomicPtr::new(std::ptr::null_mut()),
            retired: AtomicBool::new(false),
        }
    }

    /// Constructs a node over an owned byte buffer rather than a real
    /// mapping. Used for in-memory handles and tests; never touches the
    /// filesystem and never calls `munmap`.
    pub(crate) fn new_heap(bytes: Vec<u8>, identity: FileIdentity) -> MapNode {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let base = Box::into_raw(boxed) as *mut u8;
        MapNode {
            base,
            len,
            backing: Backing::Heap,
            identity,
            dir_fd: -1,
            basename: CString::new("").unwrap(),
            refcnt: AtomicUsize::new(0),
            next: AtomicPtr::new(std::ptr::null_mut()),
            retired: AtomicBool::new(false),
        }
    }

    /// Length in bytes of the mapped region.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrows the mapped region as a byte slice.
    ///
    /// Safe because the region is `PROT_READ`-only, `MAP_SHARED` (or an
    /// exclusively-owned heap buffer), and this node is never released
    /// while any registration holds a reference.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.base, self.len) }
    }

    /// Bounds-checked sub-slice `[offset, offset+len)`.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let offset = usize::try_from(offset).map_err(|_| Error::Corrupt("offset exceeds usize"))?;
        let len = usize::try_from(len).map_err(|_| Error::Corrupt("length exceeds usize"))?;
        let end = offset
            .checked_add(len)
            .ok_or(Error::Corrupt("offset+length overflow"))?;
        self.as_slice()
            .get(offset..end)
            .ok_or(Error::Corrupt("read past end of mapped region"))
    }

    /// Bounds-checked big-endian `u32` read.
    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        let offset = usize::try_from(offset).map_err(|_| Error::Corrupt("offset exceeds usize"))?;
        format::read_u32(self.as_slice(), offset)
    }

    /// Bounds-checked big-endian `u64` read.
    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        let offset = usize::try_from(offset).map_err(|_| Error::Corrupt("offset exceeds usize"))?;
        format::read_u64(self.as_slice(), offset)
    }

    /// Copies `len` bytes starting at `offset` into `out`, bounds-checked
    /// against the mapped region. Used when a caller wants an owned copy
    /// (e.g. crossing page boundaries) rather than the zero-copy `slice`.
    pub fn read_into(&self, offset: u64, len: u64, out: &mut Vec<u8>) -> Result<()> {
        let src = self.slice(offset, len)?;
        out.clear();
        out.extend_from_slice(src);
        Ok(())
    }

    /// Raw mmap base pointer. Exposed for the rare caller that wants
    /// zero-copy `(base + dpos, dlen)` access directly; prefer `slice`.
    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        self.base
    }
}

impl Drop for MapNode {
    fn drop(&mut self) {
        match self.backing {
            Backing::Mmap => {
                if self.len > 0 {
                    unsafe {
                        mcdb_sys::munmap(self.base, self.len);
                    }
                }
            }
            Backing::Heap => {
                if self.len > 0 {
                    unsafe {
                        drop(Box::from_raw(std::slice::from_raw_parts_mut(
                            self.base, self.len,
                        )));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(bytes: &[u8]) -> MapNode {
        MapNode::new_heap(
            bytes.to_vec(),
            FileIdentity {
                dev: 0,
                ino: 0,
                mtime_sec: 0,
                mtime_nsec: 0,
            },
        )
    }

    #[test]
    fn slice_bounds_checked() {
        let node = test_node(&[1, 2, 3, 4]);
        assert_eq!(node.slice(0, 4).unwrap(), &[1, 2, 3, 4]);
        assert!(node.slice(2, 4).is_err());
        assert!(node.slice(0, 5).is_err());
    }

    #[test]
    fn read_u32_be() {
        let node = test_node(&[0x00, 0x00, 0x00, 0x2a]);
        assert_eq!(node.read_u32(0).unwrap(), 42);
    }

    #[test]
    fn empty_node_has_empty_slice() {
        let node = test_node(&[]);
        assert!(node.is_empty());
        assert_eq!(node.slice(0, 0).unwrap(), &[] as &[u8]);
    }
}

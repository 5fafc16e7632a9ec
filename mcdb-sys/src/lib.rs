//! Raw OS primitives and fixed on-disk format constants backing the `mcdb`
//! crate. This crate has no policy of its own: it does not allocate nodes,
//! track reference counts, or know about the hash table layout beyond the
//! numeric constants the format is built from. It is the same kind of thin,
//! unsafe foundation layer `lmdb-sys` is to `lmdb`.

extern crate libc;

pub mod format;
mod raw;

pub use raw::{
    close, fstat_identity, fstatat_identity, madvise_sequential, mmap_readonly, open_dir,
    openat_read, munmap, FileIdentity,
};

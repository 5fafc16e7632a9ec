//! Fixed on-disk layout constants for the mcdb file format.
//!
//! These numbers are part of the wire format, not an implementation choice:
//! changing any of them changes what bytes a conforming reader expects to
//! find at a given offset.

/// Number of bits used to select a directory slot from a key's hash.
pub const SLOT_BITS: u32 = 8;

/// Number of directory slots (`1 << SLOT_BITS`).
pub const SLOTS: usize = 1 << SLOT_BITS;

/// Size in bytes of one directory entry: an 8-byte offset and an 8-byte count.
pub const DIR_ENTRY_SZ: u64 = 16;

/// Total size in bytes of the directory region at the start of the file.
pub const HEADER_SZ: u64 = SLOTS as u64 * DIR_ENTRY_SZ;

/// Size in bytes of one hash table entry: a 4-byte hash and an 8-byte position.
pub const TABLE_ENTRY_SZ: u64 = 12;

/// Size in bytes of a record header: `klen` (4 bytes) followed by `vlen` (4 bytes).
pub const RECORD_HEADER_SZ: u64 = 8;

/// Recommended minimum mmap read-ahead window. Must exceed [`HEADER_SZ`] so a
/// single fault brings in the whole directory.
pub const MIN_READAHEAD: usize = 512 * 1024;

/// Largest permitted key or value length (`INT_MAX - 8`, leaving room for the
/// record header to stay addressable as a signed 32-bit quantity downstream).
pub const MAX_ITEM_LEN: u64 = i32::MAX as u64 - 8;

/// Approximate ceiling on the number of keys a single database may hold.
pub const MAX_KEYS: u64 = 2_000_000_000;

const _: () = assert!(HEADER_SZ == 4096);

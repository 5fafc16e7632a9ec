//! Byte-order and hash primitives that are part of the on-disk format.
//!
//! All multi-byte integers in an mcdb file are big-endian: on little-endian
//! hardware the byte swap cost is negligible relative to memory-load
//! latency, and a fixed byte order is what lets files round-trip across
//! platforms. This module is the one place that decision is encoded.

use byteorder::{BigEndian, ByteOrder};

pub use mcdb_sys::format::{
    DIR_ENTRY_SZ, HEADER_SZ, MAX_ITEM_LEN, MAX_KEYS, MIN_READAHEAD, RECORD_HEADER_SZ, SLOTS,
    SLOT_BITS, TABLE_ENTRY_SZ,
};

use crate::error::{Error, Result};

/// Reads a big-endian `u32` out of `buf` at `offset`, bounds-checked.
#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let end = offset
        .checked_add(4)
        .ok_or(Error::Corrupt("offset overflow reading u32"))?;
    buf.get(offset..end)
        .map(BigEndian::read_u32)
        .ok_or(Error::Corrupt("read past end of mapped region (u32)"))
}

/// Reads a big-endian `u64` out of `buf` at `offset`, bounds-checked.
#[inline]
pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64> {
    let end = offset
        .checked_add(8)
        .ok_or(Error::Corrupt("offset overflow reading u64"))?;
    buf.get(offset..end)
        .map(BigEndian::read_u64)
        .ok_or(Error::Corrupt("read past end of mapped region (u64)"))
}

/// Writes a big-endian `u32` into `buf` at `offset`. Used by the builder.
#[inline]
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    BigEndian::write_u32(&mut buf[offset..offset + 4], value);
}

/// Writes a big-endian `u64` into `buf` at `offset`. Used by the builder.
#[inline]
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    BigEndian::write_u64(&mut buf[offset..offset + 8], value);
}

/// The djb2 hash used for both slot selection and intra-slot probing.
///
/// `h0 = 5381`; for each key byte `b`: `h = ((h << 5) + h) ^ b`, wrapping in
/// 32 bits. Not collision-resistant by design — it only needs to be fast and
/// deterministic across implementations.
pub fn hash(key: &[u8]) -> u32 {
    let mut h: u32 = 5381;
    for &b in key {
        h = (h << 5).wrapping_add(h) ^ b as u32;
    }
    h
}

/// Directory slot index for a hash: `h mod SLOTS`.
#[inline]
pub fn slot_index(h: u32) -> usize {
    (h as usize) % SLOTS
}

/// Intra-slot probe start for a hash, given the target table's length in
/// entries: `(h >> 8) mod tablelen`.
#[inline]
pub fn probe_start(h: u32, table_len: u64) -> u64 {
    debug_assert!(table_len > 0);
    (h >> SLOT_BITS) as u64 % table_len
}

//! A minimal, conforming writer for the mcdb format.
//!
//! This is *not* a full "maker" tool (no CLI, no dataset-specific encoding,
//! no external sort/collision checker) — it is just enough to satisfy the
//! format's builder obligations: directory at offset 0, tables sized for
//! load ≤ ½, empty entries encoded as `pos == 0`, and atomic publish via
//! `rename`. It exists so the reader side of this crate can be tested
//! against real files rather than depending on an external writer.
//!
//! Shape: the classic two-pass `cdbmake` algorithm. Pass one streams
//! records straight to the output, remembering each record's `(hash, pos)`
//! in memory per directory slot. Pass two, run from `finalize`, emits
//! padding up to an 8-byte boundary and then the 256 hash tables.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use crate::format::{self, hash, slot_index, HEADER_SZ, MAX_ITEM_LEN, SLOTS};

struct PendingEntry {
    hash: u32,
    pos: u64,
}

/// Whether a key or value of `len` bytes exceeds the format's per-item size
/// limit. Split out of [`Builder::put`] so the boundary can be tested
/// directly, without allocating a buffer anywhere near `MAX_ITEM_LEN` bytes.
fn exceeds_item_limit(len: usize) -> bool {
    len as u64 > MAX_ITEM_LEN
}

/// Streaming builder for an mcdb file.
///
/// `W` is any `Write + Seek`, so tests can build into an in-memory
/// `std::io::Cursor<Vec<u8>>` as readily as a real file.
pub struct Builder<W: Write + Seek> {
    writer: W,
    pos: u64,
    slots: Vec<Vec<PendingEntry>>,
    count: u64,
}

impl<W: Write + Seek> Builder<W> {
    /// Starts a new database, reserving space for the directory (it is
    /// rewritten with real values by [`Builder::finalize`]).
    pub fn new(mut writer: W) -> io::Result<Builder<W>> {
        writer.write_all(&[0u8; HEADER_SZ as usize])?;
        Ok(Builder {
            writer,
            pos: HEADER_SZ,
            slots: (0..SLOTS).map(|_| Vec::new()).collect(),
            count: 0,
        })
    }

    /// Appends one record. Duplicate keys are permitted and are returned by
    /// the reader in the order they were `put` here.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()> {
        if exceeds_item_limit(key.len()) || exceeds_item_limit(value.len()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "key or value exceeds the format's size limit",
            ));
        }
        if self.count >= format::MAX_KEYS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "database key count limit exceeded",
            ));
        }

        let mut header = [0u8; 8];
        format::write_u32(&mut header, 0, key.len() as u32);
        format::write_u32(&mut header, 4, value.len() as u32);
        self.writer.write_all(&header)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        let h = hash(key);
        self.slots[slot_index(h)].push(PendingEntry { hash: h, pos: self.pos });

        self.pos += 8 + key.len() as u64 + value.len() as u64;
        self.count += 1;
        Ok(())
    }

    /// Writes padding, the 256 hash tables, and finally rewinds to fill in
    /// the real directory. Consumes the builder since no further `put` is
    /// meaningful afterward.
    pub fn finalize(mut self) -> io::Result<W> {
        // Pad the record region so every hash table starts 8-byte aligned.
        let padding = (8 - (self.pos % 8)) % 8;
        if padding > 0 {
            self.writer.write_all(&vec![0u8; padding as usize])?;
            self.pos += padding;
        }

        let mut directory = vec![(0u64, 0u64); SLOTS];
        for (s, entries) in self.slots.iter().enumerate() {
            let count = entries.len() as u64;
            // Load factor <= 1/2: the table holds 2*count slots.
            let table_len = if count == 0 { 0 } else { count * 2 };
            directory[s] = (self.pos, count);

            if table_len == 0 {
                continue;
            }

            let mut table = vec![(0u32, 0u64); table_len as usize];
            for entry in entries {
                let mut idx = (entry.hash >> format::SLOT_BITS) as u64 % table_len;
                while table[idx as usize].1 != 0 {
                    idx = (idx + 1) % table_len;
                }
                table[idx as usize] = (entry.hash, entry.pos);
            }

            let mut buf = vec![0u8; table.len() * 12];
            for (i, (h, p)) in table.iter().enumerate() {
                format::write_u32(&mut buf, i * 12, *h);
                format::write_u64(&mut buf, i * 12 + 4, *p);
            }
            self.writer.write_all(&buf)?;
            self.pos += buf.len() as u64;
        }

        let mut dir_buf = vec![0u8; HEADER_SZ as usize];
        for (s, (offset, count)) in directory.iter().enumerate() {
            format::write_u64(&mut dir_buf, s * 16, *offset);
            format::write_u64(&mut dir_buf, s * 16 + 8, *count);
        }
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&dir_buf)?;
        self.writer.flush()?;

        Ok(self.writer)
    }
}

/// Builds a database from `pairs` directly into `dir/basename`, publishing
/// it with a `rename` over any existing file at that path. This is the
/// entry point [`crate::map::Handle::refresh_check`]'s companion test
/// fixtures use to simulate a builder replacing a live file.
pub fn build_to_dir(dir: &Path, basename: &str, pairs: &[(&[u8], &[u8])]) -> io::Result<()> {
    let tmp_path = dir.join(format!("{basename}.tmp"));
    {
        let file = File::create(&tmp_path)?;
        let mut builder = Builder::new(file)?;
        for (k, v) in pairs {
            builder.put(k, v)?;
        }
        let mut file = builder.finalize()?;
        file.flush()?;
    }
    fs::rename(&tmp_path, dir.join(basename))?;
    Ok(())
}

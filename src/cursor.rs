use crate::directory::read_slot;
use crate::error::{Error, Result};
use crate::format::{hash, probe_start, slot_index, TABLE_ENTRY_SZ};
use crate::node::MapNode;

/// Transient per-lookup state implementing the `find-first`/`find-next`
/// probe protocol.
///
/// A cursor is bound to exactly one [`MapNode`] for its whole lifetime — it
/// never observes a different map version, even if the node it is bound to
/// is superseded mid-search. A `find_next` that has begun on a cursor keeps
/// observing the cursor's bound map until the cursor is discarded; refresh
/// never rewrites cursor state. Cheap enough to stack-allocate per search.
pub struct Cursor<'n> {
    node: &'n MapNode,
    table_offset: u64,
    hslots: u64,
    hpos: u64,
    loop_count: u64,
    khash: u32,
    dpos: u64,
    dlen: u32,
    started: bool,
    exhausted: bool,
}

impl<'n> Cursor<'n> {
    /// Creates a cursor bound to `node`. No lookup has been started yet.
    pub fn new(node: &'n MapNode) -> Cursor<'n> {
        Cursor {
            node,
            table_offset: 0,
            hslots: 0,
            hpos: 0,
            loop_count: 0,
            khash: 0,
            dpos: 0,
            dlen: 0,
            started: false,
            exhausted: true,
        }
    }

    /// Initializes the cursor from the map's directory for a new `key`.
    /// Does not itself consult any hash table entry — call
    /// [`Cursor::find_next`] to advance the probe.
    pub fn find_start(&mut self, key: &[u8]) -> Result<()> {
        let h = hash(key);
        let slot = read_slot(self.node, slot_index(h))?;
        self.started = true;
        self.khash = h;
        if slot.count == 0 {
            self.exhausted = true;
            return Ok(());
        }
        self.table_offset = slot.offset;
        self.hslots = slot.count;
        self.hpos = slot.offset + probe_start(h, slot.count) * TABLE_ENTRY_SZ;
        self.loop_count = 0;
        self.exhausted = false;
        Ok(())
    }

    /// Advances the probe, looking for the next entry matching `key`.
    /// Returns `Ok(true)` with the cursor positioned on a
    /// match (retrievable via [`Cursor::value`]/[`Cursor::dlen`]), or
    /// `Ok(false)` once the probe sequence is exhausted. Callers enumerate
    /// duplicates by calling this repeatedly until it returns `Ok(false)`.
    pub fn find_next(&mut self, key: &[u8]) -> Result<bool> {
        if !self.started || self.exhausted {
            return Ok(false);
        }
        let table_end = self.table_offset + self.hslots * TABLE_ENTRY_SZ;
        while self.loop_count < self.hslots {
            let entry_hash = self.node.read_u32(self.hpos)?;
            let entry_pos = self.node.read_u64(self.hpos + 4)?;

            self.hpos += TABLE_ENTRY_SZ;
            if self.hpos >= table_end {
                self.hpos = self.table_offset;
            }
            self.loop_count += 1;

            if entry_pos == 0 {
                // Zero marks end-of-probe within the table: no further
                // matches are reachable even if `loop_count` has budget left.
                self.exhausted = true;
                return Ok(false);
            }
            if entry_hash != self.khash {
                continue;
            }

            let klen = self.node.read_u32(entry_pos)?;
            let vlen = self.node.read_u32(entry_pos + 4)?;
            if klen as usize != key.len() {
                continue;
            }
            let stored_key = self.node.slice(entry_pos + 8, klen as u64)?;
            if stored_key != key {
                continue;
            }

            self.dpos = entry_pos + 8 + klen as u64;
            self.dlen = vlen;
            return Ok(true);
        }
        self.exhausted = true;
        Ok(false)
    }

    /// One-shot convenience combining `find_start` and a single `find_next`.
    pub fn find(&mut self, key: &[u8]) -> Result<Option<&'n [u8]>> {
        self.find_start(key)?;
        if self.find_next(key)? {
            Ok(Some(self.value()?))
        } else {
            Ok(None)
        }
    }

    /// Zero-copy access to the value at the cursor's current match.
    pub fn value(&self) -> Result<&'n [u8]> {
        self.node.slice(self.dpos, self.dlen as u64)
    }

    /// Copies the value at the cursor's current match into `out`, bounds
    /// checked against the mapped region. Useful when a caller wants an
    /// owned copy or needs to read across a boundary the zero-copy path
    /// doesn't accommodate.
    pub fn read(&self, offset: u64, len: u64, out: &mut Vec<u8>) -> Result<()> {
        self.node.read_into(offset, len, out)
    }

    /// Length in bytes of the value at the cursor's current match.
    pub fn dlen(&self) -> u32 {
        self.dlen
    }

    /// Number of probe comparisons performed so far for the current key.
    /// Bounded by the target slot's `hslots`.
    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }

    /// Returns a not-found error if the cursor has no current match,
    /// otherwise the matched value. Convenience for call sites that want
    /// `?` rather than matching on `Option`.
    pub fn value_or_not_found(&self) -> Result<&'n [u8]> {
        if self.exhausted {
            Err(Error::NotFound)
        } else {
            self.value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::map::Handle;
    use std::io::Cursor as IoCursor;

    fn build(pairs: &[(&[u8], &[u8])]) -> Handle {
        let mut buf = IoCursor::new(Vec::new());
        let mut b = Builder::new(&mut buf).unwrap();
        for (k, v) in pairs {
            b.put(k, v).unwrap();
        }
        b.finalize().unwrap();
        Handle::from_bytes(buf.into_inner()).unwrap()
    }

    #[test]
    fn empty_db_not_found() {
        let handle = build(&[]);
        let mut cur = Cursor::new(handle.current_node());
        assert_eq!(cur.find(b"x").unwrap(), None);
    }

    #[test]
    fn single_entry_round_trip() {
        let handle = build(&[(b"key", b"value")]);
        let mut cur = Cursor::new(handle.current_node());
        assert_eq!(cur.find(b"key").unwrap(), Some(&b"value"[..]));
        assert_eq!(cur.dlen(), 5);
    }

    #[test]
    fn duplicate_keys_in_insertion_order() {
        let handle = build(&[(b"k", b"a"), (b"k", b"b"), (b"k", b"c")]);
        let node = handle.current_node();
        let mut cur = Cursor::new(node);
        cur.find_start(b"k").unwrap();
        assert!(cur.find_next(b"k").unwrap());
        assert_eq!(cur.value().unwrap(), b"a");
        assert!(cur.find_next(b"k").unwrap());
        assert_eq!(cur.value().unwrap(), b"b");
        assert!(cur.find_next(b"k").unwrap());
        assert_eq!(cur.value().unwrap(), b"c");
        assert!(!cur.find_next(b"k").unwrap());
    }

    #[test]
    fn probe_bound_respects_hslots() {
        let handle = build(&[(b"key0", b"1"), (b"key145", b"2")]);
        let node = handle.current_node();
        let mut cur = Cursor::new(node);
        cur.find(b"key0").unwrap();
        assert!(cur.loop_count() <= cur.hslots);
        let mut cur2 = Cursor::new(node);
        cur2.find(b"key145").unwrap();
        assert!(cur2.loop_count() <= cur2.hslots);
    }
}

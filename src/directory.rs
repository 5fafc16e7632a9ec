use crate::error::Result;
use crate::format::{DIR_ENTRY_SZ, SLOTS};
use crate::node::MapNode;

/// One entry of the 256-slot directory: the byte offset and entry count of
/// one hash sub-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirSlot {
    pub offset: u64,
    pub count: u64,
}

/// Reads one directory slot (`s < SLOTS`) directly from the map, without
/// materializing the whole 256-entry directory.
pub fn read_slot(node: &MapNode, s: usize) -> Result<DirSlot> {
    debug_assert!(s < SLOTS);
    let base = s as u64 * DIR_ENTRY_SZ;
    let offset = node.read_u64(base)?;
    let count = node.read_u64(base + 8)?;
    Ok(DirSlot { offset, count })
}

/// Reads the full 256-entry directory. Mostly useful for diagnostics
/// ([`crate::stat::Stat`]) and the record iterator, which needs slot 0's
/// offset to know where the record region ends.
pub fn read_directory(node: &MapNode) -> Result<[DirSlot; SLOTS]> {
    let mut dir = [DirSlot::default(); SLOTS];
    for (s, slot) in dir.iter_mut().enumerate() {
        *slot = read_slot(node, s)?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::map::Handle;
    use std::io::Cursor;

    #[test]
    fn empty_db_directory_is_all_zero() {
        let mut buf = Cursor::new(Vec::new());
        Builder::new(&mut buf).unwrap().finalize().unwrap();
        let bytes = buf.into_inner();
        assert_eq!(bytes.len(), crate::format::HEADER_SZ as usize);

        let handle = Handle::from_bytes(bytes).unwrap();
        let node = handle.current_node();
        let dir = read_directory(node).unwrap();
        assert!(dir.iter().all(|s| s.count == 0));
    }
}

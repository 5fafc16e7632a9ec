//! Diagnostic statistics over a mapped database: a cheap structural summary
//! computed from mcdb's own directory, not a hot-path operation.

use crate::directory::read_directory;
use crate::error::Result;
use crate::format::SLOTS;
use crate::node::MapNode;

/// Summary of one database's directory occupancy. Cheap to compute (256
/// directory reads, no record-region traversal) — useful for consistency
/// checks and for sizing decisions, not for anything on the lookup hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Number of directory slots with at least one entry.
    pub occupied_slots: usize,
    /// Total number of populated hash-table entries across all slots —
    /// equivalently, the total number of records reachable via the
    /// directory.
    pub entries: u64,
    /// Size in entries of the largest single slot's hash table.
    pub max_table_len: u64,
}

impl Stat {
    /// Computes statistics by reading `node`'s directory.
    pub fn compute(node: &MapNode) -> Result<Stat> {
        let dir = read_directory(node)?;
        let mut occupied_slots = 0;
        let mut entries = 0u64;
        let mut max_table_len = 0u64;
        for slot in dir.iter() {
            if slot.count > 0 {
                occupied_slots += 1;
                entries += slot.count;
                max_table_len = max_table_len.max(slot.count * 2);
            }
        }
        Ok(Stat {
            occupied_slots,
            entries,
            max_table_len,
        })
    }

    /// Fraction of the 256 directory slots in use.
    pub fn slot_occupancy(&self) -> f64 {
        self.occupied_slots as f64 / SLOTS as f64
    }
}

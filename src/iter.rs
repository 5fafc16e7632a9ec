use crate::directory::read_slot;
use crate::error::Result;
use crate::format::HEADER_SZ;
use crate::node::MapNode;

/// One record as seen by sequential iteration: borrowed byte ranges into the
/// map, not copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'n> {
    pub key: &'n [u8],
    pub value: &'n [u8],
}

/// Sequential forward walk over every record in the file, used by
/// consistency checks. Starts just past the directory and stops at slot 0's
/// table offset — the boundary between the record region and the first
/// hash table.
pub struct RecordIterator<'n> {
    node: &'n MapNode,
    pos: u64,
    end: u64,
}

impl<'n> RecordIterator<'n> {
    pub fn new(node: &'n MapNode) -> Result<RecordIterator<'n>> {
        let end = read_slot(node, 0)?.offset;
        Ok(RecordIterator {
            node,
            pos: HEADER_SZ,
            end,
        })
    }
}

impl<'n> Iterator for RecordIterator<'n> {
    type Item = Result<Record<'n>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let klen = match self.node.read_u32(self.pos) {
            Ok(v) => v,
            Err(e) => {
                self.pos = self.end;
                return Some(Err(e));
            }
        };
        let vlen = match self.node.read_u32(self.pos + 4) {
            Ok(v) => v,
            Err(e) => {
                self.pos = self.end;
                return Some(Err(e));
            }
        };
        let key_off = self.pos + 8;
        let val_off = key_off + klen as u64;
        let key = match self.node.slice(key_off, klen as u64) {
            Ok(s) => s,
            Err(e) => {
                self.pos = self.end;
                return Some(Err(e));
            }
        };
        let value = match self.node.slice(val_off, vlen as u64) {
            Ok(s) => s,
            Err(e) => {
                self.pos = self.end;
                return Some(Err(e));
            }
        };
        self.pos = val_off + vlen as u64;
        Some(Ok(Record { key, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::map::Handle;
    use std::io::Cursor as IoCursor;

    #[test]
    fn iterates_in_insertion_order() {
        let mut buf = IoCursor::new(Vec::new());
        let mut b = Builder::new(&mut buf).unwrap();
        b.put(b"a", b"1").unwrap();
        b.put(b"b", b"2").unwrap();
        b.put(b"a", b"3").unwrap();
        b.finalize().unwrap();
        let handle = Handle::from_bytes(buf.into_inner()).unwrap();

        let records: Vec<(Vec<u8>, Vec<u8>)> = RecordIterator::new(handle.current_node())
            .unwrap()
            .map(|r| r.map(|rec| (rec.key.to_vec(), rec.value.to_vec())))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(
            records,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"a".to_vec(), b"3".to_vec()),
            ]
        );
    }

    #[test]
    fn empty_db_yields_no_records() {
        let mut buf = IoCursor::new(Vec::new());
        Builder::new(&mut buf).unwrap().finalize().unwrap();
        let handle = Handle::from_bytes(buf.into_inner()).unwrap();
        let count = RecordIterator::new(handle.current_node()).unwrap().count();
        assert_eq!(count, 0);
    }
}

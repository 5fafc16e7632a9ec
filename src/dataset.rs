//! Dataset adapter interfaces.
//!
//! The core does not interpret record bytes — that is the job of
//! out-of-scope dataset adapters (user accounts, groups, hosts, services,
//! …). What the core *does* own is the shape of the interface those
//! adapters plug into: a scratch-buffer write-info record and a
//! `(encode, parse)` capability pair, looked up by dataset identity rather
//! than through inheritance — a capability set keyed by name, not an open
//! trait hierarchy callers extend by subtyping.
//!
//! No concrete dataset codecs ship here; [`KV_CODEC`] is a single worked
//! passthrough example, not a real adapter.

use std::collections::HashMap;

/// Scratch state an `encode` implementation uses while serialising one
/// in-memory record into the bytes a [`crate::builder::Builder`] will write.
///
/// Carries a reusable buffer (so repeated calls don't reallocate), the
/// record being encoded, and the callback an adapter invokes once per
/// computed key (a record may be indexed under more than one key, e.g. a
/// `passwd` entry indexed by both name and uid).
pub struct WriteInfo<'a> {
    /// Reusable scratch buffer; `encode` may append to it and the core
    /// reads back whatever was written before the next call clears it.
    pub scratch: Vec<u8>,
    /// The value bytes the adapter is encoding.
    pub value: &'a [u8],
    /// Called once per key the encoded value should be indexed under.
    pub on_key: &'a mut dyn FnMut(&[u8], &[u8]),
}

impl<'a> WriteInfo<'a> {
    pub fn new(value: &'a [u8], on_key: &'a mut dyn FnMut(&[u8], &[u8])) -> WriteInfo<'a> {
        WriteInfo {
            scratch: Vec::new(),
            value,
            on_key,
        }
    }

    /// Invokes the key callback with `key` and whatever is currently in
    /// `scratch`, then clears the buffer for the next key.
    pub fn emit(&mut self, key: &[u8]) {
        (self.on_key)(key, &self.scratch);
        self.scratch.clear();
    }
}

/// A dataset's encode/parse capability pair. A plain struct of function
/// pointers rather than a trait object: datasets are a closed, small set
/// known at registration time, not an open hierarchy callers extend by
/// subtyping.
#[derive(Clone, Copy)]
pub struct Codec {
    /// Serialises a record into `info.scratch`, calling `info.emit` once per
    /// key the record should be reachable under.
    pub encode: fn(record: &[u8], info: &mut WriteInfo),
    /// Inverts `encode`: given the raw value bytes read back from a record,
    /// reconstructs the adapter's in-memory representation.
    pub parse: fn(value: &[u8]) -> Vec<u8>,
}

/// A registry of dataset codecs keyed by dataset name (e.g. `"passwd"`,
/// `"group"`, `"hosts"`). The core ships empty; adapters register
/// themselves by name rather than the core knowing about them in advance.
#[derive(Default)]
pub struct Registry {
    codecs: HashMap<&'static str, Codec>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            codecs: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, codec: Codec) {
        self.codecs.insert(name, codec);
    }

    pub fn get(&self, name: &str) -> Option<&Codec> {
        self.codecs.get(name)
    }
}

/// A trivial passthrough codec: the record bytes *are* the key, emitted
/// unchanged, and `parse` returns the value bytes unchanged. Exercises the
/// `Codec`/`WriteInfo` shape end to end without committing the core to any
/// real dataset's wire format.
pub const KV_CODEC: Codec = Codec {
    encode: |record, info| {
        info.scratch.extend_from_slice(info.value);
        info.emit(record);
    },
    parse: |value| value.to_vec(),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_codec_round_trips_through_write_info() {
        let mut captured: Option<(Vec<u8>, Vec<u8>)> = None;
        let mut on_key = |k: &[u8], v: &[u8]| captured = Some((k.to_vec(), v.to_vec()));
        let mut info = WriteInfo::new(b"value", &mut on_key);
        (KV_CODEC.encode)(b"key", &mut info);

        let (k, v) = captured.unwrap();
        assert_eq!(k, b"key");
        assert_eq!(v, b"value");
        assert_eq!((KV_CODEC.parse)(&v), b"value");
    }

    #[test]
    fn registry_looks_up_by_name() {
        let mut reg = Registry::new();
        reg.register("kv", KV_CODEC);
        assert!(reg.get("kv").is_some());
        assert!(reg.get("passwd").is_none());
    }
}

//! `Pack` — tagged, ordered, self-describing value list.
//!
//! Carries filter parameters and results across in-process boundaries,
//! e.g. when a worker process re-instantiates a filter from its params.
//! Implemented as an ordered `Vec<PackField>` rather than a raw byte
//! encoding — the fields themselves are the wire format's logical
//! content; `to_bytes`/`from_bytes` give the tagged encoding used for
//! transport.
//!
//! Field ids auto-increment within a pack and unknown trailing fields
//! are ignored on read, so a pack written by a newer filter version
//! still decodes against an older reader.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PackValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Time(i64),
    Bin(Vec<u8>),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackField {
    pub id: u32,
    pub value: PackValue,
}

/// An ordered list of tagged fields. `field_id` auto-increments on each
/// `write_*` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    fields: Vec<PackField>,
    next_id: u32,
}

impl Pack {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, value: PackValue) -> &mut Self {
        let id = self.next_id;
        self.next_id += 1;
        self.fields.push(PackField { id, value });
        self
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.push(PackValue::Bool(v))
    }
    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.push(PackValue::I64(v))
    }
    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.push(PackValue::U64(v))
    }
    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.push(PackValue::U32(v))
    }
    pub fn write_bin(&mut self, v: Vec<u8>) -> &mut Self {
        self.push(PackValue::Bin(v))
    }
    pub fn write_str(&mut self, v: impl Into<String>) -> &mut Self {
        self.push(PackValue::Str(v.into()))
    }

    /// Reads the field at `index` in write order. Returns `None` if the
    /// pack has fewer fields than `index` — callers treat a short read as
    /// an absent optional field rather than an error, so that packs
    /// produced by an older filter version (missing trailing fields
    /// added later) still decode.
    pub fn get(&self, index: usize) -> Option<&PackValue> {
        self.fields.get(index).map(|f| &f.value)
    }

    pub fn get_bin(&self, index: usize) -> Option<&[u8]> {
        match self.get(index) {
            Some(PackValue::Bin(b)) => Some(b),
            _ => None,
        }
    }

    pub fn get_u64(&self, index: usize) -> Option<u64> {
        match self.get(index) {
            Some(PackValue::U64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Some(PackValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Pack serialization is infallible for in-memory values")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_in_order() {
        let mut pack = Pack::new();
        pack.write_u64(42).write_bin(vec![1, 2, 3]).write_str("ok");

        assert_eq!(pack.get_u64(0), Some(42));
        assert_eq!(pack.get_bin(1), Some([1u8, 2, 3].as_slice()));
        assert_eq!(pack.get_str(2), Some("ok"));
    }

    #[test]
    fn wire_round_trip() {
        let mut pack = Pack::new();
        pack.write_bool(true).write_i64(-5);
        let bytes = pack.to_bytes();
        let restored = Pack::from_bytes(&bytes).unwrap();
        assert_eq!(pack, restored);
    }

    #[test]
    fn unknown_trailing_field_is_ignored_by_index_reads() {
        let mut pack = Pack::new();
        pack.write_u64(1);
        // A reader expecting only field 0 never looks at field 1, even if
        // a newer writer appended one.
        pack.write_str("extra-from-newer-writer");
        assert_eq!(pack.get_u64(0), Some(1));
    }

    #[test]
    fn short_read_is_none_not_error() {
        let pack = Pack::new();
        assert_eq!(pack.get(0), None);
    }
}

use std::collections::HashMap;

use nska_bplist::Uid;

use crate::store::{Node, ObjectStore};
use crate::value::Number;

/// Identity of a scalar for deduplication: kind plus exact value.
///
/// Floating values are keyed by bit pattern after folding `-0.0` into `0.0`,
/// so the two zeros share a node and a NaN matches only the identical NaN.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum DedupKey {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Real32(u32),
    Real64(u64),
}

impl From<Number> for DedupKey {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(v) => Self::Integer(v),
            Number::Unsigned(v) => Self::Unsigned(v),
            // -0.0 == 0.0, so both zeros take the positive bit pattern
            Number::Real32(v) => Self::Real32(if v == 0.0 { 0.0f32 } else { v }.to_bits()),
            Number::Real64(v) => Self::Real64(if v == 0.0 { 0.0f64 } else { v }.to_bits()),
        }
    }
}

/// Session-scoped cache from scalar identity to the UID of its node.
#[derive(Debug, Default)]
pub struct ScalarDeduplicator {
    seen: HashMap<DedupKey, Uid>,
}

impl ScalarDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// UID of the string node for `s`, appending one on first sight.
    pub fn intern_string(&mut self, store: &mut ObjectStore, s: &str) -> Uid {
        *self
            .seen
            .entry(DedupKey::String(s.to_owned()))
            .or_insert_with(|| store.append(Node::String(s.to_owned())))
    }

    /// UID of the number node for `n`, appending one on first sight.
    pub fn intern_number(&mut self, store: &mut ObjectStore, n: Number) -> Uid {
        *self
            .seen
            .entry(DedupKey::from(n))
            .or_insert_with(|| store.append(Node::Number(n)))
    }

    /// Number of distinct scalars interned so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

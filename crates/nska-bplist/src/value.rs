use std::fmt;

use serde::{Deserialize, Serialize};

/// Keyed-archiver reference to an entry of the `$objects` array.
///
/// Written with the dedicated UID marker (`0x8_`), which is distinct from
/// plain integers on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(u64);

impl Uid {
    /// Create a UID from a raw index.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// The raw index.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The index as a `usize`, for addressing in-memory arrays.
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Uid {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

/// A property-list value tree.
///
/// Dictionaries keep their entries in insertion order; the writer decides
/// whether to sort them (see [`WriterOptions`](crate::WriterOptions)).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Dictionary(Vec<(String, Value)>),
    Array(Vec<Value>),
    String(String),
    Integer(i64),
    /// Unsigned integer; values at or above 2^63 use the 16-byte encoding.
    UnsignedInteger(u64),
    Real32(f32),
    Real64(f64),
    Data(Vec<u8>),
    Boolean(bool),
    /// Reference into a keyed archive's object table, written once per
    /// occurrence.
    Uid(Uid),
    /// Reference written as a single object however many places hold it.
    /// Reads back as [`Value::Uid`].
    SharedUid(Uid),
}

impl Value {
    /// Build a dictionary from `(key, value)` pairs, keeping their order.
    pub fn dictionary<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Dictionary(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the value's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Dictionary(_) => "dictionary",
            Self::Array(_) => "array",
            Self::String(_) => "string",
            Self::Integer(_) | Self::UnsignedInteger(_) => "integer",
            Self::Real32(_) | Self::Real64(_) => "real",
            Self::Data(_) => "data",
            Self::Boolean(_) => "boolean",
            Self::Uid(_) | Self::SharedUid(_) => "uid",
        }
    }

    /// Look up a dictionary entry by key. Returns `None` for non-dictionaries.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Dictionary(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<Uid> {
        match self {
            Self::Uid(uid) | Self::SharedUid(uid) => Some(*uid),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Integer value widened to `i128`, covering both integer variants.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Integer(v) => Some(*v as i128),
            Self::UnsignedInteger(v) => Some(*v as i128),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<Uid> for Value {
    fn from(uid: Uid) -> Self {
        Self::Uid(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_keeps_insertion_order() {
        let dict = Value::dictionary([("b", Value::Integer(1)), ("a", Value::Integer(2))]);
        match &dict {
            Value::Dictionary(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["b", "a"]);
            }
            other => panic!("expected dictionary, got {other:?}"),
        }
        assert_eq!(dict.get("a"), Some(&Value::Integer(2)));
        assert!(dict.get("missing").is_none());
    }

    #[test]
    fn get_on_non_dictionary_is_none() {
        assert!(Value::from("x").get("x").is_none());
    }

    #[test]
    fn integer_accessor_covers_unsigned() {
        assert_eq!(Value::UnsignedInteger(u64::MAX).as_integer(), Some(u64::MAX as i128));
        assert_eq!(Value::Integer(-3).as_integer(), Some(-3));
        assert_eq!(Value::Real64(1.0).as_integer(), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Uid(Uid::new(1)).type_name(), "uid");
        assert_eq!(Value::SharedUid(Uid::new(1)).type_name(), "uid");
        assert_eq!(Value::SharedUid(Uid::new(4)).as_uid(), Some(Uid::new(4)));
        assert_eq!(Value::Real32(0.0).type_name(), "real");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
    }

    #[test]
    fn uid_display_and_index() {
        let uid = Uid::new(42);
        assert_eq!(uid.to_string(), "42");
        assert_eq!(format!("{uid:?}"), "Uid(42)");
        assert_eq!(uid.as_index(), 42);
    }
}

//! Archivable input values.
//!
//! The archiver accepts a closed vocabulary: strings, kind-tagged numbers,
//! nested dictionaries and byte buffers. Foreign trees (plist values, JSON)
//! are converted once here, and anything outside the vocabulary is rejected
//! with [`ArchiveError::InputShape`].

use std::collections::HashMap;

use nska_bplist::Value;

use crate::error::{ArchiveError, ArchiveResult};

/// A number together with its kind. Equal values of different kinds are
/// distinct archive objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Unsigned(u64),
    Real32(f32),
    Real64(f64),
}

impl Number {
    pub(crate) fn to_plist(self) -> Value {
        match self {
            Self::Integer(v) => Value::Integer(v),
            Self::Unsigned(v) => Value::UnsignedInteger(v),
            Self::Real32(v) => Value::Real32(v),
            Self::Real64(v) => Value::Real64(v),
        }
    }
}

/// One archivable value.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    String(String),
    Number(Number),
    Dictionary(Dictionary),
    Bytes(Vec<u8>),
}

impl Item {
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Dictionary(_) => "dictionary",
            Self::Bytes(_) => "byte buffer",
        }
    }
}

/// Insertion-ordered string-keyed dictionary.
///
/// Re-inserting an existing key replaces the value in place; the key keeps
/// its original position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, Item)>,
    /// Key to position in `entries`.
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Returns the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Item>) -> Option<Item> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Item>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<Item>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Number> for Item {
    fn from(n: Number) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Item {
    fn from(v: i64) -> Self {
        Self::Number(Number::Integer(v))
    }
}

impl From<u64> for Item {
    fn from(v: u64) -> Self {
        Self::Number(Number::Unsigned(v))
    }
}

impl From<f32> for Item {
    fn from(v: f32) -> Self {
        Self::Number(Number::Real32(v))
    }
}

impl From<f64> for Item {
    fn from(v: f64) -> Self {
        Self::Number(Number::Real64(v))
    }
}

impl From<Vec<u8>> for Item {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Item {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Dictionary> for Item {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

fn child_path(path: &str, key: &str) -> String {
    format!("{path}/{key}")
}

fn shape_error(path: &str, found: &'static str) -> ArchiveError {
    let path = if path.is_empty() { "/" } else { path };
    ArchiveError::InputShape {
        path: path.to_owned(),
        found,
    }
}

fn item_from_plist(value: Value, path: &str) -> ArchiveResult<Item> {
    Ok(match value {
        Value::String(s) => Item::String(s),
        Value::Integer(v) => Number::Integer(v).into(),
        Value::UnsignedInteger(v) => Number::Unsigned(v).into(),
        Value::Real32(v) => Number::Real32(v).into(),
        Value::Real64(v) => Number::Real64(v).into(),
        Value::Data(bytes) => Item::Bytes(bytes),
        Value::Dictionary(entries) => {
            let mut dict = Dictionary::new();
            for (key, value) in entries {
                let item = item_from_plist(value, &child_path(path, &key))?;
                dict.insert(key, item);
            }
            Item::Dictionary(dict)
        }
        other @ (Value::Array(_) | Value::Boolean(_) | Value::Uid(_) | Value::SharedUid(_)) => {
            return Err(shape_error(path, other.type_name()))
        }
    })
}

fn item_from_json(value: serde_json::Value, path: &str) -> ArchiveResult<Item> {
    use serde_json::Value as Json;

    Ok(match value {
        Json::String(s) => Item::String(s),
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Number::Integer(v).into()
            } else if let Some(v) = n.as_u64() {
                Number::Unsigned(v).into()
            } else if let Some(v) = n.as_f64() {
                Number::Real64(v).into()
            } else {
                return Err(shape_error(path, "number"));
            }
        }
        Json::Object(map) => {
            let mut dict = Dictionary::new();
            for (key, value) in map {
                let item = item_from_json(value, &child_path(path, &key))?;
                dict.insert(key, item);
            }
            Item::Dictionary(dict)
        }
        Json::Array(_) => return Err(shape_error(path, "array")),
        Json::Bool(_) => return Err(shape_error(path, "boolean")),
        Json::Null => return Err(shape_error(path, "null")),
    })
}

impl TryFrom<Value> for Item {
    type Error = ArchiveError;

    fn try_from(value: Value) -> ArchiveResult<Self> {
        item_from_plist(value, "")
    }
}

impl TryFrom<serde_json::Value> for Item {
    type Error = ArchiveError;

    /// JSON objects keep their document order.
    fn try_from(value: serde_json::Value) -> ArchiveResult<Self> {
        item_from_json(value, "")
    }
}

impl TryFrom<Item> for Dictionary {
    type Error = ArchiveError;

    fn try_from(item: Item) -> ArchiveResult<Self> {
        match item {
            Item::Dictionary(dict) => Ok(dict),
            other => Err(shape_error("", other.kind_name())),
        }
    }
}

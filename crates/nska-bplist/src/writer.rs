use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::PlistResult;
use crate::value::{Uid, Value};

pub(crate) const MAGIC: &[u8; 8] = b"bplist00";
pub(crate) const TRAILER_LEN: usize = 32;

/// Options controlling the byte layout of written property lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Write dictionary entries sorted by key (code point order) instead of
    /// insertion order.
    pub sort_keys: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self { sort_keys: true }
    }
}

/// Serialize a value to `bplist00` bytes with default options.
pub fn to_bytes(value: &Value) -> PlistResult<Vec<u8>> {
    to_bytes_with(value, &WriterOptions::default())
}

/// Serialize a value to `bplist00` bytes.
pub fn to_bytes_with(value: &Value, options: &WriterOptions) -> PlistResult<Vec<u8>> {
    let mut out = Vec::new();
    to_writer(&mut out, value, options)?;
    Ok(out)
}

/// Serialize a value into an I/O sink.
pub fn to_writer<W: Write>(mut sink: W, value: &Value, options: &WriterOptions) -> PlistResult<()> {
    let bytes = encode(value, options);
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

/// Uniquing key for leaf objects. Strings, numbers, data, booleans and
/// shared UIDs that compare equal share one object in the output table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Scalar<'a> {
    String(&'a str),
    Integer(i128),
    Real32(u32),
    Real64(u64),
    Data(&'a [u8]),
    Boolean(bool),
    Uid(Uid),
}

/// One entry of the flattened object table.
enum Flat<'a> {
    Scalar(Scalar<'a>),
    Uid(Uid),
    Array(Vec<u64>),
    Dictionary { keys: Vec<u64>, values: Vec<u64> },
}

/// Depth-first flattening: a container takes its slot before its children,
/// then all keys are visited, then all values.
struct Flattener<'a> {
    sort_keys: bool,
    objects: Vec<Flat<'a>>,
    scalars: HashMap<Scalar<'a>, u64>,
}

impl<'a> Flattener<'a> {
    fn push(&mut self, flat: Flat<'a>) -> u64 {
        self.objects.push(flat);
        (self.objects.len() - 1) as u64
    }

    fn scalar(&mut self, scalar: Scalar<'a>) -> u64 {
        if let Some(&index) = self.scalars.get(&scalar) {
            return index;
        }
        let index = self.push(Flat::Scalar(scalar));
        self.scalars.insert(scalar, index);
        index
    }

    fn flatten(&mut self, value: &'a Value) -> u64 {
        let scalar = match value {
            Value::Array(items) => {
                let slot = self.push(Flat::Array(Vec::new()));
                let refs = items.iter().map(|item| self.flatten(item)).collect();
                self.objects[slot as usize] = Flat::Array(refs);
                return slot;
            }
            Value::Dictionary(entries) => {
                let mut ordered: Vec<&'a (String, Value)> = entries.iter().collect();
                if self.sort_keys {
                    ordered.sort_by(|a, b| a.0.cmp(&b.0));
                }
                let slot = self.push(Flat::Dictionary {
                    keys: Vec::new(),
                    values: Vec::new(),
                });
                let mut keys = Vec::with_capacity(ordered.len());
                for &entry in &ordered {
                    keys.push(self.scalar(Scalar::String(entry.0.as_str())));
                }
                let mut values = Vec::with_capacity(ordered.len());
                for &entry in &ordered {
                    values.push(self.flatten(&entry.1));
                }
                self.objects[slot as usize] = Flat::Dictionary { keys, values };
                return slot;
            }
            Value::Uid(uid) => return self.push(Flat::Uid(*uid)),
            Value::String(s) => Scalar::String(s),
            Value::Integer(v) => Scalar::Integer(*v as i128),
            Value::UnsignedInteger(v) => Scalar::Integer(*v as i128),
            Value::Real32(v) => Scalar::Real32(v.to_bits()),
            Value::Real64(v) => Scalar::Real64(v.to_bits()),
            Value::Data(bytes) => Scalar::Data(bytes),
            Value::Boolean(b) => Scalar::Boolean(*b),
            Value::SharedUid(uid) => Scalar::Uid(*uid),
        };
        self.scalar(scalar)
    }
}

fn encode(value: &Value, options: &WriterOptions) -> Vec<u8> {
    let mut flattener = Flattener {
        sort_keys: options.sort_keys,
        objects: Vec::new(),
        scalars: HashMap::new(),
    };
    let top = flattener.flatten(value);
    let objects = flattener.objects;

    let count = objects.len() as u64;
    let ref_size = width_for(count);

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);

    let mut offsets = Vec::with_capacity(objects.len());
    for object in &objects {
        offsets.push(out.len() as u64);
        write_object(&mut out, object, ref_size);
    }

    let table_offset = out.len() as u64;
    let offset_size = width_for(table_offset);
    for offset in offsets {
        push_sized(&mut out, offset, offset_size);
    }

    // Trailer: 5 unused bytes, sort version, offset size, ref size,
    // object count, top object, offset table position.
    out.extend_from_slice(&[0u8; 6]);
    out.push(offset_size as u8);
    out.push(ref_size as u8);
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&top.to_be_bytes());
    out.extend_from_slice(&table_offset.to_be_bytes());
    out
}

/// Smallest of 1/2/4/8 bytes able to hold `count`.
fn width_for(count: u64) -> usize {
    if count < 1 << 8 {
        1
    } else if count < 1 << 16 {
        2
    } else if count < 1 << 32 {
        4
    } else {
        8
    }
}

fn push_sized(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

fn write_object(out: &mut Vec<u8>, object: &Flat<'_>, ref_size: usize) {
    match object {
        Flat::Scalar(Scalar::String(s)) => write_string(out, s),
        Flat::Scalar(Scalar::Integer(v)) => write_integer(out, *v),
        Flat::Scalar(Scalar::Real32(bits)) => {
            out.push(0x22);
            out.extend_from_slice(&bits.to_be_bytes());
        }
        Flat::Scalar(Scalar::Real64(bits)) => {
            out.push(0x23);
            out.extend_from_slice(&bits.to_be_bytes());
        }
        Flat::Scalar(Scalar::Data(bytes)) => {
            write_marker(out, 0x40, bytes.len());
            out.extend_from_slice(bytes);
        }
        Flat::Scalar(Scalar::Boolean(b)) => out.push(if *b { 0x09 } else { 0x08 }),
        Flat::Scalar(Scalar::Uid(uid)) | Flat::Uid(uid) => write_uid(out, *uid),
        Flat::Array(refs) => {
            write_marker(out, 0xA0, refs.len());
            for &r in refs {
                push_sized(out, r, ref_size);
            }
        }
        Flat::Dictionary { keys, values } => {
            write_marker(out, 0xD0, keys.len());
            for &r in keys.iter().chain(values) {
                push_sized(out, r, ref_size);
            }
        }
    }
}

fn write_integer(out: &mut Vec<u8>, value: i128) {
    if value < 0 {
        out.push(0x13);
        out.extend_from_slice(&(value as i64).to_be_bytes());
    } else if value < 1 << 8 {
        out.push(0x10);
        out.push(value as u8);
    } else if value < 1 << 16 {
        out.push(0x11);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value < 1 << 32 {
        out.push(0x12);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else if value < 1 << 63 {
        out.push(0x13);
        out.extend_from_slice(&(value as u64).to_be_bytes());
    } else {
        out.push(0x14);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Type nibble plus inline length, or `0xF` followed by an integer object.
fn write_marker(out: &mut Vec<u8>, token: u8, len: usize) {
    if len < 15 {
        out.push(token | len as u8);
    } else {
        out.push(token | 0x0F);
        write_integer(out, len as i128);
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    if s.is_ascii() {
        write_marker(out, 0x50, s.len());
        out.extend_from_slice(s.as_bytes());
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        write_marker(out, 0x60, units.len());
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

fn write_uid(out: &mut Vec<u8>, uid: Uid) {
    let v = uid.get();
    if v < 1 << 8 {
        out.push(0x80);
        out.push(v as u8);
    } else if v < 1 << 16 {
        out.push(0x81);
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if v < 1 << 32 {
        out.push(0x83);
        out.extend_from_slice(&(v as u32).to_be_bytes());
    } else {
        out.push(0x87);
        out.extend_from_slice(&v.to_be_bytes());
    }
}

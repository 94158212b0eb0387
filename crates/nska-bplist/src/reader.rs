use crate::error::{PlistError, PlistResult};
use crate::value::{Uid, Value};
use crate::writer::{MAGIC, TRAILER_LEN};

/// Deepest container nesting accepted.
pub const MAX_DEPTH: usize = 256;

/// Most value nodes a single parse may materialize, counting every copy of a
/// shared object.
pub const MAX_MATERIALIZED: u64 = 1 << 22;

/// Parse `bplist00` bytes into a value tree.
///
/// UID references come back as [`Value::Uid`]; nothing is resolved. Objects
/// referenced from several places are parsed once and copied. Nesting deeper
/// than [`MAX_DEPTH`] or a tree larger than [`MAX_MATERIALIZED`] nodes is
/// rejected as corrupt.
pub fn from_bytes(data: &[u8]) -> PlistResult<Value> {
    let reader = BinaryReader::new(data)?;
    let mut walk = Walk::new(reader.offsets.len());
    let (value, _) = reader.read_object(reader.top, &mut walk, 0)?;
    Ok(value)
}

/// Per-parse state: finished objects, the open container path, and the
/// running node count.
struct Walk {
    parsed: Vec<Option<(Value, u64)>>,
    visiting: Vec<bool>,
    materialized: u64,
}

impl Walk {
    fn new(object_count: usize) -> Self {
        Self {
            parsed: vec![None; object_count],
            visiting: vec![false; object_count],
            materialized: 0,
        }
    }

    fn charge(&mut self, nodes: u64, offset: usize) -> PlistResult<()> {
        self.materialized = self.materialized.saturating_add(nodes);
        if self.materialized > MAX_MATERIALIZED {
            return Err(PlistError::Corrupt {
                offset: offset as u64,
                reason: format!("object tree expands past {MAX_MATERIALIZED} nodes"),
            });
        }
        Ok(())
    }
}

struct BinaryReader<'a> {
    data: &'a [u8],
    ref_size: usize,
    top: u64,
    table_offset: u64,
    offsets: Vec<u64>,
}

impl<'a> BinaryReader<'a> {
    fn new(data: &'a [u8]) -> PlistResult<Self> {
        if data.len() < MAGIC.len() + TRAILER_LEN {
            return Err(PlistError::Truncated(format!(
                "{} bytes is shorter than header and trailer",
                data.len()
            )));
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(PlistError::InvalidMagic {
                expected: String::from_utf8_lossy(MAGIC).into(),
                actual: hex::encode(&data[..MAGIC.len()]),
            });
        }

        let trailer_start = data.len() - TRAILER_LEN;
        let trailer = &data[trailer_start..];
        let offset_size = trailer[6] as usize;
        let ref_size = trailer[7] as usize;
        let object_count = read_uint(&trailer[8..16]);
        let top = read_uint(&trailer[16..24]);
        let table_offset = read_uint(&trailer[24..32]);

        for (name, size) in [("offset", offset_size), ("reference", ref_size)] {
            if !matches!(size, 1 | 2 | 4 | 8) {
                return Err(PlistError::Corrupt {
                    offset: trailer_start as u64,
                    reason: format!("invalid {name} size {size}"),
                });
            }
        }
        if top >= object_count {
            return Err(PlistError::Corrupt {
                offset: trailer_start as u64,
                reason: format!("top object {top} outside {object_count} objects"),
            });
        }

        let table_len = object_count
            .checked_mul(offset_size as u64)
            .and_then(|len| len.checked_add(table_offset))
            .filter(|&end| end <= trailer_start as u64)
            .ok_or_else(|| PlistError::Corrupt {
                offset: table_offset,
                reason: "offset table extends past trailer".into(),
            })?;
        let table = &data[table_offset as usize..table_len as usize];

        let mut offsets = Vec::with_capacity(object_count as usize);
        for chunk in table.chunks(offset_size) {
            let offset = read_uint(chunk);
            if offset < MAGIC.len() as u64 || offset >= table_offset {
                return Err(PlistError::Corrupt {
                    offset,
                    reason: "object offset outside object area".into(),
                });
            }
            offsets.push(offset);
        }

        Ok(Self {
            data,
            ref_size,
            top,
            table_offset,
            offsets,
        })
    }

    fn slice(&self, start: usize, len: usize) -> PlistResult<&'a [u8]> {
        start
            .checked_add(len)
            .filter(|&end| end as u64 <= self.table_offset)
            .map(|end| &self.data[start..end])
            .ok_or_else(|| {
                PlistError::Truncated(format!("{len} bytes at offset {start} run past object area"))
            })
    }

    /// Inline length from the marker nibble, or the integer object after it.
    /// Returns (length, start of payload).
    fn read_length(&self, offset: usize, marker: u8) -> PlistResult<(usize, usize)> {
        let nibble = marker & 0x0F;
        if nibble != 0x0F {
            return Ok((nibble as usize, offset + 1));
        }
        let int_marker = self.slice(offset + 1, 1)?[0];
        let width = 1usize << (int_marker & 0x0F);
        if int_marker >> 4 != 0x1 || width > 8 {
            return Err(PlistError::Corrupt {
                offset: offset as u64 + 1,
                reason: format!("bad length marker 0x{int_marker:02x}"),
            });
        }
        let len = read_uint(self.slice(offset + 2, width)?) as usize;
        Ok((len, offset + 2 + width))
    }

    fn read_refs(&self, start: usize, count: usize) -> PlistResult<Vec<u64>> {
        let len = count.checked_mul(self.ref_size).ok_or_else(|| PlistError::Corrupt {
            offset: start as u64,
            reason: "reference count overflow".into(),
        })?;
        Ok(self.slice(start, len)?.chunks(self.ref_size).map(read_uint).collect())
    }

    /// Value of object `index` and its node count.
    fn read_object(&self, index: u64, walk: &mut Walk, depth: usize) -> PlistResult<(Value, u64)> {
        let slot = index as usize;
        let offset = *self.offsets.get(slot).ok_or_else(|| PlistError::Corrupt {
            offset: 0,
            reason: format!("reference {index} outside {} objects", self.offsets.len()),
        })? as usize;
        if let Some(nodes) = walk.parsed[slot].as_ref().map(|(_, nodes)| *nodes) {
            walk.charge(nodes, offset)?;
            if let Some((value, _)) = &walk.parsed[slot] {
                return Ok((value.clone(), nodes));
            }
        }
        if walk.visiting[slot] {
            return Err(PlistError::ReferenceCycle(index));
        }
        let marker = self.slice(offset, 1)?[0];
        let unknown = PlistError::UnknownMarker {
            offset: offset as u64,
            marker,
        };
        if matches!(marker >> 4, 0xA | 0xD) && depth >= MAX_DEPTH {
            return Err(PlistError::Corrupt {
                offset: offset as u64,
                reason: format!("containers nested deeper than {MAX_DEPTH}"),
            });
        }

        let mut nodes = 1u64;
        let value = match marker >> 4 {
            0x0 => match marker {
                0x08 => Value::Boolean(false),
                0x09 => Value::Boolean(true),
                _ => return Err(unknown),
            },
            0x1 => self.read_integer(offset, marker)?,
            0x2 => match marker {
                0x22 => {
                    let bits = read_uint(self.slice(offset + 1, 4)?) as u32;
                    Value::Real32(f32::from_bits(bits))
                }
                0x23 => Value::Real64(f64::from_bits(read_uint(self.slice(offset + 1, 8)?))),
                _ => return Err(unknown),
            },
            0x4 => {
                let (len, start) = self.read_length(offset, marker)?;
                Value::Data(self.slice(start, len)?.to_vec())
            }
            0x5 => {
                let (len, start) = self.read_length(offset, marker)?;
                let bytes = self.slice(start, len)?;
                if !bytes.is_ascii() {
                    return Err(PlistError::Corrupt {
                        offset: offset as u64,
                        reason: "non-ASCII byte in ASCII string".into(),
                    });
                }
                Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            0x6 => {
                let (len, start) = self.read_length(offset, marker)?;
                let units: Vec<u16> = self
                    .slice(start, len.saturating_mul(2))?
                    .chunks(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                let s = String::from_utf16(&units).map_err(|e| PlistError::Corrupt {
                    offset: offset as u64,
                    reason: e.to_string(),
                })?;
                Value::String(s)
            }
            0x8 => {
                let width = (marker & 0x0F) as usize + 1;
                if !matches!(width, 1 | 2 | 4 | 8) {
                    return Err(unknown);
                }
                Value::Uid(Uid::new(read_uint(self.slice(offset + 1, width)?)))
            }
            0xA => {
                let (count, start) = self.read_length(offset, marker)?;
                let refs = self.read_refs(start, count)?;
                walk.visiting[slot] = true;
                let mut items = Vec::with_capacity(refs.len());
                for r in refs {
                    let (item, size) = self.read_object(r, walk, depth + 1)?;
                    nodes = nodes.saturating_add(size);
                    items.push(item);
                }
                walk.visiting[slot] = false;
                Value::Array(items)
            }
            0xD => {
                let (count, start) = self.read_length(offset, marker)?;
                let refs = self.read_refs(start, count.saturating_mul(2))?;
                let (key_refs, value_refs) = refs.split_at(count);
                walk.visiting[slot] = true;
                let mut entries = Vec::with_capacity(count);
                for (&k, &v) in key_refs.iter().zip(value_refs) {
                    let key = match self.read_object(k, walk, depth + 1)? {
                        (Value::String(s), _) => s,
                        (other, _) => {
                            return Err(PlistError::Corrupt {
                                offset: offset as u64,
                                reason: format!("dictionary key is a {}", other.type_name()),
                            })
                        }
                    };
                    let (value, size) = self.read_object(v, walk, depth + 1)?;
                    nodes = nodes.saturating_add(size).saturating_add(1);
                    entries.push((key, value));
                }
                walk.visiting[slot] = false;
                Value::Dictionary(entries)
            }
            _ => return Err(unknown),
        };
        // children are already counted; this charges the copy kept in `parsed`
        walk.charge(nodes, offset)?;
        walk.parsed[slot] = Some((value.clone(), nodes));
        Ok((value, nodes))
    }

    fn read_integer(&self, offset: usize, marker: u8) -> PlistResult<Value> {
        let width = 1usize << (marker & 0x0F);
        let bytes = match width {
            1 | 2 | 4 | 8 | 16 => self.slice(offset + 1, width)?,
            _ => {
                return Err(PlistError::UnknownMarker {
                    offset: offset as u64,
                    marker,
                })
            }
        };
        match width {
            8 => Ok(Value::Integer(read_uint(bytes) as i64)),
            16 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(bytes);
                let wide = i128::from_be_bytes(buf);
                if let Ok(v) = i64::try_from(wide) {
                    Ok(Value::Integer(v))
                } else if let Ok(v) = u64::try_from(wide) {
                    Ok(Value::UnsignedInteger(v))
                } else {
                    Err(PlistError::Corrupt {
                        offset: offset as u64,
                        reason: "integer exceeds 64 bits".into(),
                    })
                }
            }
            _ => Ok(Value::Integer(read_uint(bytes) as i64)),
        }
    }
}

/// Big-endian unsigned integer of up to 8 bytes.
fn read_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

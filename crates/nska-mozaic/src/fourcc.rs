//! Four-character codes identifying the Audio Unit.

/// Pack four ASCII bytes into a big-endian code, as Audio Unit component
/// descriptions store them.
pub const fn fourcc(code: &[u8; 4]) -> i64 {
    ((code[0] as i64) << 24) | ((code[1] as i64) << 16) | ((code[2] as i64) << 8) | code[3] as i64
}

/// Component manufacturer, `Bram`.
pub const MANUFACTURER: i64 = fourcc(b"Bram");

/// Component subtype, `mozc`.
pub const SUBTYPE: i64 = fourcc(b"mozc");

/// Component type, `aumi` (MIDI processor).
pub const TYPE: i64 = fourcc(b"aumi");

/// Unpack a code into its four characters. `None` if the value does not fit
/// in 32 bits or any byte is not printable ASCII.
pub fn fourcc_to_string(value: i64) -> Option<String> {
    let bytes = u32::try_from(value).ok()?.to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

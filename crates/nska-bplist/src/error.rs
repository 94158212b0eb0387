use thiserror::Error;

/// Errors from writing or reading binary property lists.
#[derive(Debug, Error)]
pub enum PlistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bplist magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("bplist truncated: {0}")]
    Truncated(String),

    #[error("corrupt bplist at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("unknown object marker 0x{marker:02x} at offset {offset}")]
    UnknownMarker { offset: u64, marker: u8 },

    #[error("object {0} references itself through its children")]
    ReferenceCycle(u64),
}

pub type PlistResult<T> = Result<T, PlistError>;

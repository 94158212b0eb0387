//! Binary property lists (`bplist00`) for the keyed archiver.
//!
//! The archiver hands its finished envelope to this crate as a [`Value`] tree
//! and gets wire bytes back. The byte layout follows the writer that produced
//! the known-good reference archives, so identical trees always serialize to
//! identical bytes.
//!
//! # Layout
//!
//! - **Header**: the 8-byte magic `bplist00`
//! - **Objects**: flattened depth-first; a container takes its slot before its
//!   children, dictionary keys are visited before dictionary values
//! - **Uniquing**: equal strings, numbers, data and booleans are written once,
//!   as is each [`Value::SharedUid`]; containers and plain UID references are
//!   written per occurrence
//! - **Offset table**: one big-endian offset per object, 1/2/4/8 bytes wide
//! - **Trailer**: 32 bytes with the offset width, reference width, object
//!   count, top object and offset table position
//!
//! [`from_bytes`] reads the same format back without resolving UIDs, parsing
//! shared objects once and bounding nesting depth and tree size.

pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

pub use error::{PlistError, PlistResult};
pub use reader::from_bytes;
pub use value::{Uid, Value};
pub use writer::{to_bytes, to_bytes_with, to_writer, WriterOptions};

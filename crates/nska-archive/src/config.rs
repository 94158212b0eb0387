use nska_bplist::WriterOptions;
use serde::{Deserialize, Serialize};

use crate::class::ClassPolicy;
use crate::error::ArchiveResult;

/// Archiver name written to `$archiver`.
pub const ARCHIVER_NAME: &str = "NSKeyedArchiver";

/// Format version written to `$version`.
pub const ARCHIVE_VERSION: u64 = 100_000;

/// The single key of the `$top` mapping.
pub const ROOT_KEY: &str = "root";

/// Configuration for an [`Archiver`](crate::Archiver).
///
/// The defaults reproduce the archives Foundation's keyed archiver reads;
/// the fields exist for tests and for consumers with other class names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Value of `$archiver`.
    pub archiver: String,
    /// Value of `$version`.
    pub version: u64,
    /// Key of the root entry in `$top`.
    pub root_key: String,
    /// Classes assigned to dictionaries and byte buffers.
    pub classes: ClassPolicy,
    /// Byte layout of the written property list.
    pub writer: WriterOptions,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            archiver: ARCHIVER_NAME.into(),
            version: ARCHIVE_VERSION,
            root_key: ROOT_KEY.into(),
            classes: ClassPolicy::default(),
            writer: WriterOptions::default(),
        }
    }
}

impl ArchiverConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> ArchiveResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

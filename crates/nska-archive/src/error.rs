use nska_bplist::{PlistError, Uid};

/// Errors from building or serializing a keyed archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The input contained a value outside the archivable vocabulary
    /// (string, number, dictionary, byte buffer), or the root was not a
    /// dictionary.
    #[error("unsupported {found} at {path}")]
    InputShape { path: String, found: &'static str },

    /// The object graph referenced a UID that was never created, or a slot
    /// was left unfilled. Indicates an encoder defect.
    #[error("inconsistent object graph at uid {uid}: {reason}")]
    InternalConsistency { uid: Uid, reason: String },

    /// The property-list writer rejected the envelope or its sink failed.
    #[error("plist writer error: {0}")]
    Writer(#[from] PlistError),

    /// Archiver configuration could not be parsed.
    #[error("invalid archiver config: {0}")]
    Config(#[from] toml::de::Error),
}

impl ArchiveError {
    pub(crate) fn inconsistent(uid: Uid, reason: impl Into<String>) -> Self {
        Self::InternalConsistency {
            uid,
            reason: reason.into(),
        }
    }
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

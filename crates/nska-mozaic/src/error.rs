use nska_archive::ArchiveError;

/// Errors from building or writing Mozaic documents.
#[derive(Debug, thiserror::Error)]
pub enum MozaicError {
    /// The document could not be archived.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Reading a config file or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`MozaicConfig`](crate::MozaicConfig).
    #[error("invalid mozaic config: {0}")]
    Config(#[from] toml::de::Error),

    /// Knob index past the plugin's knob count.
    #[error("knob index {index} out of range (plugin has {count} knobs)")]
    KnobOutOfRange { index: usize, count: usize },

    /// GUI layout outside the plugin's layouts.
    #[error("layout {0} out of range (expected 0..={max})", max = crate::document::MAX_LAYOUT)]
    InvalidLayout(u8),
}

/// Result alias for Mozaic operations.
pub type MozaicResult<T> = Result<T, MozaicError>;

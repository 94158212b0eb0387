use std::path::Path;

use nska_archive::ArchiverConfig;
use serde::{Deserialize, Serialize};

use crate::document::{DEFAULT_KNOB_TITLE, DEFAULT_LAYOUT, DEFAULT_SCALE, MAX_LAYOUT};
use crate::error::{MozaicError, MozaicResult};

/// Document defaults and archive settings, loadable from TOML.
///
/// ```toml
/// knob_title = "Chord Sequence"
/// layout = 2
///
/// [archive.writer]
/// sort_keys = true
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MozaicConfig {
    /// Title shown above the knob bank.
    pub knob_title: String,
    /// Title shown above the pads.
    pub pad_title: String,
    /// Title shown above the XY pad.
    pub xy_title: String,
    /// GUI layout, 0 through 7.
    pub layout: u8,
    /// Scale mask, one bit per semitone.
    pub scale: i64,
    /// Keyed-archive settings.
    pub archive: ArchiverConfig,
}

impl Default for MozaicConfig {
    fn default() -> Self {
        Self {
            knob_title: DEFAULT_KNOB_TITLE.into(),
            pad_title: String::new(),
            xy_title: String::new(),
            layout: DEFAULT_LAYOUT,
            scale: DEFAULT_SCALE,
            archive: ArchiverConfig::default(),
        }
    }
}

impl MozaicConfig {
    /// Parse and validate a TOML document. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> MozaicResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> MozaicResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> MozaicResult<()> {
        if self.layout > MAX_LAYOUT {
            return Err(MozaicError::InvalidLayout(self.layout));
        }
        Ok(())
    }
}

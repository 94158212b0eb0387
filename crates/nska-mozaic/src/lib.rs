//! Mozaic patch documents.
//!
//! Mozaic (a MIDI scripting Audio Unit) saves its state as a keyed archive of
//! one flat dictionary: the script source, knob labels and values, pad and XY
//! titles, GUI layout and the component's four-character codes. This crate
//! builds that dictionary around a script and archives it with
//! `nska-archive`.
//!
//! # Architecture
//!
//! - **MozaicDocument**: plugin state with setters; renders the field
//!   dictionary in Mozaic's own order
//! - **MozaicConfig**: document defaults and archiver settings from TOML
//! - **fourcc**: component manufacturer, subtype and type codes
//! - [`write_mozaic_file`]: one call from script text to a `.mozaic` file

pub mod config;
pub mod document;
pub mod error;
pub mod fourcc;

pub use config::MozaicConfig;
pub use document::{MozaicDocument, KNOB_COUNT, MAX_LAYOUT};
pub use error::{MozaicError, MozaicResult};
pub use fourcc::{fourcc, fourcc_to_string};

use std::path::{Path, PathBuf};

/// File extension Mozaic opens.
pub const EXTENSION: &str = "mozaic";

/// `path` with `.mozaic` appended unless it already ends in it.
pub fn mozaic_output_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(EXTENSION);
    PathBuf::from(name)
}

/// Write `script` as a Mozaic patch at `output` with default plugin state.
///
/// The output gets a `.mozaic` extension if it lacks one. The embedded
/// filename defaults to the output's file stem. Returns the path written.
pub fn write_mozaic_file(
    script: &str,
    output: impl AsRef<Path>,
    filename: Option<&str>,
) -> MozaicResult<PathBuf> {
    write_mozaic_file_with(script, output, filename, &MozaicConfig::default())
}

/// [`write_mozaic_file`] with document defaults and archive settings from
/// `config`.
pub fn write_mozaic_file_with(
    script: &str,
    output: impl AsRef<Path>,
    filename: Option<&str>,
    config: &MozaicConfig,
) -> MozaicResult<PathBuf> {
    let path = mozaic_output_path(output);
    let filename = match filename {
        Some(name) => name.to_owned(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let doc = MozaicDocument::with_config(script, filename, config)?;
    let archiver = nska_archive::Archiver::new(config.archive.clone());
    doc.write_with(&path, &archiver)?;
    Ok(path)
}

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nska_archive::{Archiver, Dictionary};
use tracing::info;

use crate::config::MozaicConfig;
use crate::error::{MozaicError, MozaicResult};
use crate::fourcc;

pub const KNOB_COUNT: usize = 22;
pub const AU_VALUE_COUNT: usize = 8;
pub const VARIABLE_COUNT: usize = 6;
pub const VARIABLE_LEN: usize = 16;
pub const GUI_LEN: usize = 40;
/// Offset of the layout byte inside the GUI blob.
pub const GUI_LAYOUT_OFFSET: usize = 36;
pub const MAX_LAYOUT: u8 = 7;

pub const DEFAULT_KNOB_TITLE: &str = "Chord Sequence";
pub const DEFAULT_LAYOUT: u8 = 2;
/// All twelve semitones enabled.
pub const DEFAULT_SCALE: i64 = 0x0FFF;
pub const DEFAULT_AU_VALUES: [f64; AU_VALUE_COUNT] = [0.0, 0.0, 0.5, 0.0, 0.0, 0.5, 0.0, 0.0];

/// Plugin state document version.
const DOCUMENT_VERSION: i64 = 1;

/// A Mozaic patch: a script plus the plugin state saved around it.
#[derive(Clone, Debug, PartialEq)]
pub struct MozaicDocument {
    script: String,
    filename: String,
    au_values: [f64; AU_VALUE_COUNT],
    knob_labels: Vec<String>,
    knob_values: [f64; KNOB_COUNT],
    knob_title: String,
    pad_title: String,
    xy_title: String,
    x_value: f64,
    y_value: f64,
    scale: i64,
    layout: u8,
}

impl MozaicDocument {
    /// A document with default plugin state around `script`. `filename` is
    /// the name Mozaic shows for the patch.
    pub fn new(script: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            filename: filename.into(),
            au_values: DEFAULT_AU_VALUES,
            knob_labels: (0..KNOB_COUNT).map(|i| format!("Knob {i}")).collect(),
            knob_values: [0.0; KNOB_COUNT],
            knob_title: DEFAULT_KNOB_TITLE.into(),
            pad_title: String::new(),
            xy_title: String::new(),
            x_value: 0.0,
            y_value: 0.0,
            scale: DEFAULT_SCALE,
            layout: DEFAULT_LAYOUT,
        }
    }

    /// Like [`new`](Self::new) with titles, scale and layout from `config`.
    pub fn with_config(
        script: impl Into<String>,
        filename: impl Into<String>,
        config: &MozaicConfig,
    ) -> MozaicResult<Self> {
        config.validate()?;
        let mut doc = Self::new(script, filename);
        doc.knob_title = config.knob_title.clone();
        doc.pad_title = config.pad_title.clone();
        doc.xy_title = config.xy_title.clone();
        doc.scale = config.scale;
        doc.layout = config.layout;
        Ok(doc)
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn layout(&self) -> u8 {
        self.layout
    }

    pub fn knob_label(&self, index: usize) -> Option<&str> {
        self.knob_labels.get(index).map(String::as_str)
    }

    pub fn knob_value(&self, index: usize) -> Option<f64> {
        self.knob_values.get(index).copied()
    }

    pub fn set_knob_label(&mut self, index: usize, label: impl Into<String>) -> MozaicResult<()> {
        let slot = self
            .knob_labels
            .get_mut(index)
            .ok_or(MozaicError::KnobOutOfRange {
                index,
                count: KNOB_COUNT,
            })?;
        *slot = label.into();
        Ok(())
    }

    pub fn set_knob_value(&mut self, index: usize, value: f64) -> MozaicResult<()> {
        let slot = self
            .knob_values
            .get_mut(index)
            .ok_or(MozaicError::KnobOutOfRange {
                index,
                count: KNOB_COUNT,
            })?;
        *slot = value;
        Ok(())
    }

    pub fn set_knob_title(&mut self, title: impl Into<String>) {
        self.knob_title = title.into();
    }

    pub fn set_pad_title(&mut self, title: impl Into<String>) {
        self.pad_title = title.into();
    }

    pub fn set_xy_title(&mut self, title: impl Into<String>) {
        self.xy_title = title.into();
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.x_value = x;
        self.y_value = y;
    }

    pub fn set_scale(&mut self, scale: i64) {
        self.scale = scale;
    }

    pub fn set_layout(&mut self, layout: u8) -> MozaicResult<()> {
        if layout > MAX_LAYOUT {
            return Err(MozaicError::InvalidLayout(layout));
        }
        self.layout = layout;
        Ok(())
    }

    /// GUI blob: zeroes with the layout byte at [`GUI_LAYOUT_OFFSET`].
    pub fn gui_bytes(&self) -> [u8; GUI_LEN] {
        let mut gui = [0u8; GUI_LEN];
        gui[GUI_LAYOUT_OFFSET] = self.layout;
        gui
    }

    /// The plugin state dictionary in the order Mozaic itself saves it.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (i, value) in self.au_values.iter().enumerate() {
            dict.insert(format!("AUVALUE{i}"), *value);
        }
        dict.insert("CODE", self.script.as_bytes());
        dict.insert("FILENAME", self.filename.as_str());
        dict.insert("GUI", &self.gui_bytes()[..]);
        for (i, label) in self.knob_labels.iter().enumerate() {
            dict.insert(format!("KNOBLABEL{i}"), label.as_str());
        }
        dict.insert("KNOBTITLE", self.knob_title.as_str());
        for (i, value) in self.knob_values.iter().enumerate() {
            dict.insert(format!("KNOBVALUE{i}"), *value);
        }
        dict.insert("PADTITLE", self.pad_title.as_str());
        dict.insert("SCALE", self.scale);
        for i in 0..VARIABLE_COUNT {
            dict.insert(format!("VARIABLE{i}"), vec![0u8; VARIABLE_LEN]);
        }
        dict.insert("XVALUE", self.x_value);
        dict.insert("XYTITLE", self.xy_title.as_str());
        dict.insert("YVALUE", self.y_value);
        dict.insert("data", Vec::<u8>::new());
        dict.insert("manufacturer", fourcc::MANUFACTURER);
        dict.insert("subtype", fourcc::SUBTYPE);
        dict.insert("type", fourcc::TYPE);
        dict.insert("version", DOCUMENT_VERSION);
        dict
    }

    /// Archive with the default archiver settings.
    pub fn encode(&self) -> MozaicResult<Vec<u8>> {
        self.encode_with(&Archiver::default())
    }

    pub fn encode_with(&self, archiver: &Archiver) -> MozaicResult<Vec<u8>> {
        Ok(archiver.archive(&self.to_dictionary())?)
    }

    /// Archive and write to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> MozaicResult<()> {
        self.write_with(path, &Archiver::default())
    }

    pub fn write_with(&self, path: impl AsRef<Path>, archiver: &Archiver) -> MozaicResult<()> {
        let path = path.as_ref();
        let envelope = archiver.encode(&self.to_dictionary())?;
        let file = File::create(path)?;
        envelope.write_to(BufWriter::new(file), &archiver.config().writer)?;
        info!(
            path = %path.display(),
            objects = envelope.object_count(),
            script_bytes = self.script.len(),
            "wrote mozaic document"
        );
        Ok(())
    }
}

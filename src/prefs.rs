//! Persisted user preferences.
//!
//! A flat `key=value` text file. Lines starting with `#` or `!` are comments;
//! the first `=` or `:` on a line separates key from value. Unknown keys are
//! kept and written back unchanged.
//!
//! Loading never fails: a missing or unreadable file leaves the defaults in
//! place. Saving reports errors so the caller can log them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const THEME: &str = "theme";
pub const WINDOW_WIDTH: &str = "window.width";
pub const WINDOW_HEIGHT: &str = "window.height";
pub const MIDI_DIRECTORY: &str = "midiDirectory";
pub const SOUND_FONT: &str = "soundFont";
pub const MEASURES: &str = "measures";
pub const BPM: &str = "bpm";

const DEFAULTS: [(&str, &str); 5] = [
    (THEME, "default.theme"),
    (WINDOW_WIDTH, "1000"),
    (WINDOW_HEIGHT, "800"),
    (MIDI_DIRECTORY, "midi"),
    (SOUND_FONT, "sf2/Windows.sf2"),
];

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("failed to write preferences to {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl Preferences {
    /// Defaults only, not tied to a file.
    pub fn new() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            path: None,
        }
    }

    /// Loads `path` over the defaults. Later saves go back to `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut prefs = match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                tracing::warn!("Using default preferences, could not read {:?}: {}", path, e);
                Self::new()
            }
        };
        prefs.path = Some(path.to_path_buf());
        prefs
    }

    /// Parses preference text over the defaults.
    pub fn parse(text: &str) -> Self {
        let mut prefs = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(split) = line.find(['=', ':']) else {
                continue;
            };
            let key = line[..split].trim();
            if !key.is_empty() {
                prefs.set(key, line[split + 1..].trim());
            }
        }
        prefs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Reads and parses a value. Missing or malformed values give `None`.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// File this set was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn to_text(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }

    /// Writes to the file the preferences were loaded from. Does nothing for
    /// preferences that never came from a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self) -> Result<(), PrefsError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), PrefsError> {
        let path = path.as_ref();
        fs::write(path, self.to_text()).map_err(|source| PrefsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new()
    }
}

//! Errors surfaced by the editor session.

use crate::midi::MidiImportError;
use crate::playback::PlaybackError;
use std::path::PathBuf;

/// Failures the user-visible layer has to report.
///
/// Editing operations never fail; only file and device boundaries do.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The bytes are not a usable MIDI file.
    #[error("invalid MIDI file: {0}")]
    Format(MidiImportError),

    /// No playback backend.
    #[error(transparent)]
    DeviceUnavailable(#[from] PlaybackError),

    /// A file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Saving failed; the song in memory is unchanged.
    #[error("failed to save {path:?}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<MidiImportError> for EditorError {
    fn from(e: MidiImportError) -> Self {
        match e {
            MidiImportError::Io(io) => EditorError::Io(io),
            other => EditorError::Format(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_errors_split_io_from_format() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            EditorError::from(MidiImportError::Io(io)),
            EditorError::Io(_)
        ));
        assert!(matches!(
            EditorError::from(MidiImportError::Parse("bad header".into())),
            EditorError::Format(_)
        ));
        assert!(matches!(
            EditorError::from(MidiImportError::Cancelled),
            EditorError::Format(MidiImportError::Cancelled)
        ));
    }

    #[test]
    fn test_messages() {
        let err = EditorError::from(PlaybackError::DeviceUnavailable("no synth".into()));
        assert_eq!(err.to_string(), "playback device unavailable: no synth");
    }
}

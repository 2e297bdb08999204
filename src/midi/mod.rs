//! Song data: notes, tracks, track types, and Standard MIDI File I/O.
//!
//! Everything here lives in the tick domain. Pixel geometry is derived on
//! demand by [`crate::edit::GridMapper`].

mod midi_export;
mod midi_import;
mod note;
mod song;
mod track;
mod track_type;

pub use midi_export::{export_to_bytes, export_to_midi};
pub use midi_import::{import_from_bytes, import_from_midi, ImportedSong, Importer, MidiImportError};
pub use note::{Note, NoteId, DEFAULT_VELOCITY, MIN_VELOCITY};
pub use song::Song;
pub use track::{Track, TrackId, DEFAULT_GRID_FRACTION, DEFAULT_TRACK_VOLUME};
pub use track_type::{
    DrumLane, TrackType, BASS_PROGRAMS, BASS_TUNING, DEFAULT_BASS_PROGRAM, DEFAULT_PROGRAM,
    DRUM_CHANNEL, DRUM_LANES, GUITAR_TUNING,
};

/// Note names within an octave, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Beats in a measure. 4/4 is the only meter.
pub const BEATS_PER_MEASURE: u32 = 4;

/// Ticks per quarter note for new songs.
pub const DEFAULT_RESOLUTION: u16 = 960;

/// Tempo for new songs and for files without a tempo event.
pub const DEFAULT_BPM: u32 = 120;

/// A song never has fewer measures than this.
pub const DEFAULT_MIN_MEASURES: u32 = 50;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Arguments
///
/// * `note` - MIDI note number (0-127)
///
/// # Returns
///
/// String representation like "C4" or "F#5"
///
/// # Examples
///
/// ```
/// use tabedit::midi::note_to_name;
///
/// assert_eq!(note_to_name(64), "E4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts ticks to seconds at a fixed tempo.
///
/// # Arguments
///
/// * `ticks` - Number of ticks
/// * `bpm` - Tempo in beats per minute
/// * `resolution` - Ticks per quarter note
pub fn ticks_to_seconds(ticks: u32, bpm: u32, resolution: u16) -> f64 {
    let beats = ticks as f64 / resolution.max(1) as f64;
    beats * 60.0 / bpm.max(1) as f64
}

/// Converts seconds to ticks at a fixed tempo, rounding down.
pub fn seconds_to_ticks(seconds: f64, bpm: u32, resolution: u16) -> u32 {
    let beats = seconds * bpm as f64 / 60.0;
    (beats * resolution as f64).max(0.0) as u32
}

/// General MIDI instrument family names, one per block of eight programs.
const INSTRUMENT_FAMILIES: [&str; 16] = [
    "Piano",
    "Chromatic Percussion",
    "Organ",
    "Guitar",
    "Bass",
    "Strings",
    "Ensemble",
    "Brass",
    "Reed",
    "Pipe",
    "Synth Lead",
    "Synth Pad",
    "Synth Effects",
    "Ethnic",
    "Percussive",
    "Sound Effects",
];

/// Display name of the instrument family a channel/program pair plays.
pub fn instrument_family(channel: u8, program: u8) -> &'static str {
    if channel == DRUM_CHANNEL {
        return "Drum Kit";
    }
    INSTRUMENT_FAMILIES[(program.min(127) / 8) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(40), "E2");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_tick_conversions() {
        // one beat at 120 BPM is half a second
        assert!((ticks_to_seconds(960, 120, 960) - 0.5).abs() < 1e-9);
        assert!((ticks_to_seconds(480, 60, 480) - 1.0).abs() < 1e-9);
        assert_eq!(seconds_to_ticks(0.5, 120, 960), 960);
    }

    #[test]
    fn test_instrument_family() {
        assert_eq!(instrument_family(0, 0), "Piano");
        assert_eq!(instrument_family(0, 25), "Guitar");
        assert_eq!(instrument_family(1, 33), "Bass");
        assert_eq!(instrument_family(9, 33), "Drum Kit");
        assert_eq!(instrument_family(0, 127), "Sound Effects");
    }
}

//! Standard MIDI File (SMF) import.
//!
//! Each source track is scanned in file order and rebuilt as one editor
//! [`Track`]. A source track only becomes a track if it carries a program
//! change, since that is what decides its [`TrackType`]; metadata-only tracks
//! (conductor tracks holding just a name and tempo) are dropped.
//!
//! # Limitations
//!
//! - Ticks keep the file's resolution; nothing is rescaled
//! - One global tempo: the last tempo event read wins, there is no tempo map
//! - Only controller 7 (channel volume) is applied; other controllers are ignored
//! - Pitch bend, aftertouch, SysEx and other events are parsed and ignored

use super::{Note, Song, Track, TrackType, DEFAULT_BPM, DEFAULT_MIN_MEASURES};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Controller number for channel volume.
const CC_CHANNEL_VOLUME: u8 = 7;

/// Volume of an imported track that never sets controller 7.
pub const IMPORTED_TRACK_VOLUME: u8 = 100;

/// Errors that can occur during MIDI import.
#[derive(Debug, thiserror::Error)]
pub enum MidiImportError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes are not a valid Standard MIDI File
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Valid file using timing the editor can't represent
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// The cancel flag was raised mid-import
    #[error("import cancelled")]
    Cancelled,
    /// File holds more events than the configured limit
    #[error("file has {events} events, limit is {limit}")]
    TooLarge { events: usize, limit: usize },
}

/// Everything read from a file, before it is turned into a [`Song`].
#[derive(Debug, Clone)]
pub struct ImportedSong {
    pub tracks: Vec<Track>,
    /// Tempo from the last tempo event, if the file had one.
    pub bpm: Option<u32>,
    /// Ticks per quarter note from the file header.
    pub resolution: u16,
    /// Tick of the last event in the longest track.
    pub tick_length: u32,
}

impl ImportedSong {
    /// Builds a song, filling in defaults for what the file didn't say.
    ///
    /// The measure count covers the whole file but never drops below
    /// `min_measures`. A file with no usable tracks yields one empty guitar
    /// track.
    pub fn into_song(self, name: impl Into<String>, min_measures: u32, default_bpm: u32) -> Song {
        let mut song = Song::new(name);
        song.bpm = self.bpm.unwrap_or(default_bpm);
        song.resolution = self.resolution;
        song.measure_count = (self.tick_length / song.ticks_per_measure().max(1)).max(min_measures);

        if self.tracks.is_empty() {
            song.create_track("Track 1");
        }
        for track in self.tracks {
            song.add_track(track);
        }
        song
    }
}

/// Configurable importer.
///
/// Import is synchronous, so long parses are bounded with a cancel flag that
/// another thread may raise, and an optional cap on the total event count.
#[derive(Debug, Clone, Default)]
pub struct Importer {
    cancel: Option<Arc<AtomicBool>>,
    event_limit: Option<usize>,
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the import with [`MidiImportError::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Rejects files holding more than `limit` events in total.
    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = Some(limit);
        self
    }

    /// Reads and imports a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportedSong, MidiImportError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let imported = self.import_bytes(&data)?;
        tracing::info!(
            "Imported {:?}: {} tracks, resolution {}, bpm {:?}",
            path,
            imported.tracks.len(),
            imported.resolution,
            imported.bpm
        );
        Ok(imported)
    }

    /// Imports an in-memory Standard MIDI File.
    pub fn import_bytes(&self, data: &[u8]) -> Result<ImportedSong, MidiImportError> {
        let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;

        let resolution = match smf.header.timing {
            Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
            Timing::Metrical(_) => {
                return Err(MidiImportError::UnsupportedFormat(
                    "zero ticks per quarter note".to_string(),
                ))
            }
            Timing::Timecode(_, _) => {
                return Err(MidiImportError::UnsupportedFormat(
                    "SMPTE timecode timing not supported".to_string(),
                ))
            }
        };

        if let Some(limit) = self.event_limit {
            let events: usize = smf.tracks.iter().map(Vec::len).sum();
            if events > limit {
                return Err(MidiImportError::TooLarge { events, limit });
            }
        }

        let mut imported = ImportedSong {
            tracks: Vec::new(),
            bpm: None,
            resolution,
            tick_length: 0,
        };

        for (track_idx, events) in smf.tracks.iter().enumerate() {
            let parsed = self.parse_track(events)?;
            if parsed.bpm.is_some() {
                imported.bpm = parsed.bpm;
            }
            imported.tick_length = imported.tick_length.max(parsed.end_tick);

            match parsed.into_track(track_idx) {
                Some(track) => imported.tracks.push(track),
                None => tracing::debug!("Skipping track {} with no program change", track_idx + 1),
            }
        }

        Ok(imported)
    }

    fn parse_track(&self, events: &[TrackEvent]) -> Result<ParsedTrack, MidiImportError> {
        let mut parsed = ParsedTrack::default();
        let mut current_tick: u32 = 0;

        for event in events {
            if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(MidiImportError::Cancelled);
            }
            current_tick = current_tick.saturating_add(event.delta.as_int());

            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name_bytes)) => {
                    parsed.name = Some(String::from_utf8_lossy(name_bytes).trim().to_string());
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    // microseconds per quarter note
                    let usec_per_beat = tempo.as_int();
                    if usec_per_beat > 0 {
                        parsed.bpm = Some(60_000_000 / usec_per_beat);
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    parsed.handle_message(channel.as_int(), message, current_tick);
                }
                _ => {}
            }
        }

        parsed.end_tick = current_tick;
        Ok(parsed)
    }
}

/// Per-track scan state.
#[derive(Debug, Default)]
struct ParsedTrack {
    name: Option<String>,
    /// (channel, program) from the last program change.
    instrument: Option<(u8, u8)>,
    volume: Option<u8>,
    bpm: Option<u32>,
    notes: Vec<Note>,
    /// Open notes per pitch, most recently opened last.
    open: HashMap<u8, Vec<(u32, u8)>>,
    end_tick: u32,
}

impl ParsedTrack {
    fn handle_message(&mut self, channel: u8, message: MidiMessage, tick: u32) {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                self.open
                    .entry(key.as_int())
                    .or_default()
                    .push((tick, vel.as_int()));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                self.close_note(key.as_int(), tick);
            }
            MidiMessage::ProgramChange { program } => {
                self.instrument = Some((channel, program.as_int()));
            }
            MidiMessage::Controller { controller, value } => {
                if controller.as_int() == CC_CHANNEL_VOLUME {
                    self.volume = Some(value.as_int());
                }
            }
            _ => {}
        }
    }

    /// Pairs a note-off with the most recently opened note of the same pitch.
    /// A note-off with nothing open is dropped.
    fn close_note(&mut self, pitch: u8, tick: u32) {
        let Some((start, velocity)) = self.open.get_mut(&pitch).and_then(Vec::pop) else {
            return;
        };
        let duration = tick.saturating_sub(start).max(1);
        self.notes.push(Note::new(pitch, velocity, start, duration));
    }

    /// Builds the editor track, or `None` if no program change was seen.
    /// Notes still open at the end of the track are discarded.
    fn into_track(self, track_idx: usize) -> Option<Track> {
        let (channel, program) = self.instrument?;
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Track {}", track_idx + 1));

        let mut track = Track::new(name, channel);
        track.program = program;
        track.volume = self.volume.unwrap_or(IMPORTED_TRACK_VOLUME);
        track.set_track_type(TrackType::classify(channel, program), channel);
        for note in self.notes {
            track.load_note(note);
        }
        Some(track)
    }
}

/// Imports an in-memory file with default settings.
///
/// # Errors
///
/// Returns error if the bytes are not a usable Standard MIDI File
pub fn import_from_bytes(data: &[u8], name: impl Into<String>) -> Result<Song, MidiImportError> {
    Ok(Importer::new()
        .import_bytes(data)?
        .into_song(name, DEFAULT_MIN_MEASURES, DEFAULT_BPM))
}

/// Imports a MIDI file and creates a Song named after the file.
///
/// # Arguments
///
/// * `path` - Path to the .mid or .midi file
///
/// # Errors
///
/// Returns error if file cannot be read or parsed
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<Song, MidiImportError> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported MIDI")
        .to_string();
    Ok(Importer::new()
        .import_file(path)?
        .into_song(name, DEFAULT_MIN_MEASURES, DEFAULT_BPM))
}

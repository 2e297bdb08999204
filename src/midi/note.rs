//! Tablature note representation.
//!
//! A note is a single matched note-on/note-off pair. The tick-domain fields
//! (`pitch`, `velocity`, `start`, `duration`) are the source of truth; the
//! fretboard position is kept alongside and only ever rewritten together with
//! the pitch. Pixel geometry is never stored here, see
//! [`GridMapper::note_rect`](crate::edit::GridMapper::note_rect).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique note IDs.
static NOTE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a note.
///
/// Selections hold note IDs, so two notes with identical pitch and timing are
/// still distinct members of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(u64);

impl NoteId {
    /// Generates a new unique note ID.
    pub fn new() -> Self {
        Self(NOTE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest velocity a note can hold. A note-on with velocity 0 is a note-off
/// on the wire, so notes never go below this.
pub const MIN_VELOCITY: u8 = 1;

/// Default velocity for notes created by clicking on the grid.
pub const DEFAULT_VELOCITY: u8 = 100;

/// A single note on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for this note instance.
    pub id: NoteId,

    /// MIDI note number (0-127).
    pub pitch: u8,

    /// Note velocity (1-127).
    pub velocity: u8,

    /// Absolute start tick.
    pub start: u32,

    /// Length in ticks. Zero only while a freshly clicked note is being drawn.
    pub duration: u32,

    /// Lane (string or drum voice) the note sits on. Lane 0 is the top line.
    pub string_num: usize,

    /// Offset from the lane's open pitch. Always 0 on drum tracks.
    pub fret: u8,

    /// Mirrors membership in the owning track's selection.
    pub is_selected: bool,

    /// Set on notes that came out of the clipboard.
    pub from_clipboard: bool,
}

impl Note {
    /// Creates a new note with a fresh ID, sitting on lane 0 until a track
    /// type assigns its string and fret.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabedit::midi::Note;
    ///
    /// let note = Note::new(64, 100, 0, 480);
    /// assert_eq!(note.end_tick(), 480);
    /// ```
    pub fn new(pitch: u8, velocity: u8, start: u32, duration: u32) -> Self {
        Self {
            id: NoteId::new(),
            pitch: pitch.min(127),
            velocity: velocity.clamp(MIN_VELOCITY, 127),
            start,
            duration,
            string_num: 0,
            fret: 0,
            is_selected: false,
            from_clipboard: false,
        }
    }

    /// Returns the tick at which the note stops sounding.
    pub fn end_tick(&self) -> u32 {
        self.start.saturating_add(self.duration)
    }

    /// Creates a copy of this note with a new unique ID, unselected and
    /// tagged as clipboard content.
    pub fn duplicate(&self) -> Self {
        Self {
            id: NoteId::new(),
            is_selected: false,
            from_clipboard: true,
            ..self.clone()
        }
    }
}

//! Track representation and note editing.
//!
//! A track owns its notes, its instrument assignment, and the current
//! selection. The note list is kept in z-order rather than time order: the
//! most recently touched note is moved to the end so it draws on top.
//!
//! Edits that change what is on screen take the track's [`GridMapper`] and a
//! [`RenderSurface`] so they can report the old and new boxes of every note
//! they touch.

use super::note::{Note, NoteId, DEFAULT_VELOCITY, MIN_VELOCITY};
use super::track_type::{
    TrackType, BASS_PROGRAMS, DEFAULT_BASS_PROGRAM, DEFAULT_PROGRAM, DRUM_CHANNEL,
};
use crate::edit::{DragState, GridMapper, Point, Selection};
use crate::render::RenderSurface;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique track IDs.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a track within a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(u64);

impl TrackId {
    /// Generates a new unique track ID.
    pub fn new() -> Self {
        Self(TRACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Default snapping granularity: eighth notes.
pub const DEFAULT_GRID_FRACTION: f64 = 0.125;

/// Volume given to tracks created in the editor.
pub const DEFAULT_TRACK_VOLUME: u8 = 127;

/// A single instrument track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier for this track.
    pub id: TrackId,

    /// Human-readable name for the track.
    pub name: String,

    /// MIDI channel (0-15).
    pub channel: u8,

    /// MIDI program number (0-127).
    pub program: u8,

    /// Channel volume (0-127).
    pub volume: u8,

    /// Muted tracks are left out of full playback.
    pub muted: bool,

    /// Snapping granularity as a fraction of one measure.
    pub grid_fraction: f64,

    track_type: TrackType,

    /// Notes in z-order (last drawn on top).
    pub(crate) notes: Vec<Note>,

    #[serde(skip)]
    pub(crate) selection: Selection,

    #[serde(skip)]
    pub(crate) drag: DragState,
}

impl Track {
    /// Creates an empty guitar track.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name for the track
    /// * `channel` - MIDI channel (0-15)
    pub fn new(name: impl Into<String>, channel: u8) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            channel: channel.min(15),
            program: DEFAULT_PROGRAM,
            volume: DEFAULT_TRACK_VOLUME,
            muted: false,
            grid_fraction: DEFAULT_GRID_FRACTION,
            track_type: TrackType::Guitar,
            notes: Vec::new(),
            selection: Selection::new(),
            drag: DragState::Idle,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Changes the track type and re-derives every note's lane and fret from
    /// its pitch.
    ///
    /// Channel and program move with the type so that
    /// [`TrackType::classify`] gives the same type back: drums go to the
    /// percussion channel, bass gets a bass program, guitar drops one. A
    /// track leaving the percussion channel moves to `melodic_channel`.
    pub fn set_track_type(&mut self, track_type: TrackType, melodic_channel: u8) {
        match track_type {
            TrackType::Drums => self.channel = DRUM_CHANNEL,
            TrackType::Bass if !BASS_PROGRAMS.contains(&self.program) => {
                self.program = DEFAULT_BASS_PROGRAM;
            }
            TrackType::Guitar if BASS_PROGRAMS.contains(&self.program) => {
                self.program = DEFAULT_PROGRAM;
            }
            _ => {}
        }
        if track_type != TrackType::Drums && self.channel == DRUM_CHANNEL {
            self.channel = melodic_channel.min(15);
        }
        self.relayout(track_type);
    }

    /// Assigns a program. A drum kit routes the track to the percussion
    /// channel; any other instrument takes it off that channel onto
    /// `melodic_channel`. The track type then follows channel and program.
    pub fn set_instrument(&mut self, program: u8, drum_kit: bool, melodic_channel: u8) {
        self.program = program.min(127);
        if drum_kit {
            self.channel = DRUM_CHANNEL;
        } else if self.channel == DRUM_CHANNEL {
            self.channel = melodic_channel.min(15);
        }
        self.relayout(TrackType::classify(self.channel, self.program));
    }

    fn relayout(&mut self, track_type: TrackType) {
        self.track_type = track_type;
        for note in &mut self.notes {
            track_type.assign_string_and_fret(note);
        }
    }

    /// Adds a note on top of the others, assigning its lane and fret.
    pub fn load_note(&mut self, mut note: Note) -> NoteId {
        self.track_type.assign_string_and_fret(&mut note);
        let id = note.id;
        self.notes.push(note);
        id
    }

    /// Removes a note, evicting it from the selection.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id == id)?;
        self.selection.remove(id);
        Some(self.notes.remove(pos))
    }

    pub fn get_note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub(crate) fn get_note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Returns all notes in z-order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Returns the end tick of the last-ending note.
    pub fn duration_ticks(&self) -> u32 {
        self.notes.iter().map(|n| n.end_tick()).max().unwrap_or(0)
    }

    /// Toggles mute and returns the new state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Volume on the 0-100 scale used by the volume field.
    pub fn volume_percent(&self) -> u8 {
        (self.volume as u32 * 100 / 127) as u8
    }

    pub fn set_volume_percent(&mut self, percent: u8) {
        self.volume = (percent.min(100) as u32 * 127 / 100) as u8;
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected notes, in selection order.
    pub fn selected_notes(&self) -> impl Iterator<Item = &Note> {
        self.selection.ids().iter().filter_map(|&id| self.get_note(id))
    }

    /// Current drag behavior.
    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    /// Topmost note under `point`.
    pub fn hit_test(&self, point: Point, grid: &GridMapper) -> Option<NoteId> {
        self.notes
            .iter()
            .rev()
            .find(|n| grid.note_rect(n, self.track_type).contains(point))
            .map(|n| n.id)
    }

    fn redraw(&self, id: NoteId, grid: &GridMapper, surface: &mut dyn RenderSurface) {
        if let Some(note) = self.get_note(id) {
            surface.note_changed(self.id, grid.note_rect(note, self.track_type));
        }
    }

    fn bring_to_front(&mut self, id: NoteId) {
        if let Some(pos) = self.notes.iter().position(|n| n.id == id) {
            let note = self.notes.remove(pos);
            self.notes.push(note);
        }
    }

    /// Adds a note to the selection and brings it to the front.
    pub fn select_note(&mut self, id: NoteId, grid: &GridMapper, surface: &mut dyn RenderSurface) {
        let Some(note) = self.get_note_mut(id) else {
            return;
        };
        note.is_selected = true;
        self.bring_to_front(id);
        self.selection.insert(id);
        self.redraw(id, grid, surface);
    }

    pub fn clear_selection(&mut self, grid: &GridMapper, surface: &mut dyn RenderSurface) {
        for id in self.selection.clear() {
            if let Some(note) = self.get_note_mut(id) {
                note.is_selected = false;
            }
            self.redraw(id, grid, surface);
        }
    }

    /// Selects every note whose box intersects `rect`, replacing the current
    /// selection unless `additive`.
    pub fn select_in_rect(
        &mut self,
        rect: crate::edit::NoteRect,
        additive: bool,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        if !additive {
            self.clear_selection(grid, surface);
        }
        let hits: Vec<NoteId> = self
            .notes
            .iter()
            .rev()
            .filter(|n| grid.note_rect(n, self.track_type).intersects(&rect))
            .map(|n| n.id)
            .collect();
        for id in hits {
            self.select_note(id, grid, surface);
        }
    }

    /// Deletes the selected notes. Returns how many were removed.
    pub fn delete_selected_notes(
        &mut self,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> usize {
        self.cut_selected_notes(grid, surface).len()
    }

    /// Removes the selected notes and hands them back.
    pub fn cut_selected_notes(
        &mut self,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> Vec<Note> {
        let mut cut = Vec::with_capacity(self.selection.len());
        for id in self.selection.clear() {
            self.redraw(id, grid, surface);
            if let Some(mut note) = self.remove_note(id) {
                note.is_selected = false;
                note.from_clipboard = true;
                cut.push(note);
            }
        }
        cut
    }

    /// Clones the selected notes with fresh IDs, tagged as clipboard content.
    pub fn copy_selected_notes(&self) -> Vec<Note> {
        self.selected_notes().map(Note::duplicate).collect()
    }

    /// Inserts clones of `clipboard` at their original positions and selects
    /// them in place of the current selection.
    pub fn paste_notes(
        &mut self,
        clipboard: &[Note],
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        if clipboard.is_empty() {
            return;
        }
        self.clear_selection(grid, surface);
        for note in clipboard {
            let id = self.load_note(note.duplicate());
            self.select_note(id, grid, surface);
        }
    }

    /// Copies the selection and pastes it in place, leaving the copies selected.
    pub fn duplicate_selection(&mut self, grid: &GridMapper, surface: &mut dyn RenderSurface) {
        let copies = self.copy_selected_notes();
        self.paste_notes(&copies, grid, surface);
    }

    /// Moves every selected note by whole grid units and lanes.
    ///
    /// The block moves as a whole: leftward motion is limited so no note
    /// passes the start of the track (a note inside the first grid unit blocks
    /// it entirely), and the lane delta is clamped so every note stays on the
    /// fretboard. Notes that change lane keep their fret and take the pitch
    /// that fret produces on the new lane.
    ///
    /// Returns false if nothing moved.
    pub fn move_selected_notes(
        &mut self,
        grid_units: i64,
        lanes: i64,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        let ticks_per_grid = grid.ticks_per_grid() as i64;
        let last_lane = self.track_type.num_strings() as i64 - 1;

        let mut min_start = i64::MAX;
        let mut min_lane = i64::MAX;
        let mut max_lane = i64::MIN;
        for note in self.selected_notes() {
            min_start = min_start.min(note.start as i64);
            min_lane = min_lane.min(note.string_num as i64);
            max_lane = max_lane.max(note.string_num as i64);
        }
        if min_start == i64::MAX {
            return false;
        }

        let grid_units = grid_units.max(-(min_start / ticks_per_grid));
        let lanes = lanes.clamp(-min_lane, (last_lane - max_lane).max(0));
        if grid_units == 0 && lanes == 0 {
            return false;
        }

        let track_type = self.track_type;
        let tick_delta = grid_units * ticks_per_grid;
        for id in self.selection.ids().to_vec() {
            self.redraw(id, grid, surface);
            if let Some(note) = self.get_note_mut(id) {
                note.start = (note.start as i64 + tick_delta).clamp(0, u32::MAX as i64) as u32;
                if lanes != 0 {
                    note.string_num = (note.string_num as i64 + lanes) as usize;
                    note.pitch = track_type.find_note_pitch(note.string_num, note.fret);
                }
            }
            self.redraw(id, grid, surface);
        }
        true
    }

    /// Arrow-key nudge: one grid unit horizontally or one lane vertically.
    pub fn nudge_selection(
        &mut self,
        dir_x: i32,
        dir_y: i32,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        self.move_selected_notes(dir_x.signum() as i64, dir_y.signum() as i64, grid, surface)
    }

    /// Sets the fret of the single selected note and recomputes its pitch.
    ///
    /// Does nothing unless exactly one note is selected, or on drum tracks.
    /// Returns true if the note changed.
    pub fn retype_fret(
        &mut self,
        fret: u8,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        if self.track_type == TrackType::Drums {
            return false;
        }
        let Some(id) = self.selection.single() else {
            return false;
        };
        let track_type = self.track_type;
        self.redraw(id, grid, surface);
        if let Some(note) = self.get_note_mut(id) {
            note.fret = fret;
            note.pitch = track_type.find_note_pitch(note.string_num, fret);
        }
        self.redraw(id, grid, surface);
        true
    }

    /// Selects the note after the current single selection in time order,
    /// wrapping around. With no single selection, selects the earliest note.
    pub fn select_next_note(
        &mut self,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> Option<NoteId> {
        let mut order: Vec<(u32, usize, NoteId)> = self
            .notes
            .iter()
            .map(|n| (n.start, n.string_num, n.id))
            .collect();
        order.sort();

        let next = match self.selection.single() {
            Some(current) => {
                let pos = order.iter().position(|&(_, _, id)| id == current)?;
                order.get((pos + 1) % order.len())
            }
            None => order.first(),
        }
        .map(|&(_, _, id)| id)?;

        self.clear_selection(grid, surface);
        self.select_note(next, grid, surface);
        Some(next)
    }

    /// Shifts every note starting at or after `at` right by `length` ticks.
    pub fn insert_ticks(&mut self, at: u32, length: u32) {
        for note in self.notes.iter_mut().filter(|n| n.start >= at) {
            note.start = note.start.saturating_add(length);
        }
    }

    /// Deletes notes starting in `start..end` and pulls later notes left by
    /// the removed length. Returns how many notes were deleted.
    pub fn remove_ticks(&mut self, start: u32, end: u32) -> usize {
        let doomed: Vec<NoteId> = self
            .notes
            .iter()
            .filter(|n| n.start >= start && n.start < end)
            .map(|n| n.id)
            .collect();
        for &id in &doomed {
            self.remove_note(id);
        }
        let length = end.saturating_sub(start);
        for note in self.notes.iter_mut().filter(|n| n.start >= end) {
            note.start -= length;
        }
        doomed.len()
    }

    /// A copy of this track holding only the selected notes, for auditioning.
    pub fn audition_track(&self) -> Option<Track> {
        if self.selection.is_empty() {
            return None;
        }
        Some(Track {
            notes: self.selected_notes().cloned().collect(),
            selection: Selection::new(),
            drag: DragState::Idle,
            ..self.clone()
        })
    }

    /// Creates a note at the grid cell under `point` on fret 0.
    ///
    /// Guitar and bass notes start with zero length and are expected to be
    /// stretched by a drag; drum hits get one grid unit.
    pub(crate) fn add_note_at(&mut self, point: Point, grid: &GridMapper) -> NoteId {
        let string_num = grid.y_to_lane(point.y, self.track_type.num_strings());
        let duration = match self.track_type {
            TrackType::Drums => grid.ticks_per_grid(),
            _ => 0,
        };
        let mut note = Note::new(
            self.track_type.find_note_pitch(string_num, 0),
            DEFAULT_VELOCITY,
            grid.x_to_snapped_tick(point.x),
            duration,
        );
        note.string_num = string_num;
        let id = note.id;
        self.notes.push(note);
        id
    }

    /// Stretches a note so its right edge follows the snapped cursor, never
    /// narrower than `min_width` pixels.
    pub(crate) fn lengthen_note(
        &mut self,
        id: NoteId,
        x: f64,
        min_width: f64,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        self.redraw(id, grid, surface);
        if let Some(note) = self.get_note_mut(id) {
            let note_x = grid.tick_to_x(note.start);
            let width = min_width.max(grid.snap_x(x) - note_x);
            note.duration = grid.width_to_duration(width);
        }
        self.redraw(id, grid, surface);
    }

    pub(crate) fn set_note_velocity(
        &mut self,
        id: NoteId,
        velocity: u8,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        if let Some(note) = self.get_note_mut(id) {
            note.velocity = velocity.clamp(MIN_VELOCITY, 127);
        }
        self.redraw(id, grid, surface);
    }

    pub(crate) fn discard_note(
        &mut self,
        id: NoteId,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> Option<Note> {
        self.redraw(id, grid, surface);
        self.remove_note(id)
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new("Track 1", 0)
    }
}

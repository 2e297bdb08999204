//! The editor session.
//!
//! An [`EditorSession`] is the single owner of everything that used to be
//! ambient: the song, which track is active, the clipboard, the zoom level
//! (measure size), the horizontal scroll offset, the playback clock and the
//! render surface. Front ends create one at startup and route every input
//! event through it.

use crate::edit::{GridMapper, LaneLayout, PointerEvent, PointerOutcome};
use crate::error::EditorError;
use crate::midi::{
    export_to_bytes, export_to_midi, Importer, Note, NoteId, Song, Track, TrackId, TrackType,
    DEFAULT_BPM, DEFAULT_GRID_FRACTION, DEFAULT_MIN_MEASURES, DEFAULT_RESOLUTION,
};
use crate::playback::{PlaybackClock, PlaybackState};
use crate::prefs::{self, Preferences};
use crate::render::RenderSurface;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest grid fraction the editor accepts (1/64 of a measure).
const MIN_GRID_FRACTION: f64 = 1.0 / 64.0;

/// Share of the viewport a single measure may take at most.
const MAX_MEASURE_SHARE: f64 = 0.8;

/// Session-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// A song never shows fewer measures than this.
    pub min_measures: u32,
    /// Tempo for new songs and files without a tempo event.
    pub default_bpm: u32,
    /// Resolution for new songs.
    pub default_resolution: u16,
    /// Initial pixels per measure.
    pub measure_size: f64,
    pub min_measure_size: f64,
    /// Width of the visible part of the tracks, in pixels.
    pub viewport_width: f64,
    pub layout: LaneLayout,
    /// How often a front end should call [`EditorSession::poll_playback`].
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_measures: DEFAULT_MIN_MEASURES,
            default_bpm: DEFAULT_BPM,
            default_resolution: DEFAULT_RESOLUTION,
            measure_size: 150.0,
            min_measure_size: 50.0,
            viewport_width: 1000.0,
            layout: LaneLayout::default(),
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl SessionConfig {
    /// Defaults with `measures` and `bpm` taken from preferences when they
    /// parse as positive numbers.
    pub fn from_preferences(prefs: &Preferences) -> Self {
        let mut config = Self::default();
        if let Some(measures) = prefs.get_parsed::<u32>(prefs::MEASURES).filter(|&m| m > 0) {
            config.min_measures = measures;
        }
        if let Some(bpm) = prefs.get_parsed::<u32>(prefs::BPM).filter(|&b| b > 0) {
            config.default_bpm = bpm;
        }
        config
    }
}

/// Editor state for one open song.
pub struct EditorSession<C: PlaybackClock, R: RenderSurface> {
    song: Song,
    active_track: Option<TrackId>,
    clipboard: Vec<Note>,
    measure_size: f64,
    scroll_offset: f64,
    playback: PlaybackState,
    current_file: Option<PathBuf>,
    importer: Importer,
    config: SessionConfig,
    prefs: Preferences,
    clock: C,
    surface: R,
}

impl<C: PlaybackClock, R: RenderSurface> EditorSession<C, R> {
    /// Creates a session holding one empty guitar track.
    pub fn new(config: SessionConfig, prefs: Preferences, clock: C, surface: R) -> Self {
        let mut session = Self {
            song: Song::new("Untitled"),
            active_track: None,
            clipboard: Vec::new(),
            measure_size: config.measure_size,
            scroll_offset: 0.0,
            playback: PlaybackState::Stopped,
            current_file: None,
            importer: Importer::new(),
            config,
            prefs,
            clock,
            surface,
        };
        session.reset_to_default();
        session
    }

    /// Creates a session configured from `prefs`.
    pub fn from_preferences(prefs: Preferences, clock: C, surface: R) -> Self {
        let config = SessionConfig::from_preferences(&prefs);
        Self::new(config, prefs, clock, surface)
    }

    /// Replaces the importer used by loads (cancel flag, event limit).
    pub fn set_importer(&mut self, importer: Importer) {
        self.importer = importer;
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.prefs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn clipboard(&self) -> &[Note] {
        &self.clipboard
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn measure_size(&self) -> f64 {
        self.measure_size
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn active_track_id(&self) -> Option<TrackId> {
        self.active_track
    }

    pub fn active_track(&self) -> Option<&Track> {
        self.song.get_track(self.active_track?)
    }

    /// Mutable access for per-track settings (name, mute, volume, program).
    pub fn active_track_mut(&mut self) -> Option<&mut Track> {
        self.song.get_track_mut(self.active_track?)
    }

    /// Geometry for `track` at the current zoom level.
    pub fn grid_for(&self, track: &Track) -> GridMapper {
        GridMapper::new(
            self.measure_size,
            self.song.resolution,
            track.grid_fraction,
            self.config.layout,
        )
    }

    /// Runs `f` on the active track with its geometry and the render surface.
    fn with_active<T>(
        &mut self,
        f: impl FnOnce(&mut Track, &GridMapper, &mut dyn RenderSurface) -> T,
    ) -> Option<T> {
        let id = self.active_track?;
        let resolution = self.song.resolution;
        let track = self.song.get_track_mut(id)?;
        let grid = GridMapper::new(
            self.measure_size,
            resolution,
            track.grid_fraction,
            self.config.layout,
        );
        Some(f(track, &grid, &mut self.surface))
    }

    // ==================== Files ====================

    /// Replaces the song with a single empty guitar track.
    fn reset_to_default(&mut self) {
        let mut song = Song::with_default_track("Untitled");
        song.bpm = self.config.default_bpm;
        song.resolution = self.config.default_resolution;
        song.measure_count = self.config.min_measures;
        self.install_song(song);
    }

    fn install_song(&mut self, song: Song) {
        self.song = song;
        self.active_track = self.song.tracks().first().map(|t| t.id);
        self.scroll_offset = 0.0;
        self.surface.track_list_changed();
        self.surface.repaint();
    }

    /// Loads a Standard MIDI File from memory.
    ///
    /// All or nothing: on failure the session is reset to one empty track
    /// and the error is returned for display.
    pub fn load_bytes(&mut self, data: &[u8], name: &str) -> Result<(), EditorError> {
        self.stop();
        match self.importer.import_bytes(data) {
            Ok(imported) => {
                let song =
                    imported.into_song(name, self.config.min_measures, self.config.default_bpm);
                tracing::info!(
                    "Loaded {}: {} tracks, {} bpm, {} measures",
                    name,
                    song.track_count(),
                    song.bpm,
                    song.measure_count
                );
                self.install_song(song);
                Ok(())
            }
            Err(e) => {
                tracing::error!("MIDI import of {} failed: {}", name, e);
                self.reset_to_default();
                Err(e.into())
            }
        }
    }

    /// Loads a Standard MIDI File and remembers its directory.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EditorError> {
        let path = path.as_ref();
        self.stop();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Imported MIDI")
            .to_string();

        match self.importer.import_file(path) {
            Ok(imported) => {
                let song =
                    imported.into_song(name, self.config.min_measures, self.config.default_bpm);
                self.install_song(song);
                self.current_file = Some(path.to_path_buf());
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    self.prefs
                        .set(prefs::MIDI_DIRECTORY, dir.to_string_lossy().into_owned());
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load {:?}: {}", path, e);
                self.current_file = None;
                self.reset_to_default();
                Err(e.into())
            }
        }
    }

    /// Writes the song as a Standard MIDI File.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Export`] if the file cannot be written; the
    /// song in memory is untouched.
    pub fn save_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EditorError> {
        let path = path.as_ref();
        export_to_midi(&self.song, path).map_err(|source| {
            tracing::error!("MIDI export to {:?} failed: {}", path, source);
            EditorError::Export {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::info!("Saved {:?}", path);
        self.current_file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn export_bytes(&self) -> Vec<u8> {
        export_to_bytes(&self.song)
    }

    /// Saves preferences, logging instead of failing.
    pub fn save_preferences(&self) {
        if let Err(e) = self.prefs.save() {
            tracing::warn!("Could not save preferences: {}", e);
        }
    }

    // ==================== Tracks ====================

    /// Adds an empty guitar track and makes it active.
    pub fn add_track(&mut self, name: impl Into<String>) -> TrackId {
        let id = self.song.create_track(name);
        self.select_track(id);
        self.surface.track_list_changed();
        id
    }

    /// Removes the active track. The last track is replaced by an empty one.
    pub fn remove_active_track(&mut self) -> Option<Track> {
        let removed = self.song.remove_track(self.active_track?)?;
        if self.song.track_count() == 0 {
            self.song.create_track("Track 1");
        }
        self.active_track = self.song.tracks().first().map(|t| t.id);
        self.surface.track_list_changed();
        self.surface.repaint();
        Some(removed)
    }

    /// Makes `id` the active track, clearing the previous track's selection.
    pub fn select_track(&mut self, id: TrackId) -> bool {
        if self.song.get_track(id).is_none() {
            return false;
        }
        if self.active_track != Some(id) {
            self.with_active(|track, grid, surface| track.clear_selection(grid, surface));
            self.active_track = Some(id);
        }
        true
    }

    /// Changes the active track's type. Channel and program follow so the
    /// track keeps its type through export and re-import.
    pub fn set_track_type(&mut self, track_type: TrackType) {
        let Some(id) = self.active_track else {
            return;
        };
        let melodic_channel = self.song.free_channel(id);
        self.with_active(|track, _, surface| {
            track.set_track_type(track_type, melodic_channel);
            surface.repaint();
        });
    }

    /// Assigns an instrument to the active track. Picking a drum kit moves
    /// the track to the percussion channel; the track type follows.
    pub fn set_instrument(&mut self, program: u8, drum_kit: bool) {
        let Some(id) = self.active_track else {
            return;
        };
        let melodic_channel = self.song.free_channel(id);
        self.with_active(|track, _, surface| {
            track.set_instrument(program, drum_kit, melodic_channel);
            surface.repaint();
        });
        self.surface.track_list_changed();
    }

    /// Changes the active track's snapping granularity. Existing notes stay
    /// where they are.
    pub fn set_grid_fraction(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(MIN_GRID_FRACTION, 1.0)
        } else {
            DEFAULT_GRID_FRACTION
        };
        if let Some(track) = self.active_track_mut() {
            track.grid_fraction = fraction;
        }
    }

    // ==================== View ====================

    /// Sets pixels per measure, clamped between the configured minimum and
    /// 80% of the viewport.
    pub fn set_measure_size(&mut self, measure_size: f64) {
        let max = (self.config.viewport_width * MAX_MEASURE_SHARE).max(self.config.min_measure_size);
        let measure_size = if measure_size.is_finite() {
            measure_size
        } else {
            self.config.measure_size
        };
        self.measure_size = measure_size.clamp(self.config.min_measure_size, max);
        self.surface.repaint();
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.config.viewport_width = width.max(0.0);
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset.max(0.0);
        self.surface.repaint();
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.song.bpm = bpm.max(1);
    }

    // ==================== Editing ====================

    pub fn pointer_down(&mut self, event: PointerEvent) {
        self.with_active(|track, grid, surface| track.pointer_down(event, grid, surface));
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        self.with_active(|track, grid, surface| track.pointer_move(event, grid, surface));
    }

    /// Ends a drag and auditions the edited notes when the drag asks for it.
    pub fn pointer_up(&mut self, event: PointerEvent) -> PointerOutcome {
        let outcome = self
            .with_active(|track, grid, surface| track.pointer_up(event, grid, surface))
            .unwrap_or(PointerOutcome::None);
        if outcome == PointerOutcome::Audition {
            self.audition();
        }
        outcome
    }

    pub fn delete_selection(&mut self) -> usize {
        self.with_active(|track, grid, surface| track.delete_selected_notes(grid, surface))
            .unwrap_or(0)
    }

    /// Moves the selection to the clipboard.
    pub fn cut_selection(&mut self) -> usize {
        let Some(cut) =
            self.with_active(|track, grid, surface| track.cut_selected_notes(grid, surface))
        else {
            return 0;
        };
        if !cut.is_empty() {
            self.clipboard = cut;
        }
        self.clipboard.len()
    }

    pub fn copy_selection(&mut self) -> usize {
        let copied = self
            .active_track()
            .map(Track::copy_selected_notes)
            .unwrap_or_default();
        if !copied.is_empty() {
            self.clipboard = copied;
        }
        self.clipboard.len()
    }

    /// Pastes the clipboard into the active track at the original positions.
    pub fn paste(&mut self) {
        let clipboard = self.clipboard.clone();
        self.with_active(|track, grid, surface| track.paste_notes(&clipboard, grid, surface));
    }

    /// Arrow-key nudge by one grid unit or one lane.
    pub fn nudge(&mut self, dir_x: i32, dir_y: i32) -> bool {
        self.with_active(|track, grid, surface| track.nudge_selection(dir_x, dir_y, grid, surface))
            .unwrap_or(false)
    }

    /// Sets the fret of the single selected note and plays it.
    pub fn type_fret(&mut self, fret: u8) -> bool {
        let changed = self
            .with_active(|track, grid, surface| track.retype_fret(fret, grid, surface))
            .unwrap_or(false);
        if changed {
            self.audition();
        }
        changed
    }

    pub fn select_next_note(&mut self) -> Option<NoteId> {
        self.with_active(|track, grid, surface| track.select_next_note(grid, surface))
            .flatten()
    }

    /// Inserts `count` empty measures before the 1-based `before_measure`.
    pub fn insert_bars(&mut self, count: u32, before_measure: u32, all_tracks: bool) {
        if count == 0 {
            return;
        }
        let at = self.song.measure_start_tick(before_measure.max(1));
        let length = count.saturating_mul(self.song.ticks_per_measure());
        let active = self.active_track;
        for track in self.song.tracks_mut() {
            if all_tracks || Some(track.id) == active {
                track.insert_ticks(at, length);
            }
        }
        self.song.measure_count = self.song.measure_count.saturating_add(count);
        self.surface.repaint();
    }

    /// Removes measures `first..=last` (1-based). Notes starting inside are
    /// deleted and later notes move left. Returns how many notes were deleted.
    pub fn remove_bars(&mut self, first: u32, last: u32, all_tracks: bool) -> usize {
        if first == 0 || first > last {
            return 0;
        }
        let start = self.song.measure_start_tick(first);
        let end = self.song.measure_start_tick(last.saturating_add(1));
        let active = self.active_track;
        let mut removed = 0;
        for track in self.song.tracks_mut() {
            if all_tracks || Some(track.id) == active {
                removed += track.remove_ticks(start, end);
            }
        }
        if all_tracks {
            self.song.measure_count = self
                .song
                .measure_count
                .saturating_sub(last - first + 1)
                .max(self.config.min_measures);
        }
        self.surface.repaint();
        removed
    }

    // ==================== Playback ====================

    /// Plays every unmuted track from the start of a 1-based measure and
    /// scrolls that measure into view.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::DeviceUnavailable`] if the clock can't start
    pub fn play_all(&mut self, start_measure: u32) -> Result<(), EditorError> {
        let start_measure = start_measure.max(1);
        let tracks: Vec<Track> = self.song.playable_tracks().cloned().collect();
        let start_tick = self.song.measure_start_tick(start_measure);
        self.start_clock(&tracks, start_tick)?;
        self.set_scroll_offset((start_measure - 1) as f64 * self.measure_size);
        Ok(())
    }

    /// Plays the active track's selection from its first note.
    pub fn play_selection(&mut self) -> Result<(), EditorError> {
        let Some(audition) = self.active_track().and_then(Track::audition_track) else {
            return Ok(());
        };
        let start_tick = audition.notes().iter().map(|n| n.start).min().unwrap_or(0);
        self.start_clock(std::slice::from_ref(&audition), start_tick)
    }

    fn start_clock(&mut self, tracks: &[Track], start_tick: u32) -> Result<(), EditorError> {
        self.clock.stop();
        match self
            .clock
            .start(tracks, self.song.bpm, self.song.resolution, start_tick)
        {
            Ok(()) => {
                tracing::debug!("Playback started at tick {}", start_tick);
                self.playback = PlaybackState::Playing;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Playback failed: {}", e);
                self.playback = PlaybackState::Stopped;
                Err(e.into())
            }
        }
    }

    fn audition(&mut self) {
        // a missing device only costs the preview sound
        if let Err(e) = self.play_selection() {
            tracing::warn!("Audition skipped: {}", e);
        }
    }

    pub fn stop(&mut self) {
        self.clock.stop();
        if self.playback == PlaybackState::Playing {
            tracing::debug!("Playback stopped");
        }
        self.playback = PlaybackState::Stopped;
        self.surface.progress_line(None);
    }

    /// Stops if playing, otherwise plays from the first visible measure.
    pub fn toggle_play(&mut self) -> Result<(), EditorError> {
        if self.playback == PlaybackState::Playing {
            self.stop();
            return Ok(());
        }
        let first_visible = (self.scroll_offset / self.measure_size.max(1.0)) as u32 + 1;
        self.play_all(first_visible)
    }

    /// Timer callback: moves the progress line and scrolls with playback.
    ///
    /// Returns the progress line's x, or `None` when not playing. Once the
    /// clock reports it has finished, playback stops and the line is hidden.
    pub fn poll_playback(&mut self) -> Option<f64> {
        if self.playback != PlaybackState::Playing {
            return None;
        }
        if self.clock.take_finished() {
            self.stop();
            return None;
        }

        let tick = self.clock.current_tick();
        let grid = GridMapper::new(
            self.measure_size,
            self.song.resolution,
            DEFAULT_GRID_FRACTION,
            self.config.layout,
        );
        let x = grid.tick_to_x(tick);
        let measure = tick / self.song.ticks_per_measure().max(1);
        let measure_x = measure as f64 * self.measure_size;
        if measure_x - self.scroll_offset > self.config.viewport_width {
            self.scroll_offset = measure_x;
            self.surface.repaint();
        }
        self.surface.progress_line(Some(x));
        Some(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{import_from_bytes, MidiImportError, DRUM_CHANNEL, MIN_VELOCITY};
    use crate::playback::ManualClock;
    use crate::render::{RenderEvent, RenderLog};

    type TestSession = EditorSession<ManualClock, RenderLog>;

    fn session() -> TestSession {
        EditorSession::new(
            SessionConfig::default(),
            Preferences::new(),
            ManualClock::new(),
            RenderLog::new(),
        )
    }

    fn two_track_song() -> Song {
        let mut song = Song::new("Two");
        song.resolution = 480;
        let mut lead = Track::new("Lead", 0);
        lead.program = 27;
        lead.load_note(Note::new(64, 100, 0, 480));
        lead.load_note(Note::new(67, 100, 1920, 480));
        song.add_track(lead);
        let mut bass = Track::new("Bass", 1);
        bass.program = 33;
        bass.set_track_type(TrackType::Bass, 1);
        bass.load_note(Note::new(40, 100, 0, 1920));
        song.add_track(bass);
        song
    }

    fn loaded() -> TestSession {
        let mut session = session();
        session
            .load_bytes(&export_to_bytes(&two_track_song()), "Two")
            .unwrap();
        session
    }

    fn active_id(session: &TestSession, index: usize) -> TrackId {
        session.song().track_at(index).unwrap().id
    }

    #[test]
    fn test_new_session_has_default_track() {
        let session = session();
        assert_eq!(session.song().track_count(), 1);
        assert_eq!(session.song().measure_count, 50);
        assert_eq!(session.song().bpm, 120);
        let active = session.active_track().unwrap();
        assert_eq!(active.track_type(), TrackType::Guitar);
        assert_eq!(active.note_count(), 0);
    }

    #[test]
    fn test_config_from_preferences() {
        let prefs = Preferences::parse("measures=80\nbpm=0\n");
        let config = SessionConfig::from_preferences(&prefs);
        assert_eq!(config.min_measures, 80);
        assert_eq!(config.default_bpm, 120);
    }

    #[test]
    fn test_load_bytes() {
        let session = loaded();
        assert_eq!(session.song().track_count(), 2);
        assert_eq!(session.song().resolution, 480);
        assert_eq!(session.active_track_id(), Some(active_id(&session, 0)));
        assert_eq!(
            session.song().track_at(1).unwrap().track_type(),
            TrackType::Bass
        );
        assert!(session
            .surface()
            .events()
            .contains(&RenderEvent::TrackListChanged));
    }

    #[test]
    fn test_corrupt_load_falls_back_to_one_empty_track() {
        let mut session = loaded();
        let result = session.load_bytes(b"MThd", "Broken");
        assert!(matches!(
            result,
            Err(EditorError::Format(MidiImportError::Parse(_)))
        ));
        assert_eq!(session.song().track_count(), 1);
        let track = session.song().track_at(0).unwrap();
        assert_eq!(track.track_type(), TrackType::Guitar);
        assert_eq!(track.note_count(), 0);
        assert_eq!(session.active_track_id(), Some(track.id));
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let mut session = session();
        session.set_importer(Importer::new().with_event_limit(5));
        let result = session.load_bytes(&export_to_bytes(&two_track_song()), "Two");
        assert!(matches!(
            result,
            Err(EditorError::Format(MidiImportError::TooLarge { .. }))
        ));
        assert_eq!(session.song().track_count(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error_with_fallback() {
        let mut session = loaded();
        let path = std::env::temp_dir().join("tabedit-missing-file.mid");
        assert!(matches!(session.load_file(&path), Err(EditorError::Io(_))));
        assert_eq!(session.song().track_count(), 1);
        assert!(session.current_file().is_none());
    }

    #[test]
    fn test_load_file_records_directory() {
        let path =
            std::env::temp_dir().join(format!("tabedit-session-{}.mid", std::process::id()));
        export_to_midi(&two_track_song(), &path).unwrap();

        let mut session = session();
        session.load_file(&path).unwrap();
        assert_eq!(session.song().track_count(), 2);
        assert_eq!(session.song().name, path.file_stem().unwrap().to_string_lossy());
        assert_eq!(session.current_file(), Some(path.as_path()));
        let dir = path.parent().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            session.preferences().get(prefs::MIDI_DIRECTORY),
            Some(dir.as_str())
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let mut session = loaded();
        let path = std::env::temp_dir()
            .join("tabedit-no-such-dir")
            .join("out.mid");
        assert!(matches!(
            session.save_file(&path),
            Err(EditorError::Export { .. })
        ));
        assert_eq!(session.song().track_count(), 2);
    }

    #[test]
    fn test_switching_track_clears_selection() {
        let mut session = loaded();
        session.select_next_note();
        assert_eq!(session.active_track().unwrap().selection().len(), 1);

        let bass = active_id(&session, 1);
        assert!(session.select_track(bass));
        let lead = session.song().track_at(0).unwrap();
        assert!(lead.selection().is_empty());
        assert!(lead.notes().iter().all(|n| !n.is_selected));
    }

    #[test]
    fn test_copy_paste_through_session() {
        let mut session = loaded();
        let original = session.select_next_note().unwrap();
        assert_eq!(session.copy_selection(), 1);
        session.paste();

        let track = session.active_track().unwrap();
        assert_eq!(track.note_count(), 3);
        assert!(!track.selection().contains(original));
        let pasted = track.selected_notes().next().unwrap();
        assert!(pasted.from_clipboard);
        assert_ne!(pasted.id, original);
    }

    #[test]
    fn test_cut_keeps_clipboard_for_other_tracks() {
        let mut session = loaded();
        session.select_next_note();
        assert_eq!(session.cut_selection(), 1);
        assert_eq!(session.active_track().unwrap().note_count(), 1);

        let bass = active_id(&session, 1);
        session.select_track(bass);
        session.paste();
        let track = session.active_track().unwrap();
        assert_eq!(track.note_count(), 2);
        // 64 on a bass sits above the top string
        let pasted = track.selected_notes().next().unwrap();
        assert_eq!((pasted.string_num, pasted.fret), (0, 21));
    }

    #[test]
    fn test_insert_and_remove_bars() {
        let mut session = loaded();
        let tpm = session.song().ticks_per_measure();
        session.insert_bars(2, 1, true);
        assert_eq!(session.song().measure_count, 52);
        let starts: Vec<u32> = session
            .song()
            .tracks()
            .iter()
            .flat_map(|t| t.notes().iter().map(|n| n.start))
            .collect();
        assert_eq!(starts, vec![2 * tpm, 3 * tpm, 2 * tpm]);

        // measure 4 holds the second lead note
        let removed = session.remove_bars(4, 4, true);
        assert_eq!(removed, 1);
        assert_eq!(session.song().measure_count, 51);
        assert_eq!(session.song().track_at(0).unwrap().note_count(), 1);

        assert_eq!(session.remove_bars(0, 3, true), 0);
        assert_eq!(session.remove_bars(5, 3, true), 0);
    }

    #[test]
    fn test_measure_count_never_below_minimum() {
        let mut session = session();
        session.remove_bars(1, 10, true);
        assert_eq!(session.song().measure_count, 50);
    }

    #[test]
    fn test_measure_size_clamp() {
        let mut session = session();
        session.set_measure_size(2000.0);
        assert_eq!(session.measure_size(), 800.0);
        session.set_measure_size(10.0);
        assert_eq!(session.measure_size(), 50.0);
        session.set_measure_size(300.0);
        assert_eq!(session.measure_size(), 300.0);
        assert_eq!(session.surface().events().last(), Some(&RenderEvent::Repaint));
    }

    #[test]
    fn test_play_all_skips_muted_tracks() {
        let mut session = loaded();
        session.active_track_mut().unwrap().toggle_mute();
        session.play_all(2).unwrap();

        let request = session.clock().last_start().unwrap();
        assert_eq!(request.track_names, vec!["Bass".to_string()]);
        assert_eq!(request.start_tick, 1920);
        assert_eq!(session.playback_state(), PlaybackState::Playing);
        assert_eq!(session.scroll_offset(), 150.0);
    }

    #[test]
    fn test_device_unavailable() {
        let mut session = EditorSession::new(
            SessionConfig::default(),
            Preferences::new(),
            ManualClock::unavailable(),
            RenderLog::new(),
        );
        assert!(matches!(
            session.play_all(1),
            Err(EditorError::DeviceUnavailable(_))
        ));
        assert_eq!(session.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_poll_playback_moves_line_and_finishes() {
        let mut session = loaded();
        assert_eq!(session.poll_playback(), None);

        session.play_all(1).unwrap();
        session.clock_mut().advance(960);
        // 960 of 1920 ticks per measure at 150 px per measure
        assert_eq!(session.poll_playback(), Some(75.0));
        assert_eq!(session.surface().last_progress(), Some(Some(75.0)));

        session.clock_mut().advance(10_000);
        assert_eq!(session.poll_playback(), None);
        assert_eq!(session.playback_state(), PlaybackState::Stopped);
        assert_eq!(session.surface().last_progress(), Some(None));
    }

    #[test]
    fn test_poll_playback_scrolls_past_viewport() {
        let mut session = session();
        session.set_viewport_width(300.0);
        {
            let track = session.active_track_mut().unwrap();
            track.load_note(Note::new(64, 100, 0, 3840 * 20));
        }
        session.play_all(1).unwrap();

        // measure 3 starts at 300 px, right at the viewport edge
        session.clock_mut().advance(3840 * 2 + 1920);
        assert_eq!(session.poll_playback(), Some(375.0));
        assert_eq!(session.scroll_offset(), 0.0);

        // measure 4 starts at 450 px, past the 300 px viewport
        session.clock_mut().advance(1920);
        assert_eq!(session.poll_playback(), Some(450.0));
        assert_eq!(session.scroll_offset(), 450.0);
    }

    #[test]
    fn test_toggle_play() {
        let mut session = loaded();
        session.toggle_play().unwrap();
        assert_eq!(session.playback_state(), PlaybackState::Playing);
        session.toggle_play().unwrap();
        assert_eq!(session.playback_state(), PlaybackState::Stopped);
        assert!(!session.clock().is_playing());
    }

    #[test]
    fn test_drag_release_auditions_selection() {
        let mut session = session();
        session.pointer_down(PointerEvent::primary(5.0, 30.0));
        session.pointer_move(PointerEvent::primary(40.0, 30.0));
        let outcome = session.pointer_up(PointerEvent::primary(40.0, 30.0));

        assert_eq!(outcome, PointerOutcome::Audition);
        let request = session.clock().last_start().unwrap();
        assert_eq!(request.note_count, 1);
        assert_eq!(request.start_tick, 0);
    }

    #[test]
    fn test_type_fret_retunes_and_auditions() {
        let mut session = loaded();
        session.select_next_note();
        assert!(session.type_fret(5));
        let note = session.active_track().unwrap().selected_notes().next().unwrap();
        assert_eq!(note.pitch, 69);
        assert!(session.clock().last_start().is_some());
    }

    #[test]
    fn test_remove_last_track_leaves_empty_one() {
        let mut session = session();
        let removed = session.remove_active_track().unwrap();
        assert_eq!(session.song().track_count(), 1);
        assert_ne!(session.active_track_id(), Some(removed.id));
        assert!(session.active_track().is_some());
    }

    #[test]
    fn test_add_track_becomes_active() {
        let mut session = session();
        let id = session.add_track("Rhythm");
        assert_eq!(session.active_track_id(), Some(id));
        assert_eq!(session.song().track_count(), 2);
    }

    #[test]
    fn test_grid_fraction_changes_nudge_step() {
        let mut session = loaded();
        session.select_next_note();
        session.set_grid_fraction(0.25);
        assert!(session.nudge(1, 0));
        let note = session.active_track().unwrap().selected_notes().next().unwrap();
        assert_eq!(note.start, 480);
    }

    #[test]
    fn test_retyped_tracks_survive_export() {
        let mut session = session();
        let kinds = [TrackType::Guitar, TrackType::Drums, TrackType::Bass];
        for &kind in &kinds[1..] {
            session.add_track(format!("{}", kind));
            session.set_track_type(kind);
        }
        for index in 0..kinds.len() {
            session.select_track(active_id(&session, index));
            session.pointer_down(PointerEvent::primary(5.0, 30.0));
            session.pointer_move(PointerEvent::primary(40.0, 30.0));
            session.pointer_up(PointerEvent::primary(40.0, 30.0));
        }

        let reloaded = import_from_bytes(&session.export_bytes(), "Retyped").unwrap();
        let types: Vec<_> = reloaded.tracks().iter().map(|t| t.track_type()).collect();
        assert_eq!(types, kinds);
        assert_eq!(reloaded.track_at(1).unwrap().channel, DRUM_CHANNEL);
    }

    #[test]
    fn test_set_instrument_routes_drum_kit() {
        let mut session = session();
        session.set_instrument(0, true);
        let track = session.active_track().unwrap();
        assert_eq!(track.channel, DRUM_CHANNEL);
        assert_eq!(track.track_type(), TrackType::Drums);
        assert_eq!(
            session.surface().events().last(),
            Some(&RenderEvent::TrackListChanged)
        );

        session.set_instrument(33, false);
        let track = session.active_track().unwrap();
        assert_eq!((track.channel, track.program), (0, 33));
        assert_eq!(track.track_type(), TrackType::Bass);
    }

    #[test]
    fn test_velocity_floor_survives_export() {
        let mut session = session();
        session.pointer_down(PointerEvent::primary(5.0, 30.0));
        session.pointer_move(PointerEvent::primary(40.0, 30.0));
        session.pointer_up(PointerEvent::primary(40.0, 30.0));

        session.pointer_down(PointerEvent::secondary(5.0, 30.0));
        session.pointer_move(PointerEvent::secondary(5.0, 300.0));
        session.pointer_up(PointerEvent::secondary(5.0, 300.0));

        let edited = session.active_track().unwrap().notes()[0].velocity;
        assert_eq!(edited, MIN_VELOCITY);
        let reloaded = import_from_bytes(&session.export_bytes(), "Soft").unwrap();
        assert_eq!(reloaded.track_at(0).unwrap().notes()[0].velocity, edited);
    }
}

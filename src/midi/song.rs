//! Song container.
//!
//! A song owns its tracks plus the global timing values: one tempo, one
//! resolution, and a measure count. The meter is always 4/4.

use super::track::{Track, TrackId};
use super::{
    ticks_to_seconds, BEATS_PER_MEASURE, DEFAULT_BPM, DEFAULT_MIN_MEASURES, DEFAULT_RESOLUTION,
    DRUM_CHANNEL,
};
use serde::{Deserialize, Serialize};

/// A complete song with multiple tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Song name, usually the file stem.
    pub name: String,

    /// Tempo in beats per minute.
    pub bpm: u32,

    /// Ticks per quarter note.
    pub resolution: u16,

    /// Number of measures the editor shows.
    pub measure_count: u32,

    tracks: Vec<Track>,

    /// Next available MIDI channel for auto-assignment.
    /// Skips the drum channel for new tracks.
    next_channel: u8,
}

impl Song {
    /// Creates an empty song with default timing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bpm: DEFAULT_BPM,
            resolution: DEFAULT_RESOLUTION,
            measure_count: DEFAULT_MIN_MEASURES,
            tracks: Vec::new(),
            next_channel: 0,
        }
    }

    /// Creates a song holding a single empty guitar track.
    ///
    /// This is also the state the editor falls back to when a load fails.
    pub fn with_default_track(name: impl Into<String>) -> Self {
        let mut song = Self::new(name);
        song.create_track("Track 1");
        song
    }

    pub fn ticks_per_measure(&self) -> u32 {
        self.resolution as u32 * BEATS_PER_MEASURE
    }

    /// End tick of the last-ending note across all tracks.
    pub fn duration_ticks(&self) -> u32 {
        self.tracks
            .iter()
            .map(|t| t.duration_ticks())
            .max()
            .unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        ticks_to_seconds(self.duration_ticks(), self.bpm, self.resolution)
    }

    /// Start tick of a 1-based measure number.
    pub fn measure_start_tick(&self, measure: u32) -> u32 {
        measure.saturating_sub(1).saturating_mul(self.ticks_per_measure())
    }

    /// Returns (measure, beat, tick within beat), measure and beat 1-based.
    pub fn tick_to_position(&self, tick: u32) -> (u32, u32, u32) {
        let ticks_per_measure = self.ticks_per_measure().max(1);
        let ticks_per_beat = (self.resolution as u32).max(1);

        let measure = tick / ticks_per_measure + 1;
        let tick_in_measure = tick % ticks_per_measure;
        let beat = tick_in_measure / ticks_per_beat + 1;
        (measure, beat, tick_in_measure % ticks_per_beat)
    }

    /// Adds a track and returns its ID.
    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Creates and adds a new guitar track with an auto-assigned channel.
    pub fn create_track(&mut self, name: impl Into<String>) -> TrackId {
        let channel = self.next_channel;
        self.next_channel = match self.next_channel {
            c if c + 1 == DRUM_CHANNEL => DRUM_CHANNEL + 1,
            c if c >= 15 => 0,
            c => c + 1,
        };
        self.add_track(Track::new(name, channel))
    }

    /// Lowest non-percussion channel that no track other than `id` plays
    /// on, or channel 0 when all of them are taken.
    pub fn free_channel(&self, id: TrackId) -> u8 {
        (0..16)
            .filter(|&c| c != DRUM_CHANNEL)
            .find(|&c| !self.tracks.iter().any(|t| t.id != id && t.channel == c))
            .unwrap_or(0)
    }

    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let pos = self.track_index(id)?;
        Some(self.tracks.remove(pos))
    }

    pub fn get_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Tracks that take part in full playback.
    pub fn playable_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| !t.muted)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::with_default_track("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{Note, TrackType};

    #[test]
    fn test_song_creation() {
        let song = Song::new("Test");
        assert_eq!(song.name, "Test");
        assert_eq!(song.bpm, 120);
        assert_eq!(song.resolution, 960);
        assert_eq!(song.measure_count, 50);
        assert_eq!(song.track_count(), 0);
    }

    #[test]
    fn test_default_song_has_one_guitar_track() {
        let song = Song::default();
        assert_eq!(song.track_count(), 1);
        let track = song.track_at(0).unwrap();
        assert_eq!(track.track_type(), TrackType::Guitar);
        assert_eq!(track.note_count(), 0);
    }

    #[test]
    fn test_free_channel_skips_used_and_percussion() {
        let mut song = Song::new("Test");
        let ids: Vec<_> = (0..9).map(|i| song.create_track(format!("T{}", i))).collect();
        // channels 0-8 are taken; the track on 8 may keep its own
        assert_eq!(song.free_channel(ids[0]), 0);
        assert_eq!(song.free_channel(TrackId::new()), 10);
        assert_eq!(song.free_channel(ids[8]), 8);
    }

    #[test]
    fn test_channel_assignment_skips_drums() {
        let mut song = Song::new("Test");
        for i in 0..16 {
            song.create_track(format!("Track {}", i + 1));
        }
        let channels: Vec<_> = song.tracks().iter().map(|t| t.channel).collect();
        assert!(!channels[..15].contains(&9));
        assert_eq!(channels[9], 10);
    }

    #[test]
    fn test_tick_position_conversion() {
        let song = Song::new("Test");
        assert_eq!(song.tick_to_position(0), (1, 1, 0));
        assert_eq!(song.tick_to_position(960), (1, 2, 0));
        assert_eq!(song.tick_to_position(3840), (2, 1, 0));
        assert_eq!(song.measure_start_tick(3), 7680);
        assert_eq!(song.measure_start_tick(0), 0);
    }

    #[test]
    fn test_playable_tracks_skip_muted() {
        let mut song = Song::new("Test");
        let a = song.create_track("A");
        song.create_track("B");
        song.get_track_mut(a).unwrap().toggle_mute();
        let names: Vec<_> = song.playable_tracks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn test_serialization() {
        let mut song = Song::new("Test");
        let id = song.create_track("Lead");
        song.get_track_mut(id)
            .unwrap()
            .load_note(Note::new(64, 100, 0, 480));

        let json = song.to_json().unwrap();
        let loaded = Song::from_json(&json).unwrap();
        assert_eq!(loaded.name, "Test");
        assert_eq!(loaded.track_count(), 1);
        assert_eq!(loaded.track_at(0).unwrap().note_count(), 1);
        assert_eq!(loaded.duration_ticks(), 480);
    }
}

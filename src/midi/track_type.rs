//! Track types and the pitch <-> fretboard mapping.
//!
//! A track type decides how many lanes a track has, which pitch each lane
//! produces, and how wide notes are drawn. Guitar and bass map a pitch onto a
//! (string, fret) pair using a fixed tuning; drums bypass fret math and look
//! the pitch up in a lane table.

use super::note::Note;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// MIDI channel reserved for percussion in General MIDI (channel 10, 0-indexed).
pub const DRUM_CHANNEL: u8 = 9;

/// Program numbers classified as bass instruments.
pub const BASS_PROGRAMS: RangeInclusive<u8> = 32..=39;

/// Program given to a track that becomes bass without a bass program.
/// GM 34, Electric Bass (finger).
pub const DEFAULT_BASS_PROGRAM: u8 = 33;

/// Program of new tracks, and of a bass track turned back into guitar.
pub const DEFAULT_PROGRAM: u8 = 0;

/// Standard guitar tuning, top line (high E) first.
pub const GUITAR_TUNING: [u8; 6] = [64, 59, 55, 50, 45, 40];

/// Standard four-string bass tuning, top line (G) first.
pub const BASS_TUNING: [u8; 4] = [43, 38, 33, 28];

/// Fixed draw width of a drum hit in pixels.
const DRUM_DRAW_WIDTH: f64 = 10.0;

/// One drum lane: a display name and the pitches that land on it.
/// The first pitch is the one written when a note is placed on the lane.
#[derive(Debug, Clone, Copy)]
pub struct DrumLane {
    pub name: &'static str,
    pub pitches: &'static [u8],
}

/// Drum kit layout, top lane first. The last lane catches every pitch the
/// other lanes don't claim.
pub const DRUM_LANES: [DrumLane; 9] = [
    DrumLane { name: "Crash", pitches: &[49, 57, 52, 55] },
    DrumLane { name: "Ride", pitches: &[51, 53, 59] },
    DrumLane { name: "Hi-hat", pitches: &[42, 44, 46] },
    DrumLane { name: "High tom", pitches: &[50, 48] },
    DrumLane { name: "Mid tom", pitches: &[47, 45] },
    DrumLane { name: "Snare", pitches: &[38, 40, 37, 39] },
    DrumLane { name: "Floor tom", pitches: &[43, 41] },
    DrumLane { name: "Kick", pitches: &[36, 35] },
    DrumLane { name: "Percussion", pitches: &[56] },
];

/// The instrument layout of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackType {
    #[default]
    Guitar,
    Bass,
    Drums,
}

impl TrackType {
    /// Classifies a track from its program-change event.
    ///
    /// Channel 9 is always drums; programs 32-39 are bass; everything else is
    /// guitar. This is fixed policy.
    pub fn classify(channel: u8, program: u8) -> Self {
        if channel == DRUM_CHANNEL {
            TrackType::Drums
        } else if BASS_PROGRAMS.contains(&program) {
            TrackType::Bass
        } else {
            TrackType::Guitar
        }
    }

    /// Number of lanes (strings or drum voices).
    pub fn num_strings(&self) -> usize {
        match self {
            TrackType::Guitar => GUITAR_TUNING.len(),
            TrackType::Bass => BASS_TUNING.len(),
            TrackType::Drums => DRUM_LANES.len(),
        }
    }

    /// Open-string pitches, top lane first. Empty for drums.
    pub fn open_pitches(&self) -> &'static [u8] {
        match self {
            TrackType::Guitar => &GUITAR_TUNING,
            TrackType::Bass => &BASS_TUNING,
            TrackType::Drums => &[],
        }
    }

    /// Fixed note width, if the type draws notes independently of duration.
    pub fn note_draw_width(&self) -> Option<f64> {
        match self {
            TrackType::Drums => Some(DRUM_DRAW_WIDTH),
            _ => None,
        }
    }

    /// Picks the lane and fret that produce `pitch`.
    ///
    /// Lanes are tried top to bottom and the first whose open pitch does not
    /// exceed `pitch` wins, so a pitch reachable on several strings always
    /// lands on the highest-sounding one. Pitches below the lowest open string
    /// sit on the last lane at fret 0.
    pub fn string_and_fret_for(&self, pitch: u8) -> (usize, u8) {
        match self {
            TrackType::Drums => (drum_lane_for(pitch), 0),
            _ => {
                let tuning = self.open_pitches();
                tuning
                    .iter()
                    .position(|&open| open <= pitch)
                    .map(|lane| (lane, pitch - tuning[lane]))
                    .unwrap_or((tuning.len() - 1, 0))
            }
        }
    }

    /// Writes the lane and fret for the note's current pitch.
    pub fn assign_string_and_fret(&self, note: &mut Note) {
        let (string_num, fret) = self.string_and_fret_for(note.pitch);
        note.string_num = string_num;
        note.fret = fret;
    }

    /// Inverse of [`string_and_fret_for`](Self::string_and_fret_for): the
    /// pitch sounded by `fret` on lane `string_num`, clamped to 127.
    pub fn find_note_pitch(&self, string_num: usize, fret: u8) -> u8 {
        match self {
            TrackType::Drums => {
                let lane = string_num.min(DRUM_LANES.len() - 1);
                DRUM_LANES[lane].pitches[0]
            }
            _ => {
                let tuning = self.open_pitches();
                let open = tuning[string_num.min(tuning.len() - 1)];
                open.saturating_add(fret).min(127)
            }
        }
    }

    /// Human-readable lane label ("E4" for a guitar string, "Snare" for drums).
    pub fn lane_name(&self, string_num: usize) -> String {
        match self {
            TrackType::Drums => DRUM_LANES[string_num.min(DRUM_LANES.len() - 1)]
                .name
                .to_string(),
            _ => {
                let tuning = self.open_pitches();
                super::note_to_name(tuning[string_num.min(tuning.len() - 1)])
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackType::Guitar => "guitar",
            TrackType::Bass => "bass",
            TrackType::Drums => "drums",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lane index for a drum pitch.
fn drum_lane_for(pitch: u8) -> usize {
    DRUM_LANES[..DRUM_LANES.len() - 1]
        .iter()
        .position(|lane| lane.pitches.contains(&pitch))
        .unwrap_or(DRUM_LANES.len() - 1)
}

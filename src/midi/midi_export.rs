//! Standard MIDI File (SMF) export.
//!
//! Writes the song as SMF Format 1, one track chunk per editor track, at the
//! song's own resolution. The first chunk also carries the tempo and a 4/4
//! time signature.
//!
//! # Limitations (Information Degradation)
//!
//! - Mute state, grid fraction and note selection are not exported
//! - Lane and fret are not stored; they are re-derived from pitch on import
//! - Overlapping notes of the same pitch on one track do not survive a round
//!   trip, since note-offs pair with the most recently opened note
//! - Zero-length notes (an unfinished click-drag) are skipped

use super::{Song, Track, MIN_VELOCITY};
use std::fs;
use std::path::Path;

/// Controller number for channel volume.
const CC_CHANNEL_VOLUME: u8 = 7;

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
///
/// # Arguments
///
/// * `value` - The value to encode (max 0x0FFFFFFF for MIDI)
/// * `buffer` - Output buffer to write to
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut temp = value;
    loop {
        groups[len] = (temp & 0x7F) as u8;
        len += 1;
        temp >>= 7;
        if temp == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        buffer.push(groups[i] | continuation);
    }
}

/// MIDI event types for track data.
enum MidiEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Microseconds per quarter note
    SetTempo(u32),
    /// 4/4, the only meter the editor knows
    TimeSignature,
    TrackName(String),
    EndOfTrack,
}

/// Event ordering at equal ticks (lower first).
mod priority {
    pub const TRACK_NAME: u8 = 0;
    pub const TEMPO: u8 = 1;
    pub const PROGRAM: u8 = 2;
    pub const VOLUME: u8 = 3;
    /// Offs sort before ons so back-to-back notes don't retrigger.
    pub const NOTE_OFF: u8 = 10;
    pub const NOTE_ON: u8 = 11;
    pub const END_OF_TRACK: u8 = 255;
}

/// A MIDI event at an absolute tick.
struct TimedEvent {
    tick: u32,
    event: MidiEvent,
    /// Sort key among events at the same tick
    priority: u8,
}

impl TimedEvent {
    fn new(tick: u32, event: MidiEvent, priority: u8) -> Self {
        Self {
            tick,
            event,
            priority,
        }
    }
}

/// Writes a single MIDI event to the buffer (without delta time).
fn write_event(event: &MidiEvent, buffer: &mut Vec<u8>) {
    match event {
        MidiEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => buffer.extend([0x90 | (channel & 0x0F), *pitch & 0x7F, *velocity & 0x7F]),
        MidiEvent::NoteOff { channel, pitch } => {
            buffer.extend([0x80 | (channel & 0x0F), *pitch & 0x7F, 0])
        }
        MidiEvent::ProgramChange { channel, program } => {
            buffer.extend([0xC0 | (channel & 0x0F), *program & 0x7F])
        }
        MidiEvent::ControlChange {
            channel,
            controller,
            value,
        } => buffer.extend([0xB0 | (channel & 0x0F), *controller, *value & 0x7F]),
        MidiEvent::SetTempo(usec) => {
            // FF 51 03 tt tt tt
            buffer.extend([0xFF, 0x51, 0x03]);
            buffer.extend(&usec.to_be_bytes()[1..]);
        }
        MidiEvent::TimeSignature => {
            // FF 58 04 nn dd cc bb: 4/4, 24 clocks per click, 8 32nds per quarter
            buffer.extend([0xFF, 0x58, 0x04, 4, 2, 24, 8]);
        }
        MidiEvent::TrackName(name) => {
            buffer.extend([0xFF, 0x03]);
            write_vlq(name.len() as u32, buffer);
            buffer.extend_from_slice(name.as_bytes());
        }
        MidiEvent::EndOfTrack => buffer.extend([0xFF, 0x2F, 0x00]),
    }
}

/// Sorts events by tick and priority and encodes them with delta times.
fn build_track_data(events: &mut [TimedEvent]) -> Vec<u8> {
    let mut buffer = Vec::new();
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    for timed_event in events.iter() {
        write_vlq(timed_event.tick.saturating_sub(last_tick), &mut buffer);
        write_event(&timed_event.event, &mut buffer);
        last_tick = timed_event.tick;
    }
    buffer
}

/// Appends an MTrk chunk.
fn write_track_chunk(out: &mut Vec<u8>, track_data: &[u8]) {
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    out.extend_from_slice(track_data);
}

/// Tempo events for the first chunk.
fn tempo_events(song: &Song) -> Vec<TimedEvent> {
    let usec_per_beat = 60_000_000 / song.bpm.max(1);
    vec![
        TimedEvent::new(0, MidiEvent::SetTempo(usec_per_beat), priority::TEMPO),
        TimedEvent::new(0, MidiEvent::TimeSignature, priority::TEMPO),
    ]
}

/// Setup and note events for one editor track.
fn track_events(track: &Track) -> Vec<TimedEvent> {
    let channel = track.channel;
    let mut events = vec![
        TimedEvent::new(0, MidiEvent::TrackName(track.name.clone()), priority::TRACK_NAME),
        TimedEvent::new(
            0,
            MidiEvent::ProgramChange {
                channel,
                program: track.program,
            },
            priority::PROGRAM,
        ),
        TimedEvent::new(
            0,
            MidiEvent::ControlChange {
                channel,
                controller: CC_CHANNEL_VOLUME,
                value: track.volume,
            },
            priority::VOLUME,
        ),
    ];

    for note in track.notes().iter().filter(|n| n.duration > 0) {
        events.push(TimedEvent::new(
            note.start,
            MidiEvent::NoteOn {
                channel,
                pitch: note.pitch,
                velocity: note.velocity.max(MIN_VELOCITY),
            },
            priority::NOTE_ON,
        ));
        events.push(TimedEvent::new(
            note.end_tick(),
            MidiEvent::NoteOff {
                channel,
                pitch: note.pitch,
            },
            priority::NOTE_OFF,
        ));
    }
    events
}

/// Serializes a song to Standard MIDI File bytes.
///
/// A song without tracks still produces a valid file holding one
/// tempo-only chunk.
pub fn export_to_bytes(song: &Song) -> Vec<u8> {
    let num_tracks = song.track_count().max(1) as u16;

    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&num_tracks.to_be_bytes());
    out.extend_from_slice(&song.resolution.to_be_bytes());

    if song.tracks().is_empty() {
        let mut events = tempo_events(song);
        events.push(TimedEvent::new(0, MidiEvent::EndOfTrack, priority::END_OF_TRACK));
        write_track_chunk(&mut out, &build_track_data(&mut events));
        return out;
    }

    for (idx, track) in song.tracks().iter().enumerate() {
        let mut events = track_events(track);
        if idx == 0 {
            events.extend(tempo_events(song));
        }
        events.push(TimedEvent::new(
            track.duration_ticks(),
            MidiEvent::EndOfTrack,
            priority::END_OF_TRACK,
        ));
        write_track_chunk(&mut out, &build_track_data(&mut events));
    }
    out
}

/// Exports a song to a Standard MIDI File.
///
/// # Arguments
///
/// * `song` - The song to export
/// * `path` - Output file path
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn export_to_midi<P: AsRef<Path>>(song: &Song, path: P) -> std::io::Result<()> {
    fs::write(path, export_to_bytes(song))
}

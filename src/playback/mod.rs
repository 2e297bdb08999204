//! Playback clock collaborator.
//!
//! The editor owns no audio resources. It starts and stops a
//! [`PlaybackClock`] and polls it for the current tick to place the progress
//! line. A real front end plugs a synthesizer-backed clock in here;
//! [`TransportClock`] keeps time against the wall clock and [`ManualClock`]
//! is stepped by hand.

mod clock;

pub use clock::{ManualClock, StartRequest, TransportClock, TransportMonitor};

use crate::midi::Track;

/// Errors reported by a playback backend.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// No output device or synthesizer is available
    #[error("playback device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Whether the session is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

/// A source of playback position.
pub trait PlaybackClock {
    /// Starts playing `tracks` from `start_tick`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::DeviceUnavailable`] if the backend can't play
    fn start(
        &mut self,
        tracks: &[Track],
        bpm: u32,
        resolution: u16,
        start_tick: u32,
    ) -> Result<(), PlaybackError>;

    /// Stops playback. Stopping an idle clock does nothing.
    fn stop(&mut self);

    /// Current position in ticks. Must be cheap; it is polled on a timer.
    fn current_tick(&self) -> u32;

    fn is_playing(&self) -> bool;

    /// Returns true once after playback ran to the end on its own.
    fn take_finished(&mut self) -> bool;
}

/// Tick at which the last note of `tracks` stops sounding.
pub(crate) fn end_tick(tracks: &[Track]) -> u32 {
    tracks.iter().map(Track::duration_ticks).max().unwrap_or(0)
}

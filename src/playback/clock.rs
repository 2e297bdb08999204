//! Clock implementations.

use super::{end_tick, PlaybackClock, PlaybackError};
use crate::midi::{seconds_to_ticks, Track};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// State shared between the clock and its monitors.
/// Uses atomics so a monitor on another thread never blocks the clock.
#[derive(Debug, Default)]
struct SharedState {
    playing: AtomicBool,
    position_ticks: AtomicU32,
    finished: AtomicBool,
}

/// Wall-clock transport.
///
/// Advances at the tempo given to [`start`](PlaybackClock::start) and stops
/// by itself once the last note has ended. The position is computed lazily
/// whenever it is read.
#[derive(Debug)]
pub struct TransportClock {
    state: Arc<SharedState>,
    started_at: Option<Instant>,
    start_tick: u32,
    end_tick: u32,
    bpm: u32,
    resolution: u16,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState::default()),
            started_at: None,
            start_tick: 0,
            end_tick: 0,
            bpm: crate::midi::DEFAULT_BPM,
            resolution: crate::midi::DEFAULT_RESOLUTION,
        }
    }

    /// A read-only view of the position that can be sent to another thread.
    pub fn monitor(&self) -> TransportMonitor {
        TransportMonitor {
            state: Arc::clone(&self.state),
        }
    }

    fn refresh(&self) -> u32 {
        let Some(started_at) = self.started_at else {
            return self.state.position_ticks.load(Ordering::Relaxed);
        };
        if !self.state.playing.load(Ordering::Relaxed) {
            return self.state.position_ticks.load(Ordering::Relaxed);
        }

        let elapsed = seconds_to_ticks(started_at.elapsed().as_secs_f64(), self.bpm, self.resolution);
        let tick = self.start_tick.saturating_add(elapsed);
        if tick >= self.end_tick {
            self.state.position_ticks.store(self.end_tick, Ordering::Relaxed);
            self.state.playing.store(false, Ordering::Relaxed);
            self.state.finished.store(true, Ordering::Relaxed);
            return self.end_tick;
        }
        self.state.position_ticks.store(tick, Ordering::Relaxed);
        tick
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for TransportClock {
    fn start(
        &mut self,
        tracks: &[Track],
        bpm: u32,
        resolution: u16,
        start_tick: u32,
    ) -> Result<(), PlaybackError> {
        self.bpm = bpm.max(1);
        self.resolution = resolution.max(1);
        self.start_tick = start_tick;
        self.end_tick = end_tick(tracks).max(start_tick);
        self.started_at = Some(Instant::now());
        self.state.position_ticks.store(start_tick, Ordering::Relaxed);
        self.state.finished.store(false, Ordering::Relaxed);
        self.state.playing.store(true, Ordering::Relaxed);
        tracing::debug!("Transport started at tick {} ({} bpm)", start_tick, self.bpm);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.playing.store(false, Ordering::Relaxed);
        self.started_at = None;
    }

    fn current_tick(&self) -> u32 {
        self.refresh()
    }

    fn is_playing(&self) -> bool {
        self.refresh();
        self.state.playing.load(Ordering::Relaxed)
    }

    fn take_finished(&mut self) -> bool {
        self.refresh();
        self.state.finished.swap(false, Ordering::Relaxed)
    }
}

/// Read-only handle on a [`TransportClock`]'s last known position.
#[derive(Debug, Clone)]
pub struct TransportMonitor {
    state: Arc<SharedState>,
}

impl TransportMonitor {
    pub fn position_ticks(&self) -> u32 {
        self.state.position_ticks.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::Relaxed)
    }
}

/// Arguments of the last [`PlaybackClock::start`] call on a [`ManualClock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub track_names: Vec<String>,
    pub note_count: usize,
    pub bpm: u32,
    pub resolution: u16,
    pub start_tick: u32,
}

/// Clock that only moves when told to. Used by tests and headless tools.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    playing: bool,
    tick: u32,
    end_tick: u32,
    finished: bool,
    unavailable: bool,
    last_start: Option<StartRequest>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose every start fails as if no device were present.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Moves the position forward, finishing at the last note's end.
    pub fn advance(&mut self, ticks: u32) {
        if !self.playing {
            return;
        }
        self.tick = self.tick.saturating_add(ticks);
        if self.tick >= self.end_tick {
            self.tick = self.end_tick;
            self.playing = false;
            self.finished = true;
        }
    }

    pub fn last_start(&self) -> Option<&StartRequest> {
        self.last_start.as_ref()
    }
}

impl PlaybackClock for ManualClock {
    fn start(
        &mut self,
        tracks: &[Track],
        bpm: u32,
        resolution: u16,
        start_tick: u32,
    ) -> Result<(), PlaybackError> {
        if self.unavailable {
            return Err(PlaybackError::DeviceUnavailable(
                "no output device".to_string(),
            ));
        }
        self.last_start = Some(StartRequest {
            track_names: tracks.iter().map(|t| t.name.clone()).collect(),
            note_count: tracks.iter().map(Track::note_count).sum(),
            bpm,
            resolution,
            start_tick,
        });
        self.tick = start_tick;
        self.end_tick = end_tick(tracks).max(start_tick);
        self.finished = false;
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn current_tick(&self) -> u32 {
        self.tick
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn take_finished(&mut self) -> bool {
        std::mem::take(&mut self.finished)
    }
}

//! Notifications to the drawing layer.
//!
//! The editor never draws. It tells a [`RenderSurface`] which regions changed
//! and the surface decides how to repaint them. All methods default to no-ops
//! so a front end only implements what it cares about.

use crate::edit::NoteRect;
use crate::midi::TrackId;

/// Receiver for redraw requests.
pub trait RenderSurface {
    /// A note's box needs redrawing (old or new position).
    fn note_changed(&mut self, _track: TrackId, _rect: NoteRect) {}

    /// The rubber-band rectangle moved, or was hidden (`None`).
    fn selection_rect_changed(&mut self, _rect: Option<NoteRect>) {}

    /// Playback progress line at `x`, or hidden (`None`).
    fn progress_line(&mut self, _x: Option<f64>) {}

    /// Velocity indicator shown with a value, or hidden (`None`).
    fn velocity_indicator(&mut self, _velocity: Option<u8>) {}

    /// Tracks were added, removed, reordered, or renamed.
    fn track_list_changed(&mut self) {}

    /// Everything needs repainting (zoom or scroll change).
    fn repaint(&mut self) {}
}

/// Surface that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    NoteChanged { track: TrackId, rect: NoteRect },
    SelectionRect(Option<NoteRect>),
    ProgressLine(Option<f64>),
    VelocityIndicator(Option<u8>),
    TrackListChanged,
    Repaint,
}

/// Surface that records every notification in order.
#[derive(Debug, Default, Clone)]
pub struct RenderLog {
    events: Vec<RenderEvent>,
}

impl RenderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RenderEvent] {
        &self.events
    }

    /// Drains the recorded events.
    pub fn take(&mut self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.events)
    }

    /// The most recent progress-line notification, if any.
    pub fn last_progress(&self) -> Option<Option<f64>> {
        self.events.iter().rev().find_map(|event| match event {
            RenderEvent::ProgressLine(x) => Some(*x),
            _ => None,
        })
    }
}

impl RenderSurface for RenderLog {
    fn note_changed(&mut self, track: TrackId, rect: NoteRect) {
        self.events.push(RenderEvent::NoteChanged { track, rect });
    }

    fn selection_rect_changed(&mut self, rect: Option<NoteRect>) {
        self.events.push(RenderEvent::SelectionRect(rect));
    }

    fn progress_line(&mut self, x: Option<f64>) {
        self.events.push(RenderEvent::ProgressLine(x));
    }

    fn velocity_indicator(&mut self, velocity: Option<u8>) {
        self.events.push(RenderEvent::VelocityIndicator(velocity));
    }

    fn track_list_changed(&mut self) {
        self.events.push(RenderEvent::TrackListChanged);
    }

    fn repaint(&mut self) {
        self.events.push(RenderEvent::Repaint);
    }
}

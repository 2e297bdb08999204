//! Mouse-driven editing of a track.
//!
//! A drag is a small state machine. Mouse-down picks one [`DragState`] based
//! on what is under the cursor and which modifiers are held; every move is
//! routed to that state until mouse-up commits it and returns to
//! [`DragState::Idle`].
//!
//! | Down on | Modifiers | State |
//! |---|---|---|
//! | empty canvas | none, primary button | `LengthenTentative` on a new note |
//! | empty canvas | shift, or secondary button | `RectangleSelect` |
//! | a note | secondary button or ctrl | `SetVelocity` |
//! | right edge of a note | none | `Lengthen` |
//! | a note | alt | duplicate selection, then `MoveNotes` |
//! | a note | none / shift | `MoveNotes` |

use super::grid::{GridMapper, NoteRect, Point};
use crate::midi::{NoteId, Track, TrackType, DEFAULT_VELOCITY, MIN_VELOCITY};
use crate::render::RenderSurface;

/// Width in pixels of the grab zone at the right edge of a note.
pub const LENGTHEN_HANDLE_WIDTH: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
}

/// A mouse event in track pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn secondary(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            button: PointerButton::Secondary,
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// The behavior bound to the current drag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    /// No button held.
    #[default]
    Idle,
    /// Rubber-band selection from `origin` to `current`.
    RectangleSelect {
        origin: Point,
        current: Point,
        additive: bool,
    },
    /// Dragging the selection. Positions are the last grid unit and lane the
    /// cursor was seen on.
    MoveNotes { last_unit: i64, last_lane: usize },
    /// A note was just created by clicking empty canvas. It is discarded on
    /// release unless the drag gave it some length.
    LengthenTentative { note: NoteId, origin: Point },
    /// Dragging the right edge of an existing note.
    Lengthen { note: NoteId },
    /// Vertical drag changes the velocity of `note`.
    SetVelocity { note: NoteId, last_y: f64 },
}

/// What the caller should do once a drag ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    None,
    /// Play the current selection so the user hears the edit.
    Audition,
}

impl Track {
    /// Starts a drag at `event`.
    pub fn pointer_down(
        &mut self,
        event: PointerEvent,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        let point = event.point();
        let state = match self.hit_test(point, grid) {
            Some(id) => self.press_on_note(id, event, grid, surface),
            None => self.press_on_canvas(event, grid, surface),
        };
        self.drag = state;
    }

    fn press_on_note(
        &mut self,
        id: NoteId,
        event: PointerEvent,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> DragState {
        let point = event.point();
        let Some(note) = self.get_note(id) else {
            return DragState::Idle;
        };
        let rect = grid.note_rect(note, self.track_type());
        let on_handle = self.track_type() != TrackType::Drums
            && point.x >= rect.right() - LENGTHEN_HANDLE_WIDTH;

        if !self.selection.contains(id) {
            if !event.modifiers.shift {
                self.clear_selection(grid, surface);
            }
            self.select_note(id, grid, surface);
        }

        if event.button == PointerButton::Secondary || event.modifiers.ctrl {
            let velocity = self.get_note(id).map_or(DEFAULT_VELOCITY, |n| n.velocity);
            surface.velocity_indicator(Some(velocity));
            return DragState::SetVelocity {
                note: id,
                last_y: point.y,
            };
        }

        if on_handle && !event.modifiers.alt {
            return DragState::Lengthen { note: id };
        }
        if event.modifiers.alt {
            self.duplicate_selection(grid, surface);
        }
        DragState::MoveNotes {
            last_unit: grid.snap_units(point.x),
            last_lane: grid.y_to_lane(point.y, self.track_type().num_strings()),
        }
    }

    fn press_on_canvas(
        &mut self,
        event: PointerEvent,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> DragState {
        let point = event.point();
        if event.button == PointerButton::Primary && !event.modifiers.any() {
            self.clear_selection(grid, surface);
            let id = self.add_note_at(point, grid);
            self.select_note(id, grid, surface);
            return DragState::LengthenTentative {
                note: id,
                origin: point,
            };
        }

        surface.selection_rect_changed(Some(NoteRect::from_corners(point, point)));
        DragState::RectangleSelect {
            origin: point,
            current: point,
            additive: event.modifiers.shift,
        }
    }

    /// Feeds a mouse move to the active drag.
    pub fn pointer_move(
        &mut self,
        event: PointerEvent,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) {
        let point = event.point();
        match self.drag {
            DragState::Idle => {}
            DragState::RectangleSelect {
                origin, additive, ..
            } => {
                surface.selection_rect_changed(Some(NoteRect::from_corners(origin, point)));
                self.drag = DragState::RectangleSelect {
                    origin,
                    current: point,
                    additive,
                };
            }
            DragState::MoveNotes {
                last_unit,
                last_lane,
            } => {
                let unit = grid.snap_units(point.x);
                let lane = grid.y_to_lane(point.y, self.track_type().num_strings());
                if unit != last_unit || lane != last_lane {
                    self.move_selected_notes(
                        unit - last_unit,
                        lane as i64 - last_lane as i64,
                        grid,
                        surface,
                    );
                    self.drag = DragState::MoveNotes {
                        last_unit: unit,
                        last_lane: lane,
                    };
                }
            }
            DragState::LengthenTentative { note, origin } => {
                if (point.y - origin.y).abs() > grid.layout.line_spacing {
                    // vertical drift: the user meant to rubber-band select
                    self.discard_note(note, grid, surface);
                    surface.selection_rect_changed(Some(NoteRect::from_corners(origin, point)));
                    self.drag = DragState::RectangleSelect {
                        origin,
                        current: point,
                        additive: false,
                    };
                } else {
                    let min_width = match self.track_type() {
                        TrackType::Drums => grid.grid_size(),
                        _ => 0.0,
                    };
                    self.lengthen_note(note, point.x, min_width, grid, surface);
                }
            }
            DragState::Lengthen { note } => {
                self.lengthen_note(note, point.x, grid.grid_size(), grid, surface);
            }
            DragState::SetVelocity { note, last_y } => {
                let delta = (last_y - point.y).round() as i32;
                if delta == 0 {
                    return;
                }
                let Some(current) = self.get_note(note).map(|n| n.velocity) else {
                    return;
                };
                let velocity = (current as i32 + delta).clamp(MIN_VELOCITY as i32, 127) as u8;
                self.set_note_velocity(note, velocity, grid, surface);
                surface.velocity_indicator(Some(velocity));
                self.drag = DragState::SetVelocity {
                    note,
                    last_y: point.y,
                };
            }
        }
    }

    /// Ends the active drag and commits it.
    pub fn pointer_up(
        &mut self,
        event: PointerEvent,
        grid: &GridMapper,
        surface: &mut dyn RenderSurface,
    ) -> PointerOutcome {
        match std::mem::take(&mut self.drag) {
            DragState::Idle => PointerOutcome::None,
            DragState::RectangleSelect {
                origin, additive, ..
            } => {
                surface.selection_rect_changed(None);
                let rect = NoteRect::from_corners(origin, event.point());
                self.select_in_rect(rect, additive, grid, surface);
                PointerOutcome::None
            }
            DragState::LengthenTentative { note, .. } => {
                let abandoned = self.get_note(note).is_some_and(|n| n.duration == 0);
                if abandoned {
                    self.discard_note(note, grid, surface);
                    self.clear_selection(grid, surface);
                    PointerOutcome::None
                } else {
                    self.audition_outcome()
                }
            }
            DragState::SetVelocity { .. } => {
                surface.velocity_indicator(None);
                self.audition_outcome()
            }
            DragState::MoveNotes { .. } | DragState::Lengthen { .. } => self.audition_outcome(),
        }
    }

    fn audition_outcome(&self) -> PointerOutcome {
        if self.selection.is_empty() {
            PointerOutcome::None
        } else {
            PointerOutcome::Audition
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::LaneLayout;
    use crate::midi::Note;
    use crate::render::{NullSurface, RenderEvent, RenderLog};

    fn grid() -> GridMapper {
        GridMapper::new(150.0, 960, 0.125, LaneLayout::default())
    }

    fn drag(track: &mut Track, from: PointerEvent, to: PointerEvent) -> PointerOutcome {
        let g = grid();
        track.pointer_down(from, &g, &mut NullSurface);
        track.pointer_move(to, &g, &mut NullSurface);
        track.pointer_up(to, &g, &mut NullSurface)
    }

    #[test]
    fn test_click_drag_creates_note() {
        let mut track = Track::new("Test", 0);
        let outcome = drag(
            &mut track,
            PointerEvent::primary(5.0, 30.0),
            PointerEvent::primary(40.0, 32.0),
        );
        assert_eq!(outcome, PointerOutcome::Audition);
        assert_eq!(track.note_count(), 1);
        let note = &track.notes()[0];
        assert_eq!((note.start, note.duration), (0, 960));
        assert_eq!((note.string_num, note.fret, note.pitch), (0, 0, 64));
        assert!(note.is_selected);
        assert_eq!(track.drag_state(), DragState::Idle);
    }

    #[test]
    fn test_abandoned_note_is_discarded() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        track.load_note(Note::new(64, 100, 1920, 480));
        let before = track.note_count();

        track.pointer_down(PointerEvent::primary(5.0, 50.0), &g, &mut NullSurface);
        assert!(matches!(track.drag_state(), DragState::LengthenTentative { .. }));
        assert_eq!(track.note_count(), before + 1);
        track.pointer_move(PointerEvent::primary(10.0, 50.0), &g, &mut NullSurface);
        let outcome = track.pointer_up(PointerEvent::primary(10.0, 50.0), &g, &mut NullSurface);

        assert_eq!(outcome, PointerOutcome::None);
        assert_eq!(track.note_count(), before);
        assert!(track.selection().is_empty());
    }

    #[test]
    fn test_vertical_drift_turns_into_rectangle_select() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let existing = track.load_note(Note::new(59, 100, 480, 480));

        track.pointer_down(PointerEvent::primary(5.0, 30.0), &g, &mut NullSurface);
        track.pointer_move(PointerEvent::primary(40.0, 55.0), &g, &mut NullSurface);
        assert!(matches!(track.drag_state(), DragState::RectangleSelect { .. }));
        assert_eq!(track.note_count(), 1);

        track.pointer_up(PointerEvent::primary(40.0, 55.0), &g, &mut NullSurface);
        assert_eq!(track.selection().ids(), &[existing]);
    }

    #[test]
    fn test_rectangle_select_notifies_and_selects() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let a = track.load_note(Note::new(64, 100, 0, 480));
        let b = track.load_note(Note::new(59, 100, 960, 480));
        let far = track.load_note(Note::new(64, 100, 38400, 480));
        let mut log = RenderLog::new();

        let down = PointerEvent::secondary(-5.0, 0.0);
        let up = PointerEvent::secondary(60.0, 60.0);
        track.pointer_down(down, &g, &mut log);
        track.pointer_move(up, &g, &mut log);
        track.pointer_up(up, &g, &mut log);

        assert!(track.selection().contains(a));
        assert!(track.selection().contains(b));
        assert!(!track.selection().contains(far));
        let rects: Vec<_> = log
            .events()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::SelectionRect(r) => Some(r.is_some()),
                _ => None,
            })
            .collect();
        assert_eq!(rects, vec![true, true, false]);
    }

    #[test]
    fn test_shift_rectangle_is_additive() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let a = track.load_note(Note::new(64, 100, 0, 480));
        let b = track.load_note(Note::new(64, 100, 38400, 480));
        track.select_note(b, &g, &mut NullSurface);

        drag(
            &mut track,
            PointerEvent::primary(-5.0, 0.0).with_shift(),
            PointerEvent::primary(20.0, 40.0).with_shift(),
        );
        assert_eq!(track.selection().len(), 2);
        assert!(track.selection().contains(a));
    }

    #[test]
    fn test_drag_moves_selected_notes_by_grid_units() {
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 960, 480));

        let outcome = drag(
            &mut track,
            PointerEvent::primary(40.0, 30.0),
            PointerEvent::primary(60.0, 50.0),
        );
        assert_eq!(outcome, PointerOutcome::Audition);
        let note = track.get_note(id).unwrap();
        assert_eq!(note.start, 1440);
        assert_eq!((note.string_num, note.fret, note.pitch), (1, 0, 59));
    }

    #[test]
    fn test_drag_cannot_pass_track_start_or_top_lane() {
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 0, 480));

        drag(
            &mut track,
            PointerEvent::primary(5.0, 30.0),
            PointerEvent::primary(-200.0, -200.0),
        );
        let note = track.get_note(id).unwrap();
        assert_eq!((note.start, note.string_num, note.pitch), (0, 0, 64));
    }

    #[test]
    fn test_drag_right_edge_lengthens() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 0, 480));

        track.pointer_down(PointerEvent::primary(17.0, 30.0), &g, &mut NullSurface);
        assert_eq!(track.drag_state(), DragState::Lengthen { note: id });
        track.pointer_move(PointerEvent::primary(60.0, 30.0), &g, &mut NullSurface);
        assert_eq!(track.get_note(id).unwrap().duration, 1440);

        // never shorter than one grid unit
        track.pointer_move(PointerEvent::primary(2.0, 30.0), &g, &mut NullSurface);
        assert_eq!(track.get_note(id).unwrap().duration, 480);
        track.pointer_up(PointerEvent::primary(2.0, 30.0), &g, &mut NullSurface);
        assert_eq!(track.get_note(id).unwrap().start, 0);
    }

    #[test]
    fn test_secondary_drag_sets_velocity() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 0, 480));
        let mut log = RenderLog::new();

        track.pointer_down(PointerEvent::secondary(5.0, 30.0), &g, &mut log);
        assert_eq!(track.selection().ids(), &[id]);
        track.pointer_move(PointerEvent::secondary(5.0, 20.0), &g, &mut log);
        assert_eq!(track.get_note(id).unwrap().velocity, 110);
        track.pointer_move(PointerEvent::secondary(5.0, -200.0), &g, &mut log);
        assert_eq!(track.get_note(id).unwrap().velocity, 127);
        let outcome = track.pointer_up(PointerEvent::secondary(5.0, -200.0), &g, &mut log);
        assert_eq!(outcome, PointerOutcome::Audition);

        let indicator: Vec<_> = log
            .events()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::VelocityIndicator(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(indicator, vec![Some(100), Some(110), Some(127), None]);
    }

    #[test]
    fn test_ctrl_click_also_sets_velocity() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 0, 480));
        track.pointer_down(PointerEvent::primary(5.0, 30.0).with_ctrl(), &g, &mut NullSurface);
        track.pointer_move(PointerEvent::primary(5.0, 80.0), &g, &mut NullSurface);
        assert_eq!(track.get_note(id).unwrap().velocity, 50);
    }

    #[test]
    fn test_velocity_click_replaces_selection() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let first = track.load_note(Note::new(64, 100, 0, 480));
        let second = track.load_note(Note::new(64, 100, 960, 480));
        track.select_note(first, &g, &mut NullSurface);

        // second note starts at x 37.5 on the top line
        track.pointer_down(PointerEvent::secondary(40.0, 30.0), &g, &mut NullSurface);
        assert_eq!(track.selection().ids(), &[second]);
        assert!(!track.get_note(first).unwrap().is_selected);
    }

    #[test]
    fn test_velocity_drag_stops_at_one() {
        let g = grid();
        let mut track = Track::new("Test", 0);
        let id = track.load_note(Note::new(64, 100, 0, 480));
        track.pointer_down(PointerEvent::secondary(5.0, 30.0), &g, &mut NullSurface);
        track.pointer_move(PointerEvent::secondary(5.0, 300.0), &g, &mut NullSurface);
        assert_eq!(track.get_note(id).unwrap().velocity, MIN_VELOCITY);
    }

    #[test]
    fn test_alt_drag_duplicates_selection() {
        let mut track = Track::new("Test", 0);
        let original = track.load_note(Note::new(64, 100, 0, 480));

        drag(
            &mut track,
            PointerEvent::primary(5.0, 30.0).with_alt(),
            PointerEvent::primary(45.0, 30.0).with_alt(),
        );
        assert_eq!(track.note_count(), 2);
        assert_eq!(track.get_note(original).unwrap().start, 0);
        assert!(!track.selection().contains(original));
        let copy = track.selected_notes().next().unwrap();
        assert_eq!(copy.start, 960);
        assert!(copy.from_clipboard);
    }

    #[test]
    fn test_new_drum_hit_keeps_one_grid_unit() {
        let mut track = Track::new("Drums", 9);
        track.set_track_type(TrackType::Drums, 0);

        // kick lane
        let y = 30.0 + 7.0 * 20.0;
        drag(
            &mut track,
            PointerEvent::primary(5.0, y),
            PointerEvent::primary(6.0, y),
        );
        assert_eq!(track.note_count(), 1);
        let note = &track.notes()[0];
        assert_eq!((note.pitch, note.duration), (36, 480));
    }
}

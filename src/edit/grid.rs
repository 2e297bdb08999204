//! Tick <-> pixel and pixel <-> lane conversions.
//!
//! All geometry in the editor goes through a [`GridMapper`]. It is a small
//! `Copy` value built from the session's measure size and resolution plus the
//! track's grid fraction, so nothing about the current zoom level lives in
//! global state.

use crate::midi::{Note, TrackType, BEATS_PER_MEASURE};
use serde::{Deserialize, Serialize};

/// Fraction of a grid unit past which snapping moves to the next grid line.
pub const SNAP_FORWARD_THRESHOLD: f64 = 0.7;

/// Tolerance for float error when counting whole grid units in a width.
const GRID_EPSILON: f64 = 1e-9;

/// A point in track pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in track pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NoteRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanning two corner points in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Edges count as inside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Touching rectangles count as intersecting, so zero-width notes can
    /// still be rubber-band selected.
    pub fn intersects(&self, other: &NoteRect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }
}

/// Vertical layout of lanes inside a track's drawing area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneLayout {
    /// Distance from the top of the drawing area to lane 0.
    pub top_margin: f64,
    /// Distance between two adjacent lanes.
    pub line_spacing: f64,
    /// Height of a note box, centred on its lane.
    pub note_height: f64,
}

impl Default for LaneLayout {
    fn default() -> Self {
        Self {
            top_margin: 30.0,
            line_spacing: 20.0,
            note_height: 14.0,
        }
    }
}

/// Converts between musical time and track pixel space.
///
/// 4/4 is the only supported meter, so a measure is always
/// `resolution * 4` ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapper {
    /// Pixels per measure.
    pub measure_size: f64,
    /// Ticks per quarter note.
    pub resolution: u16,
    /// Snapping granularity as a fraction of one measure (0.125 = eighth notes).
    pub grid_fraction: f64,
    pub layout: LaneLayout,
}

impl GridMapper {
    pub fn new(measure_size: f64, resolution: u16, grid_fraction: f64, layout: LaneLayout) -> Self {
        Self {
            measure_size,
            resolution,
            grid_fraction,
            layout,
        }
    }

    pub fn ticks_per_measure(&self) -> u32 {
        self.resolution as u32 * BEATS_PER_MEASURE
    }

    /// Width of one grid unit in pixels.
    pub fn grid_size(&self) -> f64 {
        self.grid_fraction * self.measure_size
    }

    /// Length of one grid unit in ticks. Never zero.
    pub fn ticks_per_grid(&self) -> u32 {
        ((self.ticks_per_measure() as f64 * self.grid_fraction).round() as u32).max(1)
    }

    pub fn tick_to_x(&self, tick: u32) -> f64 {
        tick as f64 / self.ticks_per_measure() as f64 * self.measure_size
    }

    /// Grid unit index for `x`.
    ///
    /// Snapping is biased toward the earlier grid line: the cursor has to be
    /// more than 70% of the way into a unit before it snaps forward.
    pub fn snap_units(&self, x: f64) -> i64 {
        let grid_size = self.grid_size();
        if grid_size <= 0.0 || x <= 0.0 {
            return 0;
        }
        let dist = x / grid_size;
        let fraction = dist - dist.floor();
        if fraction > SNAP_FORWARD_THRESHOLD {
            dist.ceil() as i64
        } else {
            dist.floor() as i64
        }
    }

    /// `x` snapped to a grid line, in pixels.
    pub fn snap_x(&self, x: f64) -> f64 {
        self.snap_units(x) as f64 * self.grid_size()
    }

    /// `x` snapped to a grid line, in ticks.
    pub fn x_to_snapped_tick(&self, x: f64) -> u32 {
        let units = self.snap_units(x).clamp(0, u32::MAX as i64) as u32;
        units.saturating_mul(self.ticks_per_grid())
    }

    /// Converts a drawn width into a duration made of whole grid units, so
    /// width and duration never drift apart across repeated resizes.
    pub fn width_to_duration(&self, width: f64) -> u32 {
        let grid_size = self.grid_size();
        if grid_size <= 0.0 || width <= 0.0 {
            return 0;
        }
        let grids_in = (width / grid_size + GRID_EPSILON).floor() as u32;
        grids_in.saturating_mul(self.ticks_per_grid())
    }

    /// Lane under `y`, clamped to the track's lanes.
    pub fn y_to_lane(&self, y: f64, num_lanes: usize) -> usize {
        let spacing = self.layout.line_spacing.max(1.0);
        let lane = ((y - self.layout.top_margin) / spacing).round();
        let max_lane = num_lanes.saturating_sub(1) as f64;
        lane.clamp(0.0, max_lane) as usize
    }

    /// Top edge of a note box on `lane`.
    pub fn lane_to_y(&self, lane: usize) -> f64 {
        self.layout.top_margin + lane as f64 * self.layout.line_spacing
            - self.layout.note_height / 2.0
    }

    /// Projects a note into pixel space.
    pub fn note_rect(&self, note: &Note, track_type: TrackType) -> NoteRect {
        let width = track_type
            .note_draw_width()
            .unwrap_or_else(|| self.tick_to_x(note.duration));
        NoteRect {
            x: self.tick_to_x(note.start),
            y: self.lane_to_y(note.string_num),
            width,
            height: self.layout.note_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> GridMapper {
        GridMapper::new(150.0, 960, 0.125, LaneLayout::default())
    }

    #[test]
    fn test_tick_to_x() {
        let grid = mapper();
        assert_eq!(grid.ticks_per_measure(), 3840);
        assert_eq!(grid.tick_to_x(0), 0.0);
        assert_eq!(grid.tick_to_x(3840), 150.0);
        assert_eq!(grid.tick_to_x(1920), 75.0);
    }

    #[test]
    fn test_snap_threshold_boundary() {
        let grid = mapper();
        assert_eq!(grid.grid_size(), 18.75);
        // 71% into the first unit snaps forward
        assert_eq!(grid.snap_units(0.71 * 18.75), 1);
        assert_eq!(grid.snap_x(0.71 * 18.75), 18.75);
        // 69% stays on the current line
        assert_eq!(grid.snap_units(0.69 * 18.75), 0);
        assert_eq!(grid.snap_x(0.69 * 18.75), 0.0);
        // exactly 70% (0.7 * 18.75) is not past the threshold
        assert_eq!(grid.snap_units(13.125), 0);
        assert_eq!(grid.snap_x(13.125), 0.0);
        // same behavior further along the grid
        assert_eq!(grid.snap_units(3.0 * 18.75 + 0.69 * 18.75), 3);
        assert_eq!(grid.snap_units(3.0 * 18.75 + 0.71 * 18.75), 4);
    }

    #[test]
    fn test_snapped_tick() {
        let grid = mapper();
        assert_eq!(grid.ticks_per_grid(), 480);
        assert_eq!(grid.x_to_snapped_tick(40.0), 960);
        assert_eq!(grid.x_to_snapped_tick(-5.0), 0);
    }

    #[test]
    fn test_width_to_duration_whole_units() {
        let grid = mapper();
        assert_eq!(grid.width_to_duration(18.75), 480);
        assert_eq!(grid.width_to_duration(37.5), 960);
        // partial units are dropped
        assert_eq!(grid.width_to_duration(30.0), 480);
        assert_eq!(grid.width_to_duration(10.0), 0);
        assert_eq!(grid.width_to_duration(0.0), 0);
    }

    #[test]
    fn test_y_to_lane_rounds_and_clamps() {
        let grid = mapper();
        assert_eq!(grid.y_to_lane(30.0, 6), 0);
        assert_eq!(grid.y_to_lane(39.0, 6), 0);
        assert_eq!(grid.y_to_lane(41.0, 6), 1);
        assert_eq!(grid.y_to_lane(-100.0, 6), 0);
        assert_eq!(grid.y_to_lane(1000.0, 6), 5);
        assert_eq!(grid.y_to_lane(1000.0, 4), 3);
    }

    #[test]
    fn test_note_rect_projection() {
        let grid = mapper();
        let mut note = Note::new(64, 100, 1920, 960);
        note.string_num = 2;

        let rect = grid.note_rect(&note, TrackType::Guitar);
        assert_eq!(rect.x, 75.0);
        assert_eq!(rect.width, 37.5);
        assert_eq!(rect.y, 30.0 + 40.0 - 7.0);
        assert_eq!(rect.height, 14.0);

        let drum = grid.note_rect(&note, TrackType::Drums);
        assert_eq!(drum.width, 10.0);
    }

    #[test]
    fn test_projection_follows_measure_size() {
        let mut grid = mapper();
        let note = Note::new(64, 100, 3840, 1920);
        assert_eq!(grid.note_rect(&note, TrackType::Guitar).x, 150.0);
        grid.measure_size = 300.0;
        let rect = grid.note_rect(&note, TrackType::Guitar);
        assert_eq!(rect.x, 300.0);
        assert_eq!(rect.width, 150.0);
    }

    #[test]
    fn test_rect_helpers() {
        let rect = NoteRect::from_corners(Point::new(50.0, 40.0), Point::new(10.0, 10.0));
        assert_eq!(rect, NoteRect::new(10.0, 10.0, 40.0, 30.0));
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains(Point::new(51.0, 20.0)));

        let zero_width = NoteRect::new(20.0, 15.0, 0.0, 14.0);
        assert!(rect.intersects(&zero_width));
        assert!(!rect.intersects(&NoteRect::new(60.0, 10.0, 5.0, 5.0)));
    }
}

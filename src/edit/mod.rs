//! Note geometry, selection, and mouse-driven editing.

mod grid;
mod interaction;
mod selection;

pub use grid::{GridMapper, LaneLayout, NoteRect, Point, SNAP_FORWARD_THRESHOLD};
pub use interaction::{
    DragState, Modifiers, PointerButton, PointerEvent, PointerOutcome, LENGTHEN_HANDLE_WIDTH,
};
pub use selection::Selection;

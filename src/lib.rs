//! tabedit - A guitar, bass and drum tablature editor core.
//!
//! This library holds everything behind the editor's window: the song model,
//! MIDI import and export, the tick/pixel grid, mouse-driven note editing and
//! the session that ties them to a playback clock and a render surface.

pub mod edit;
pub mod error;
pub mod midi;
pub mod playback;
pub mod prefs;
pub mod render;
pub mod session;

// Re-export commonly used types
pub use edit::{GridMapper, PointerEvent, PointerOutcome};
pub use error::EditorError;
pub use midi::{Note, NoteId, Song, Track, TrackId, TrackType};
pub use playback::{ManualClock, PlaybackClock, TransportClock};
pub use prefs::Preferences;
pub use render::{NullSurface, RenderSurface};
pub use session::{EditorSession, SessionConfig};

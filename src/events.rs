use tokio::sync::oneshot;

use crate::media::Playlist;

/// The four hardware lines, named by what they do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Quit,
    TogglePause,
    ReturnToMenu,
    DecrementDwell,
}

/// Raw input as produced by the window (touch) and button threads. Consumed
/// by the engine at its poll points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// Pointer or finger released at surface coordinates.
    Touch { x: i32, y: i32 },
    /// Debounced press edge on a hardware line.
    Button(Button),
    /// Signal or window close; handled like quit.
    Interrupt,
}

/// Request sent to the loader worker; the rebuilt playlist comes back on `reply`.
#[derive(Debug)]
pub struct LoadRequest {
    pub reply: oneshot::Sender<Playlist>,
}

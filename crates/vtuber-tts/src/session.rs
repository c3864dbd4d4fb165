//! Per-response TTS session.

use uuid::Uuid;

use crate::filter::FilterState;

/// One streamed response on its way to speech.
///
/// Owns the bracket-suppression state for that response. The dispatcher takes
/// `&mut TtsSession`, so fragments of a session are always filtered one at a
/// time and in submission order. Sessions share nothing with each other.
#[derive(Debug, Clone)]
pub struct TtsSession {
    id: Uuid,
    pub filter: FilterState,
}

impl TtsSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            filter: FilterState::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start a new response on this handle: fresh id, filter back to speaking.
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.filter.reset();
    }
}

impl Default for TtsSession {
    fn default() -> Self {
        Self::new()
    }
}

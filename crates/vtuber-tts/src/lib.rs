//! Text-to-speech pipeline: speakable-text filtering, synthesis backends,
//! audio cache files, and the dispatcher tying them together.

pub mod backend;
pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod session;

pub use backend::{SiliconFlowBackend, SynthesisBackend, backend_from_config};
pub use cache::AudioCache;
pub use dispatcher::{AudioDispatcher, SynthesisTicket};
pub use error::{Result, TtsError};
pub use filter::FilterState;
pub use session::TtsSession;

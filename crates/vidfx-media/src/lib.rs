// crates/vidfx-media/src/lib.rs
//
// No UI dependency — the host application talks to the export pipeline
// via channels (drained through ExportQueue::poll) and to the playback
// engine via direct calls on its own loop.

pub mod audio;
pub mod decode;
pub mod effects;
pub mod encode;
pub mod engine;
pub mod export;
pub mod frame;
pub mod orchestrator;
pub mod remux;

// Re-export the main public API so host imports stay simple.
pub use decode::VideoSource;
pub use effects::EffectCache;
pub use engine::{FrameEngine, FrameSource};
pub use export::{ExportJob, ExportQueue};
pub use frame::{Channels, Frame};
pub use orchestrator::{Orchestrator, PlaybackMode};
pub use remux::{RemuxConfig, RemuxOutcome};
pub use vidfx_core::media_types::{ExportStatus, ExportUpdate};

// crates/vidfx-core/src/lib.rs
//
// Plain data types shared between vidfx-media and the host application.
// No ffmpeg, no UI toolkit — everything here crosses a channel or a crate
// boundary and must stay dependency-light.

pub mod clock;
pub mod effect;
pub mod helpers;
pub mod media_types;
pub mod player;

pub use clock::PlaybackClock;
pub use effect::EffectKind;
pub use media_types::{ExportStatus, ExportUpdate};
pub use player::{MediaPlayer, VideoTrack};

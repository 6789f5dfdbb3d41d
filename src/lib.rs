//! p3a-playback is the playback engine of a pixel-art display panel.
//!
//! It keeps two buffer slots: the front slot is decoded, upscaled and paced onto the panel every
//! tick while the back slot is loaded and prefetched in the background, so a transition to the
//! next artwork only costs a slot exchange.
//!
//! - Build a [`PlaybackEngine`] from a [`PlaybackConfig`], a [`Navigator`] and a [`Display`]
//! - Drive it through the non-blocking control surface (`request_swap_*`, pause, UI mode)
//! - Observe progress through [`PlaybackEngine::status`] or the [`LiveCoordinator`] callbacks
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Per-format codecs and the factory that opens them.
pub mod codec;
/// Static configuration and runtime settings.
pub mod config;
/// Display boundary.
pub mod display;
/// Engine aggregate and control surface.
pub mod engine;
/// Live Mode alignment, coordination and scheduled swaps.
pub mod live;
pub(crate) mod loader;
/// Catalog navigation.
pub mod navigator;
pub(crate) mod overlay;
pub(crate) mod prefetch;
pub(crate) mod presenter;
/// Failure recovery policy and asset health.
pub mod recovery;
/// Buffer slot state machine.
pub mod slot;
/// Storage boundary.
pub mod storage;
/// Nearest-neighbour upscaling onto the panel.
pub mod upscale;

pub use crate::foundation::clock::{Clock, ManualClock, SystemClock};
pub use crate::foundation::core::{
    Alignment, ArtworkRef, AssetKind, AssetSource, ContentId, PanelSize, Rgb8, Rotation,
    SwapIntent,
};
pub use crate::foundation::error::{PlaybackError, PlaybackResult};

pub use crate::codec::{Codec, CodecFactory, CodecInfo, ImageCodecFactory, PixelFormat};
pub use crate::config::{PlaybackConfig, RuntimeSettings};
pub use crate::display::{Display, FrameSource, MemoryDisplay};
pub use crate::engine::{EngineBuilder, EngineStatus, PlaybackEngine, PlaybackStats};
pub use crate::live::schedule::{SwapFuture, SwapSchedule};
pub use crate::live::{LiveCoordinator, ViewTracker};
pub use crate::navigator::{Navigator, PlaylistNavigator};
pub use crate::recovery::health::HealthRegistry;
pub use crate::slot::SlotPhase;
pub use crate::storage::{FsStorage, Storage};

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
pub(crate) mod test_support;

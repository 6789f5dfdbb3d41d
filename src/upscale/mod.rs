pub(crate) mod blit;
/// Source and panel frame buffers.
pub mod frame;
/// Aspect-preserving lookup tables.
pub mod lookup;
/// Persistent two-worker upscale pool.
pub mod pool;

pub use frame::{FrameBuffer, NativeFrame, PANEL_BYTES_PER_PIXEL};
pub use lookup::UpscaleTables;
pub use pool::{UpscaleOutcome, UpscalePoolOpts, UpscaleWorkerPool};

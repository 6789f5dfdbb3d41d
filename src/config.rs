use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use crate::foundation::core::{PanelSize, Rgb8, Rotation};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::overlay::MIN_NOTICE_SIZE;

/// Static engine configuration, usually read from a JSON file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Native panel resolution.
    pub panel: PanelSize,
    /// Rotation applied at startup.
    pub rotation: Rotation,
    /// Background color used for letterbox borders and transparency.
    pub background: Rgb8,
    /// Root of the background-downloaded content area, if any.
    pub vault_root: Option<PathBuf>,
    /// How long to wait for both upscale workers before presenting anyway.
    pub upscale_join_timeout_ms: u64,
    /// Dwell applied when an artwork has no override. `0` disables auto-advance.
    pub default_dwell_ms: u64,
    /// Upper bound on waiting for a concurrent prefetch before the back slot is cleared.
    pub unload_wait_timeout_ms: u64,
    /// Cadence of the presenter while paused, idle or in UI mode.
    pub idle_tick_ms: u64,
    /// Cores the two upscale workers are pinned to.
    pub worker_cores: Option<[usize; 2]>,
    /// Core the presenter is pinned to.
    pub presenter_core: Option<usize>,
    /// Shuffle directory playlists.
    pub shuffle: bool,
    /// Seed used when shuffling.
    pub shuffle_seed: u64,
    /// Draw the swap-progress triangle while an intentional swap is in flight.
    pub swap_notice: bool,
    /// Leg length of the swap-progress triangle in pixels.
    pub swap_notice_size: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            panel: PanelSize::default(),
            rotation: Rotation::Deg0,
            background: Rgb8::BLACK,
            vault_root: None,
            upscale_join_timeout_ms: 50,
            default_dwell_ms: 0,
            unload_wait_timeout_ms: 500,
            idle_tick_ms: 100,
            worker_cores: None,
            presenter_core: None,
            shuffle: false,
            shuffle_seed: 0,
            swap_notice: false,
            swap_notice_size: 32,
        }
    }
}

impl PlaybackConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(s: &str) -> PlaybackResult<Self> {
        let cfg: Self =
            serde_json::from_str(s).map_err(|e| PlaybackError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> PlaybackResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PlaybackError::config(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> PlaybackResult<()> {
        if self.panel.width == 0 || self.panel.height == 0 {
            return Err(PlaybackError::config("panel size must be non-zero"));
        }
        if self.upscale_join_timeout_ms == 0 {
            return Err(PlaybackError::config(
                "upscale_join_timeout_ms must be greater than zero",
            ));
        }
        if self.idle_tick_ms == 0 {
            return Err(PlaybackError::config("idle_tick_ms must be greater than zero"));
        }
        if let Some([a, b]) = self.worker_cores
            && a == b
        {
            return Err(PlaybackError::config(
                "upscale workers must be pinned to distinct cores",
            ));
        }
        if self.swap_notice && self.swap_notice_size < MIN_NOTICE_SIZE {
            return Err(PlaybackError::config(format!(
                "swap_notice_size must be at least {MIN_NOTICE_SIZE}"
            )));
        }
        Ok(())
    }

    pub(crate) fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.upscale_join_timeout_ms)
    }

    pub(crate) fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }
}

/// Settings that may change while the engine runs.
///
/// The background color carries a generation counter that only ever increases, so cached static
/// frames can tell when their compositing is stale.
#[derive(Debug)]
pub struct RuntimeSettings {
    inner: Mutex<SettingsInner>,
}

#[derive(Debug, Clone, Copy)]
struct SettingsInner {
    background: Rgb8,
    background_generation: u64,
    rotation: Rotation,
}

impl RuntimeSettings {
    /// Seed runtime settings from the static configuration.
    pub fn from_config(cfg: &PlaybackConfig) -> Self {
        Self {
            inner: Mutex::new(SettingsInner {
                background: cfg.background,
                background_generation: 0,
                rotation: cfg.rotation,
            }),
        }
    }

    /// Current background color and its generation.
    pub fn background(&self) -> (Rgb8, u64) {
        let inner = self.inner.lock();
        (inner.background, inner.background_generation)
    }

    /// Change the background color. Returns the new generation.
    pub fn set_background(&self, color: Rgb8) -> u64 {
        let mut inner = self.inner.lock();
        if inner.background != color {
            inner.background = color;
            inner.background_generation = inner.background_generation.saturating_add(1);
            tracing::info!(
                r = color.r,
                g = color.g,
                b = color.b,
                generation = inner.background_generation,
                "background color changed"
            );
        }
        inner.background_generation
    }

    /// Current rotation.
    pub fn rotation(&self) -> Rotation {
        self.inner.lock().rotation
    }

    /// Change the rotation. Takes effect on the next presenter tick.
    pub fn set_rotation(&self, rotation: Rotation) {
        let mut inner = self.inner.lock();
        if inner.rotation != rotation {
            tracing::info!(degrees = rotation.degrees(), "rotation changed");
            inner.rotation = rotation;
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;

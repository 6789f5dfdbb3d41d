use std::fmt;
use std::path::{Path, PathBuf};

use crate::foundation::error::{PlaybackError, PlaybackResult};

/// Panel rotation applied when mapping source pixels onto the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// 90 degrees clockwise.
    Deg90,
    /// 180 degrees.
    Deg180,
    /// 270 degrees clockwise.
    Deg270,
}

impl Rotation {
    /// Parse a rotation expressed in degrees. Only right angles are accepted.
    pub fn from_degrees(deg: u32) -> PlaybackResult<Self> {
        match deg {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(PlaybackError::validation(format!(
                "rotation must be 0, 90, 180 or 270 (got {other})"
            ))),
        }
    }

    /// Rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// `true` when source width maps onto panel height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = PlaybackError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_degrees(value)
    }
}

impl From<Rotation> for u32 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// Straight 8-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Opaque black.
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    /// Construct a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels in panel byte order.
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Native panel resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PanelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PanelSize {
    /// Construct a validated, non-empty panel size.
    pub fn new(width: u32, height: u32) -> PlaybackResult<Self> {
        if width == 0 || height == 0 {
            return Err(PlaybackError::validation("panel size must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels on the panel.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

impl Default for PanelSize {
    fn default() -> Self {
        Self {
            width: 720,
            height: 720,
        }
    }
}

/// Asset container format, selected from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// WebP, still or animated.
    Webp,
    /// GIF, usually animated.
    Gif,
    /// PNG, still or APNG.
    Png,
    /// JPEG, always still.
    Jpeg,
}

impl AssetKind {
    /// Detect the asset kind from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Formats that may carry more than one frame.
    pub fn may_animate(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

/// Where an artwork's bytes live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    /// Content that is always present once listed.
    #[default]
    Local,
    /// Background-downloaded content that may not exist yet.
    Vault,
}

/// Opaque identifier used for view tracking.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentId(pub String);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry handed out by a [`crate::Navigator`]. Read-only to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtworkRef {
    /// Position in the catalog, used as the health registry key.
    pub position: usize,
    /// File path.
    pub path: PathBuf,
    /// Container format.
    pub kind: AssetKind,
    /// Storage area, used to classify missing files.
    pub source: AssetSource,
    /// View-tracking identifier, if any.
    pub content_id: Option<ContentId>,
    /// Per-item dwell override in milliseconds.
    pub dwell_override_ms: Option<u64>,
    /// Whether Live Mode may align this entry.
    pub live_eligible: bool,
}

impl ArtworkRef {
    /// Build a local artwork reference, detecting its kind from the extension.
    pub fn local(position: usize, path: impl Into<PathBuf>) -> PlaybackResult<Self> {
        let path = path.into();
        let kind = AssetKind::from_path(&path).ok_or_else(|| {
            PlaybackError::validation(format!("unsupported asset type: {}", path.display()))
        })?;
        Ok(Self {
            position,
            path,
            kind,
            source: AssetSource::Local,
            content_id: None,
            dwell_override_ms: None,
            live_eligible: true,
        })
    }

    /// Same reference, marked as vault-sourced.
    pub fn in_vault(mut self) -> Self {
        self.source = AssetSource::Vault;
        self
    }

    /// `true` for background-downloaded content.
    pub fn is_vault(&self) -> bool {
        self.source == AssetSource::Vault
    }
}

/// Live Mode alignment request carried by a slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Alignment {
    /// Absolute epoch ms at which the asset conceptually started.
    pub start_time_ms: Option<u64>,
    /// Explicit frame to start on. Takes precedence over `start_time_ms`.
    pub start_frame: Option<u32>,
}

impl Alignment {
    /// No alignment: start on frame 0.
    pub const NONE: Self = Self {
        start_time_ms: None,
        start_frame: None,
    };

    /// Align to an explicit frame.
    pub fn frame(start_frame: u32) -> Self {
        Self {
            start_time_ms: None,
            start_frame: Some(start_frame),
        }
    }

    /// Align to a wall-clock start time.
    pub fn since(start_time_ms: u64) -> Self {
        Self {
            start_time_ms: Some(start_time_ms),
            start_frame: None,
        }
    }

    /// `true` when no seek is requested.
    pub fn is_none(&self) -> bool {
        self.start_time_ms.is_none() && self.start_frame.is_none()
    }
}

/// Why a swap was requested, reported to view tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapIntent {
    /// Triggered by a user or remote command.
    #[default]
    Intentional,
    /// Triggered by dwell expiry, schedules or recovery.
    Automated,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

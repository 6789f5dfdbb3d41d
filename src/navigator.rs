use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;

use crate::config::PlaybackConfig;
use crate::foundation::core::{ArtworkRef, AssetKind, ContentId};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::recovery::health::HealthRegistry;

/// Catalog cursor the engine loads from.
///
/// The engine only reads the current entry and moves the cursor; ordering policy belongs to the
/// implementation.
pub trait Navigator: Send + Sync {
    /// Entry at the cursor, or `None` for an empty catalog.
    fn current_artwork(&self) -> Option<ArtworkRef>;
    /// Move to the next entry.
    fn advance(&self);
    /// Move to the previous entry.
    fn go_back(&self);
    /// Move to `position`.
    fn jump_to(&self, position: usize) -> PlaybackResult<()>;
    /// Number of entries.
    fn len(&self) -> usize;
    /// `true` for an empty catalog.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Registry the cursor skips unhealthy entries with. The engine marks load failures in it.
    fn health(&self) -> Option<Arc<HealthRegistry>> {
        None
    }
}

/// In-order (or seeded-shuffle) playlist that cycles past unhealthy entries.
#[derive(Debug)]
pub struct PlaylistNavigator {
    entries: Vec<ArtworkRef>,
    cursor: Mutex<usize>,
    health: Arc<HealthRegistry>,
}

impl PlaylistNavigator {
    /// Playlist over `entries`. Positions are reassigned to match the list order.
    pub fn from_entries(entries: Vec<ArtworkRef>, health: Arc<HealthRegistry>) -> Self {
        let entries: Vec<_> = entries
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.position = i;
                e
            })
            .collect();
        health.resize(entries.len());
        Self {
            entries,
            cursor: Mutex::new(0),
            health,
        }
    }

    /// Playlist of every supported file directly inside `dir`.
    ///
    /// Files are sorted by name, then shuffled when `cfg.shuffle` is set. Files under
    /// `cfg.vault_root` are tagged as vault content with their file stem as content id.
    pub fn from_dir(
        dir: impl AsRef<Path>,
        cfg: &PlaybackConfig,
        health: Arc<HealthRegistry>,
    ) -> PlaybackResult<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| PlaybackError::config(format!("read dir '{}': {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && AssetKind::from_path(p).is_some())
            .collect();
        paths.sort();
        if cfg.shuffle {
            let mut rng = StdRng::seed_from_u64(cfg.shuffle_seed);
            paths.shuffle(&mut rng);
        }

        let entries = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let mut art = ArtworkRef::local(i, path)?;
                if cfg
                    .vault_root
                    .as_deref()
                    .is_some_and(|root| art.path.starts_with(root))
                {
                    art.content_id = art
                        .path
                        .file_stem()
                        .map(|s| ContentId(s.to_string_lossy().into_owned()));
                    art = art.in_vault();
                }
                Ok(art)
            })
            .collect::<PlaybackResult<Vec<_>>>()?;
        tracing::info!(dir = %dir.display(), entries = entries.len(), "playlist loaded");
        Ok(Self::from_entries(entries, health))
    }

    /// All entries in playback order.
    pub fn entries(&self) -> &[ArtworkRef] {
        &self.entries
    }

    /// Cursor position.
    pub fn position(&self) -> usize {
        *self.cursor.lock()
    }
}

impl Navigator for PlaylistNavigator {
    fn current_artwork(&self) -> Option<ArtworkRef> {
        self.entries.get(*self.cursor.lock()).cloned()
    }

    fn advance(&self) {
        let mut cursor = self.cursor.lock();
        *cursor = self.health.next_healthy(*cursor);
    }

    fn go_back(&self) {
        let mut cursor = self.cursor.lock();
        *cursor = self.health.previous_healthy(*cursor);
    }

    fn jump_to(&self, position: usize) -> PlaybackResult<()> {
        if position >= self.entries.len() {
            return Err(PlaybackError::validation(format!(
                "position {position} is outside a playlist of {}",
                self.entries.len()
            )));
        }
        *self.cursor.lock() = position;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn health(&self) -> Option<Arc<HealthRegistry>> {
        Some(Arc::clone(&self.health))
    }
}

#[cfg(test)]
#[path = "../tests/unit/navigator.rs"]
mod tests;

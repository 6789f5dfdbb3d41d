use std::path::Path;
use std::sync::Arc;

use crate::foundation::error::{PlaybackError, PlaybackResult};

/// File access used by the loader and the recovery policy.
pub trait Storage: Send + Sync {
    /// Read a whole file.
    fn read(&self, path: &Path) -> PlaybackResult<Arc<[u8]>>;
    /// `true` if `path` currently exists as a file.
    fn exists(&self, path: &Path) -> bool;
    /// Delete a file.
    fn delete(&self, path: &Path) -> PlaybackResult<()>;
}

/// [`Storage`] over the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> PlaybackResult<Arc<[u8]>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Arc::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PlaybackError::file_missing(path.display().to_string()))
            }
            Err(e) => Err(PlaybackError::decode(format!(
                "read '{}': {e}",
                path.display()
            ))),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn delete(&self, path: &Path) -> PlaybackResult<()> {
        std::fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "deleted file");
        Ok(())
    }
}

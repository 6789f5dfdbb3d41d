/// Result alias used across the playback engine.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Errors produced by the playback engine.
///
/// Loader and prefetch failures never escape as panics: they resolve to an empty back slot plus a
/// recovery decision. Only [`PlaybackError::SwapConflict`] is returned to control-surface callers.
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    /// A vault entry that has not been downloaded yet.
    #[error("file missing: {0}")]
    FileMissing(String),

    /// Bytes could not be read or decoded.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// A well-formed asset that exceeds what the engine is willing to hold in memory.
    #[error("resource limit: {0}")]
    ResourceLimit(String),

    /// The first-frame decode or upscale of the back slot failed.
    #[error("prefetch failure: {0}")]
    PrefetchFailure(String),

    /// Upscale workers did not finish within the join timeout.
    #[error("upscale timeout: {0}")]
    UpscaleTimeout(String),

    /// A navigation request arrived while another one is in flight.
    #[error("swap conflict: {0}")]
    SwapConflict(String),

    /// A Live Mode seek failed and playback starts from frame 0.
    #[error("alignment fallback: {0}")]
    AlignmentFallback(String),

    /// The codec has no more frames until it is reset.
    #[error("end of stream")]
    EndOfStream,

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid argument or state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Underlying IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaybackError {
    /// Construct [`PlaybackError::FileMissing`].
    pub fn file_missing(path: impl Into<String>) -> Self {
        Self::FileMissing(path.into())
    }

    /// Construct [`PlaybackError::DecodeFailure`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure(msg.into())
    }

    /// Construct [`PlaybackError::ResourceLimit`].
    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    /// Construct [`PlaybackError::PrefetchFailure`].
    pub fn prefetch(msg: impl Into<String>) -> Self {
        Self::PrefetchFailure(msg.into())
    }

    /// Construct [`PlaybackError::UpscaleTimeout`].
    pub fn upscale_timeout(msg: impl Into<String>) -> Self {
        Self::UpscaleTimeout(msg.into())
    }

    /// Construct [`PlaybackError::SwapConflict`].
    pub fn swap_conflict(msg: impl Into<String>) -> Self {
        Self::SwapConflict(msg.into())
    }

    /// Construct [`PlaybackError::AlignmentFallback`].
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::AlignmentFallback(msg.into())
    }

    /// Construct [`PlaybackError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Construct [`PlaybackError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Soft errors are logged as warnings and never change slot state.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::UpscaleTimeout(_) | Self::AlignmentFallback(_) | Self::SwapConflict(_)
        )
    }

    /// `true` when this failure should mark the catalog entry unhealthy.
    pub fn marks_unhealthy(&self) -> bool {
        !matches!(self, Self::FileMissing(_)) && !self.is_soft()
    }
}

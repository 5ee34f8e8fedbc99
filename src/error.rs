/// Error types for the filter core
///
/// Kernel and plan computation fail locally and synchronously; nothing is
/// partially applied when one of these is returned.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    /// Undefined (algorithm, pass) pair, unsupported kernel size, or a
    /// parameter update aimed at a filter that is not active
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A render or read-back was requested before an image was loaded
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Device, pipeline or read-back failure reported by the GPU backend
    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl FilterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        Self::ResourceUnavailable(message.into())
    }
}

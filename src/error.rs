use thiserror::Error;

pub type Result<T> = std::result::Result<T, GanError>;

/// Primary error type for all burn-gan operations.
#[derive(Debug, Clone, Error)]
pub enum GanError {
    // ========== Initialization ==========
    /// The numerical framework could not be located.
    #[error(
        "{name} is not available. Note that {name} is an optional dependency of burn-gan \
         and is not installed alongside it, so that users can pick the backend build that \
         fits their hardware. Please install the most recent version of {name} by following \
         the instructions at {install_url}"
    )]
    FrameworkMissing { name: String, install_url: String },

    /// The framework is present but older than the pinned minimum.
    #[error(
        "burn-gan requires {name} version >= {required}; detected an installation of \
         version {detected}. Please upgrade {name} to proceed"
    )]
    FrameworkTooOld {
        name: String,
        required: String,
        detected: String,
    },

    /// A version string could not be parsed as dotted integers.
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),

    // ========== Data ==========
    /// The registry has no partition under the requested name.
    #[error("split not found: {split}")]
    SplitNotFound { split: String },

    /// The split exists but holds no usable samples.
    #[error("split {split} contains no usable samples")]
    EmptySplit { split: String },

    /// A caller-supplied parameter violates the provider contract.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ========== I/O ==========
    #[error("image error: {message}")]
    Image { message: String },

    #[error("i/o error: {message}")]
    Io { message: String },

    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("tensor readout failed: {message}")]
    TensorRead { message: String },
}

impl From<std::io::Error> for GanError {
    fn from(err: std::io::Error) -> Self {
        GanError::Io {
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for GanError {
    fn from(err: image::ImageError) -> Self {
        GanError::Image {
            message: err.to_string(),
        }
    }
}

impl From<burn::record::RecorderError> for GanError {
    fn from(err: burn::record::RecorderError) -> Self {
        GanError::Checkpoint {
            message: err.to_string(),
        }
    }
}

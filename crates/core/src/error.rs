//! Error type shared by every filter operation.
//!
//! Cancellation is the only condition a caller is expected to recover from;
//! everything else means the inputs or the configuration were unusable.

/// Errors returned by filter construction and solve calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// A cancellation request was observed before a sweep or reduction started.
    #[error("filter run was cancelled")]
    Cancelled,

    /// The worker pool has been shut down; the filter can no longer solve.
    #[error("worker pool has been shut down")]
    PoolShutDown,

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    PoolBuild(String),

    /// A configuration value is outside its accepted range.
    #[error("invalid configuration '{param}': {message}")]
    InvalidConfig {
        /// Name of the offending field
        param: &'static str,
        /// What the field must satisfy
        message: String,
    },

    /// Two grids (or a grid and a lane) that must agree in shape do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected `(width, height)`
        expected: (usize, usize),
        /// Actual `(width, height)`
        actual: (usize, usize),
    },

    /// A lane has fewer points than the three-point scheme needs.
    #[error("grid too small: lanes need at least {min} points, got {actual}")]
    GridTooSmall {
        /// Minimum lane length
        min: usize,
        /// Actual lane length
        actual: usize,
    },

    /// Rows handed to `Grid::from_rows` have different lengths.
    #[error("row {row} has {actual} values, expected {expected}")]
    RaggedRows {
        /// Index of the first offending row
        row: usize,
        /// Length of row 0
        expected: usize,
        /// Length of the offending row
        actual: usize,
    },

    /// A pivot of the tridiagonal elimination vanished (or is not finite).
    #[error("singular tridiagonal system at lane index {index}")]
    SingularSystem {
        /// Lane index whose pivot vanished
        index: usize,
    },
}

impl FilterError {
    /// Create error for an out-of-range configuration value.
    pub fn invalid_config(param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param,
            message: message.into(),
        }
    }

    /// Whether this error is the cooperative cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

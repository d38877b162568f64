use std::path::PathBuf;

use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within saga.
///
/// Configuration errors (registry mismatches, shape inference failures) and
/// recoverable I/O errors share one enum so `?` works across the workspace.
/// The graph-construction convenience paths turn the former into panics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A named tensor was requested again with a different shape.
    #[error("shape mismatch for {name:?}: expected {expected}, got {got}")]
    ShapeMismatch {
        name: Option<String>,
        expected: Shape,
        got: Shape,
    },

    /// A named tensor was requested again with a different data type.
    #[error("dtype mismatch for {name:?}: expected {expected}, got {got}")]
    DTypeMismatch {
        name: Option<String>,
        expected: DType,
        got: DType,
    },

    /// Two tensors taking part in a copy or compare hold different element counts.
    #[error("element count mismatch: expected {expected}, got {got}")]
    ElementCountMismatch { expected: usize, got: usize },

    /// Tensors are limited to eight dimensions.
    #[error("rank {rank} too high (max {max})")]
    RankTooHigh { rank: usize, max: usize },

    /// Element or byte count of a shape does not fit in `usize`.
    #[error("dimensions {0} too large")]
    DimensionsTooLarge(Shape),

    /// Storage buffer count must be 1 or 2.
    #[error("invalid buffer count {0}, must be 1 or 2")]
    InvalidBufferCount(usize),

    /// The requested data type is not supported by this operation.
    #[error("unsupported data type {dtype} for {context}")]
    UnsupportedDType { dtype: DType, context: &'static str },

    /// A node's output shape could not be computed.
    #[error("can't compute output tensor for {kind}: {reason}")]
    ShapeInference { kind: String, reason: String },

    /// Filesystem failure, carrying the offending path.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File does not start with the tensor file magic.
    #[error("{}: not a saga tensor file", .0.display())]
    NotATensorFile(PathBuf),

    /// File ends before the header or payload is complete.
    #[error("{}: file too short, need {need} bytes, have {have}", path.display())]
    Truncated {
        path: PathBuf,
        need: usize,
        have: usize,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience Result type used throughout saga.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

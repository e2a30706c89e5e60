use crate::shape::Shape;

/// All errors that can occur within Ember.
///
/// Validation errors (shapes, axes, strides, operand types) are always
/// detected before the engine is asked to build anything, so a caller can
/// correct its arguments and retry. `UseAfterRelease` and `Engine` are fatal:
/// see [`Error::is_fatal`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Operand outside the closed element type set, or an operand combination
    /// the operation does not accept (e.g. two plain scalars, float indices).
    #[error("unsupported operand type: {0}")]
    UnsupportedOperandType(String),

    /// Incompatible dimensions for a binary, concat, matmul or reshape op.
    #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A per-dimension argument has the wrong number of entries.
    #[error("rank mismatch in {op}: expected {expected} entries, got {got}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// Axis argument outside `[0, rank)` or otherwise illegal.
    #[error("dimension out of range in {op}: dim {dim} for tensor with {rank} dimensions")]
    DimensionOutOfRange {
        op: &'static str,
        dim: isize,
        rank: usize,
    },

    /// Contradiction between stride sign and start/end in a slice.
    #[error("invalid slice range in dim {dim}: start {start}, end {end}, stride {stride}")]
    InvalidSliceRange {
        dim: usize,
        start: isize,
        end: isize,
        stride: isize,
    },

    /// A stride entry that can never advance (zero, or negative where only
    /// forward traversal is allowed).
    #[error("invalid stride in {op}: dim {dim} has stride {stride}")]
    InvalidStride {
        op: &'static str,
        dim: usize,
        stride: isize,
    },

    /// Axes argument is not a bijection on `[0, rank)`.
    #[error("invalid permutation: {0:?}")]
    InvalidPermutation(Vec<usize>),

    /// Convolution, slide or window kernel exceeds the input.
    #[error("kernel too large in dim {dim}: kernel size {kernel}, input size {size}")]
    KernelTooLarge {
        dim: usize,
        kernel: usize,
        size: usize,
    },

    /// Collation was asked to batch zero items.
    #[error("cannot collate an empty batch")]
    EmptyBatch,

    /// A graph node was used after it was released.
    #[error("graph node used after release")]
    UseAfterRelease,

    /// Integer division of two in-process scalars by zero.
    #[error("integer division by zero")]
    DivisionByZero,

    /// Shapes must have at least one dimension.
    #[error("shape must have at least one dimension")]
    EmptyShape,

    /// Host data length does not match the requested shape.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Fatal condition reported by the execution engine.
    #[error("engine failure: {0}")]
    Engine(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Create an engine failure.
    pub fn engine(s: impl Into<String>) -> Self {
        Error::Engine(s.into())
    }

    /// Fatal errors terminate the operation and must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UseAfterRelease | Error::Engine(_))
    }
}

/// Convenience Result type used throughout Ember.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(Error::UseAfterRelease.is_fatal());
        assert!(Error::engine("device lost").is_fatal());
        assert!(!Error::EmptyBatch.is_fatal());
        assert!(!Error::InvalidPermutation(vec![0, 0]).is_fatal());
    }

    #[test]
    fn test_display() {
        let e = Error::ShapeMismatch {
            op: "concat",
            lhs: Shape::from((2, 3)),
            rhs: Shape::from((2, 4)),
        };
        assert_eq!(e.to_string(), "shape mismatch in concat: [2, 3] vs [2, 4]");
    }
}

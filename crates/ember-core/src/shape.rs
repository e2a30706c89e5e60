use std::fmt;

use crate::error::{Error, Result};

// Shape — dimension sizes of a graph node
//
// Every node in the graph has a shape of rank >= 1. There is no rank-0
// shape: a single value is `[1]`. For example:
//   - Vector: Shape([5])         — 1 dimension, 5 elements
//   - Matrix: Shape([3, 4])      — 2 dimensions, 12 elements
//   - Batch:  Shape([2, 3, 4])   — 3 dimensions, 24 elements
//
// A dimension of size 0 is representable (element count 0); operations that
// would produce one usually reject it before construction.

/// N-dimensional shape of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// Like [`Shape::new`], but rejects rank 0.
    pub fn checked(dims: Vec<usize>) -> Result<Self> {
        if dims.is_empty() {
            return Err(Error::EmptyShape);
        }
        Ok(Shape(dims))
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Compute the contiguous (row-major / C-order) strides for this shape.
    ///
    /// For shape [2, 3, 4], strides are [12, 4, 1].
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.rank()];
        if self.rank() > 0 {
            strides[self.rank() - 1] = 1;
            for i in (0..self.rank() - 1).rev() {
                strides[i] = strides[i + 1] * self.0[i + 1];
            }
        }
        strides
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> Result<usize> {
        self.0.get(d).copied().ok_or(Error::DimensionOutOfRange {
            op: "dim",
            dim: d as isize,
            rank: self.rank(),
        })
    }

    /// Size of the last dimension (0 for an empty shape).
    pub fn last(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    /// True if `prefix` equals the leading dimensions of this shape.
    pub fn starts_with(&self, prefix: &Shape) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True if `suffix` equals the trailing dimensions of this shape.
    pub fn ends_with(&self, suffix: &Shape) -> bool {
        self.0.ends_with(&suffix.0)
    }

    /// Consume into the underlying vector.
    pub fn into_dims(self) -> Vec<usize> {
        self.0
    }

    /// Row-major multi-index of flat position `flat`.
    pub fn unravel(&self, mut flat: usize) -> Vec<usize> {
        let mut idx = vec![0usize; self.rank()];
        for d in (0..self.rank()).rev() {
            let size = self.0[d].max(1);
            idx[d] = flat % size;
            flat /= size;
        }
        idx
    }

    /// Flat row-major position of multi-index `idx`.
    pub fn ravel(&self, idx: &[usize]) -> usize {
        idx.iter()
            .zip(self.stride_contiguous())
            .map(|(i, s)| i * s)
            .sum()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// Convenient From implementations
// These let you write: Shape::from((3, 4)) instead of Shape::new(vec![3, 4])

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(a: [usize; N]) -> Self {
        Shape(a.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}

use crate::error::{Error, Result};
use crate::shape::Shape;

// Shape & stride algebra
//
// Pure functions that validate the arguments of a shape-changing operation
// and compute the shape of its result. Nothing here touches the engine: the
// dispatcher calls these first, so every argument error is reported before a
// node is constructed.
//
// Conventions:
//   - Axis arguments are signed. A negative axis counts from the end
//     (-1 is the last dimension) and is resolved with `resolve_axis`.
//   - Slice bounds are signed in the same way; slice strides are signed and a
//     negative stride walks the dimension backwards.
//   - Window and convolution strides are unsigned and must be >= 1.

/// Resolve a possibly negative axis against `rank`.
pub fn resolve_axis(op: &'static str, axis: isize, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + rank as isize } else { axis };
    if resolved < 0 || resolved >= rank as isize {
        return Err(Error::DimensionOutOfRange {
            op,
            dim: axis,
            rank,
        });
    }
    Ok(resolved as usize)
}

/// Result shape of an element-wise node-node operation.
///
/// Shapes are aligned at their trailing dimensions: the lower-rank shape
/// must equal the last dimensions of the higher-rank one, and the result
/// takes the higher-rank shape.
///
///   [3, 4] and [4]       → [3, 4]
///   [2, 3, 4] and [3, 4] → [2, 3, 4]
///   [3, 4] and [3]       → ShapeMismatch
pub fn broadcast(op: &'static str, lhs: &Shape, rhs: &Shape) -> Result<Shape> {
    if lhs.rank() >= rhs.rank() && lhs.ends_with(rhs) {
        Ok(lhs.clone())
    } else if rhs.ends_with(lhs) {
        Ok(rhs.clone())
    } else {
        Err(Error::ShapeMismatch {
            op,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }
}

/// Result shape of a matrix multiplication over the last two dimensions.
///
/// `[..batch, m, k] x [..batch', k, n] → [..batch, m, n]` where the right
/// operand's batch dimensions must be a suffix of the left operand's.
pub fn matmul(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
    let mismatch = || Error::ShapeMismatch {
        op: "matmul",
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    };
    if lhs.rank() < 2 || rhs.rank() < 2 {
        return Err(mismatch());
    }
    let l = lhs.dims();
    let r = rhs.dims();
    let (lb, lm) = l.split_at(l.len() - 2);
    let (rb, rm) = r.split_at(r.len() - 2);
    if lm[1] != rm[0] || !lb.ends_with(rb) {
        return Err(mismatch());
    }
    let mut dims = lb.to_vec();
    dims.push(lm[0]);
    dims.push(rm[1]);
    Ok(Shape::new(dims))
}

/// Validate a reshape: the element count must be preserved.
pub fn reshape(from: &Shape, to: &Shape) -> Result<()> {
    if to.rank() == 0 {
        return Err(Error::EmptyShape);
    }
    if from.elem_count() != to.elem_count() {
        return Err(Error::ShapeMismatch {
            op: "reshape",
            lhs: from.clone(),
            rhs: to.clone(),
        });
    }
    Ok(())
}

/// Rank-1 shape holding every element.
pub fn flatten(shape: &Shape) -> Shape {
    Shape::from(shape.elem_count())
}

/// Merge dimension `dim` into `dim - 1`.
///
/// `[2, 2, 3]` flattened at 1 is `[4, 3]`. Dimension 0 has nothing to merge
/// into and is rejected.
pub fn flatten_dim(shape: &Shape, dim: isize) -> Result<Shape> {
    let d = resolve_axis("flatten_dim", dim, shape.rank())?;
    if d == 0 {
        return Err(Error::DimensionOutOfRange {
            op: "flatten_dim",
            dim,
            rank: shape.rank(),
        });
    }
    let mut dims = shape.dims().to_vec();
    let merged = dims[d - 1] * dims[d];
    dims[d - 1] = merged;
    dims.remove(d);
    Ok(Shape::new(dims))
}

/// Shape after reducing away `dim`. A rank-1 input reduces to `[1]`.
pub fn reduce(shape: &Shape, dim: isize) -> Result<(usize, Shape)> {
    let d = resolve_axis("reduce", dim, shape.rank())?;
    if shape.rank() == 1 {
        return Ok((d, Shape::from(1)));
    }
    let mut dims = shape.dims().to_vec();
    dims.remove(d);
    Ok((d, Shape::new(dims)))
}

// Slicing

/// One resolved slice dimension: indices `start, start + step, ...` up to
/// but excluding `end`. For a negative step, `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start: isize,
    pub end: isize,
    pub step: isize,
}

impl SliceRange {
    /// The whole dimension, forwards.
    pub fn full(size: usize) -> Self {
        SliceRange {
            start: 0,
            end: size as isize,
            step: 1,
        }
    }

    /// Number of selected indices.
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.end - self.start
        } else {
            self.start - self.end
        };
        if span <= 0 {
            return 0;
        }
        (span - 1) as usize / self.step.unsigned_abs() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source index of the `i`-th selected element.
    pub fn at(&self, i: usize) -> usize {
        (self.start + i as isize * self.step) as usize
    }
}

/// Validate a (strided) slice and compute its ranges and result shape.
///
/// `start`, `end` and `stride` have one entry per leading dimension; trailing
/// dimensions without an entry are kept whole. Negative bounds resolve as
/// `size + value`, after which bounds are clamped into the dimension. A
/// positive stride needs `start < end`, a negative one `start > end`, and a
/// zero stride never advances.
pub fn slice(
    shape: &Shape,
    start: &[isize],
    end: &[isize],
    stride: &[isize],
) -> Result<(Vec<SliceRange>, Shape)> {
    let rank = shape.rank();
    if start.len() > rank {
        return Err(Error::RankMismatch {
            op: "slice",
            expected: rank,
            got: start.len(),
        });
    }
    for other in [end.len(), stride.len()] {
        if other != start.len() {
            return Err(Error::RankMismatch {
                op: "slice",
                expected: start.len(),
                got: other,
            });
        }
    }

    let mut ranges = Vec::with_capacity(rank);
    for (d, &size) in shape.dims().iter().enumerate() {
        if d >= start.len() {
            ranges.push(SliceRange::full(size));
            continue;
        }
        let (s, e, step) = (start[d], end[d], stride[d]);
        let invalid = Error::InvalidSliceRange {
            dim: d,
            start: s,
            end: e,
            stride: step,
        };
        let n = size as isize;
        let resolve = |v: isize| if v < 0 { v + n } else { v };
        let range = if step > 0 {
            let (rs, re) = (resolve(s).clamp(0, n), resolve(e).clamp(0, n));
            if rs >= re {
                return Err(invalid);
            }
            SliceRange {
                start: rs,
                end: re,
                step,
            }
        } else if step < 0 {
            let (rs, re) = (resolve(s).clamp(-1, n - 1), resolve(e).clamp(-1, n - 1));
            if rs <= re {
                return Err(invalid);
            }
            SliceRange {
                start: rs,
                end: re,
                step,
            }
        } else {
            return Err(invalid);
        };
        ranges.push(range);
    }
    let dims = ranges.iter().map(SliceRange::len).collect();
    Ok((ranges, Shape::new(dims)))
}

/// Validate an extend: `src` is embedded into a zero tensor of `target`,
/// starting at `insert_at`, with `|stride[i]| - 1` zeros between
/// neighbours along dimension i. A negative stride places the elements of
/// that dimension in reverse order.
pub fn extend(src: &Shape, target: &Shape, insert_at: &[usize], stride: &[isize]) -> Result<()> {
    let rank = src.rank();
    for got in [target.rank(), insert_at.len(), stride.len()] {
        if got != rank {
            return Err(Error::RankMismatch {
                op: "extend",
                expected: rank,
                got,
            });
        }
    }
    for d in 0..rank {
        if stride[d] == 0 {
            return Err(Error::InvalidSliceRange {
                dim: d,
                start: insert_at[d] as isize,
                end: target.dims()[d] as isize,
                stride: 0,
            });
        }
        let n = src.dims()[d];
        if n == 0 {
            continue;
        }
        let last = (n - 1)
            .checked_mul(stride[d].unsigned_abs())
            .and_then(|span| span.checked_add(insert_at[d]));
        if !matches!(last, Some(last) if last < target.dims()[d]) {
            return Err(Error::ShapeMismatch {
                op: "extend",
                lhs: src.clone(),
                rhs: target.clone(),
            });
        }
    }
    Ok(())
}

/// Concatenate along `axis`: every other dimension must agree.
pub fn concat(a: &Shape, b: &Shape, axis: isize) -> Result<(usize, Shape)> {
    let mismatch = || Error::ShapeMismatch {
        op: "concat",
        lhs: a.clone(),
        rhs: b.clone(),
    };
    if a.rank() != b.rank() {
        return Err(mismatch());
    }
    let ax = resolve_axis("concat", axis, a.rank())?;
    let agree = a
        .dims()
        .iter()
        .zip(b.dims())
        .enumerate()
        .all(|(d, (x, y))| d == ax || x == y);
    if !agree {
        return Err(mismatch());
    }
    let mut dims = a.dims().to_vec();
    dims[ax] += b.dims()[ax];
    Ok((ax, Shape::new(dims)))
}

/// Insert a new dimension of `size` before `axis` (`axis == rank` appends).
pub fn expand(shape: &Shape, axis: isize, size: usize) -> Result<(usize, Shape)> {
    let ax = resolve_axis("expand", axis, shape.rank() + 1)?;
    let mut dims = shape.dims().to_vec();
    dims.insert(ax, size);
    Ok((ax, Shape::new(dims)))
}

/// Tile dimension i `repeats[i]` times.
pub fn repeat(shape: &Shape, repeats: &[usize]) -> Result<Shape> {
    if repeats.len() != shape.rank() {
        return Err(Error::RankMismatch {
            op: "repeat",
            expected: shape.rank(),
            got: repeats.len(),
        });
    }
    Ok(Shape::new(
        shape.dims().iter().zip(repeats).map(|(d, r)| d * r).collect(),
    ))
}

/// Result dimension i takes the size of source dimension `axes[i]`.
pub fn transpose(shape: &Shape, axes: &[usize]) -> Result<Shape> {
    let mut seen = vec![false; shape.rank()];
    let valid = axes.len() == shape.rank()
        && axes
            .iter()
            .all(|&a| a < seen.len() && !std::mem::replace(&mut seen[a], true));
    if !valid {
        return Err(Error::InvalidPermutation(axes.to_vec()));
    }
    Ok(Shape::new(axes.iter().map(|&a| shape.dims()[a]).collect()))
}

/// The inverse of a permutation: `transpose(transpose(x, p), inverse(p)) == x`.
pub fn inverse_permutation(axes: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; axes.len()];
    for (i, &a) in axes.iter().enumerate() {
        if a < inv.len() {
            inv[a] = i;
        }
    }
    inv
}

fn check_kernel(op: &'static str, input: &Shape, kernel: &Shape, stride: &[usize]) -> Result<()> {
    if kernel.rank() != input.rank() {
        return Err(Error::RankMismatch {
            op,
            expected: input.rank(),
            got: kernel.rank(),
        });
    }
    if input.rank() < 2 {
        return Err(Error::RankMismatch {
            op,
            expected: 2,
            got: input.rank(),
        });
    }
    if input.last() != kernel.last() {
        return Err(Error::ShapeMismatch {
            op,
            lhs: input.clone(),
            rhs: kernel.clone(),
        });
    }
    if stride.len() != input.rank() - 1 {
        return Err(Error::RankMismatch {
            op,
            expected: input.rank() - 1,
            got: stride.len(),
        });
    }
    for (d, &s) in stride.iter().enumerate() {
        if s == 0 {
            return Err(Error::InvalidStride {
                op,
                dim: d,
                stride: 0,
            });
        }
        let (k, n) = (kernel.dims()[d], input.dims()[d]);
        if k > n {
            return Err(Error::KernelTooLarge {
                dim: d,
                kernel: k,
                size: n,
            });
        }
    }
    Ok(())
}

/// Result shape of a convolution without padding. The last dimension is
/// fully reduced; every other dimension becomes `(n - k) / s + 1`.
pub fn convolve(input: &Shape, kernel: &Shape, stride: &[usize]) -> Result<Shape> {
    check_kernel("convolve", input, kernel, stride)?;
    let dims = (0..input.rank() - 1)
        .map(|d| (input.dims()[d] - kernel.dims()[d]) / stride[d] + 1)
        .collect();
    Ok(Shape::new(dims))
}

/// Result shape of a slide: the kernel's own shape.
pub fn slide(input: &Shape, kernel: &Shape, stride: &[usize]) -> Result<Shape> {
    check_kernel("slide", input, kernel, stride)?;
    Ok(kernel.clone())
}

/// Validate an index (gather) and compute its axis and result shape.
///
/// The indexed dimension is `indices.rank - 1`; the dimensions of `indices`
/// before it must equal the leading dimensions of `input`. The result is
/// `input`'s shape with the indexed dimension replaced by the number of
/// indices per row.
pub fn index(input: &Shape, indices: &Shape) -> Result<(usize, Shape)> {
    let mismatch = || Error::ShapeMismatch {
        op: "index",
        lhs: input.clone(),
        rhs: indices.clone(),
    };
    if indices.rank() == 0 || indices.rank() > input.rank() {
        return Err(mismatch());
    }
    let axis = indices.rank() - 1;
    if input.dims()[..axis] != indices.dims()[..axis] {
        return Err(mismatch());
    }
    let mut dims = input.dims().to_vec();
    dims[axis] = indices.last();
    Ok((axis, Shape::new(dims)))
}

/// Validate an index-set (scatter) and return the indexed axis.
///
/// `indices` must be a shape-prefix of `b`; the indexed dimension is
/// `indices.rank - 1`; `a` and `b` agree in every other dimension.
pub fn index_set(a: &Shape, b: &Shape, indices: &Shape) -> Result<usize> {
    if a.rank() != b.rank() {
        return Err(Error::ShapeMismatch {
            op: "index_set",
            lhs: a.clone(),
            rhs: b.clone(),
        });
    }
    if indices.rank() == 0 || !b.starts_with(indices) {
        return Err(Error::ShapeMismatch {
            op: "index_set",
            lhs: b.clone(),
            rhs: indices.clone(),
        });
    }
    let axis = indices.rank() - 1;
    let agree = a
        .dims()
        .iter()
        .zip(b.dims())
        .enumerate()
        .all(|(d, (x, y))| d == axis || x == y);
    if !agree {
        return Err(Error::ShapeMismatch {
            op: "index_set",
            lhs: a.clone(),
            rhs: b.clone(),
        });
    }
    Ok(axis)
}

/// Number of window positions per dimension.
pub fn window_counts(shape: &Shape, size: &[usize], stride: &[usize]) -> Vec<usize> {
    shape
        .dims()
        .iter()
        .zip(size.iter().zip(stride))
        .map(|(&n, (&k, &s))| (n - k) / s + 1)
        .collect()
}

/// Result shape of a sliding window: `[windows, ..size]`.
pub fn sliding_window(shape: &Shape, size: &[usize], stride: &[usize]) -> Result<Shape> {
    let rank = shape.rank();
    for got in [size.len(), stride.len()] {
        if got != rank {
            return Err(Error::RankMismatch {
                op: "sliding_window",
                expected: rank,
                got,
            });
        }
    }
    for d in 0..rank {
        if stride[d] == 0 {
            return Err(Error::InvalidStride {
                op: "sliding_window",
                dim: d,
                stride: 0,
            });
        }
        if size[d] > shape.dims()[d] {
            return Err(Error::KernelTooLarge {
                dim: d,
                kernel: size[d],
                size: shape.dims()[d],
            });
        }
    }
    let windows: usize = window_counts(shape, size, stride).iter().product();
    let mut dims = Vec::with_capacity(rank + 1);
    dims.push(windows);
    dims.extend_from_slice(size);
    Ok(Shape::new(dims))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(dims: &[usize]) -> Shape {
        Shape::from(dims)
    }

    #[test]
    fn test_resolve_axis() {
        assert_eq!(resolve_axis("t", -1, 3).unwrap(), 2);
        assert_eq!(resolve_axis("t", 0, 3).unwrap(), 0);
        assert!(matches!(
            resolve_axis("t", 3, 3),
            Err(Error::DimensionOutOfRange { dim: 3, rank: 3, .. })
        ));
        assert!(resolve_axis("t", -4, 3).is_err());
    }

    #[test]
    fn test_broadcast_trailing() {
        assert_eq!(broadcast("add", &s(&[3, 4]), &s(&[4])).unwrap(), s(&[3, 4]));
        assert_eq!(broadcast("add", &s(&[4]), &s(&[2, 3, 4])).unwrap(), s(&[2, 3, 4]));
        assert!(matches!(
            broadcast("add", &s(&[3, 4]), &s(&[3])),
            Err(Error::ShapeMismatch { op: "add", .. })
        ));
        // no size-1 stretching
        assert!(broadcast("add", &s(&[3, 4]), &s(&[1, 4])).is_err());
    }

    #[test]
    fn test_matmul_shape() {
        assert_eq!(matmul(&s(&[2, 3]), &s(&[3, 5])).unwrap(), s(&[2, 5]));
        assert_eq!(matmul(&s(&[7, 2, 3]), &s(&[3, 5])).unwrap(), s(&[7, 2, 5]));
        assert!(matmul(&s(&[2, 3]), &s(&[4, 5])).is_err());
        assert!(matmul(&s(&[3]), &s(&[3, 5])).is_err());
    }

    #[test]
    fn test_reshape_counts() {
        assert!(reshape(&s(&[2, 3]), &s(&[6])).is_ok());
        assert!(matches!(
            reshape(&s(&[2, 3]), &s(&[4])),
            Err(Error::ShapeMismatch { op: "reshape", .. })
        ));
    }

    #[test]
    fn test_flatten_dim() {
        assert_eq!(flatten_dim(&s(&[2, 2, 3]), 1).unwrap(), s(&[4, 3]));
        assert_eq!(flatten_dim(&s(&[2, 2, 3]), 2).unwrap(), s(&[2, 6]));
        assert!(matches!(
            flatten_dim(&s(&[2, 2, 3]), 0),
            Err(Error::DimensionOutOfRange { op: "flatten_dim", dim: 0, .. })
        ));
        assert_eq!(flatten(&s(&[2, 2, 3])), s(&[12]));
    }

    #[test]
    fn test_reduce_shape() {
        assert_eq!(reduce(&s(&[2, 3]), 0).unwrap(), (0, s(&[3])));
        assert_eq!(reduce(&s(&[2, 3]), -1).unwrap(), (1, s(&[2])));
        assert_eq!(reduce(&s(&[5]), 0).unwrap(), (0, s(&[1])));
    }

    #[test]
    fn test_slice_negative_bounds() {
        let (ranges, shape) = slice(&s(&[5, 4]), &[1, -3], &[-1, 4], &[1, 1]).unwrap();
        assert_eq!(shape, s(&[3, 3]));
        assert_eq!(ranges[0], SliceRange { start: 1, end: 4, step: 1 });
        assert_eq!(ranges[1].at(0), 1);
    }

    #[test]
    fn test_slice_partial_and_stride() {
        let (_, shape) = slice(&s(&[6, 3]), &[0], &[6], &[2]).unwrap();
        assert_eq!(shape, s(&[3, 3]));
        let (ranges, shape) = slice(&s(&[6]), &[5], &[-7], &[-2]).unwrap();
        assert_eq!(shape, s(&[3]));
        assert_eq!(
            (0..3).map(|i| ranges[0].at(i)).collect::<Vec<_>>(),
            vec![5, 3, 1]
        );
    }

    #[test]
    fn test_slice_contradictions() {
        assert!(matches!(
            slice(&s(&[6]), &[1], &[4], &[-1]),
            Err(Error::InvalidSliceRange { dim: 0, .. })
        ));
        assert!(matches!(
            slice(&s(&[6]), &[4], &[1], &[1]),
            Err(Error::InvalidSliceRange { .. })
        ));
        assert!(matches!(
            slice(&s(&[6]), &[0], &[6], &[0]),
            Err(Error::InvalidSliceRange { stride: 0, .. })
        ));
        assert!(matches!(
            slice(&s(&[6]), &[0, 0], &[1, 1], &[1, 1]),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_slice_step_past_the_end() {
        let (ranges, shape) = slice(&s(&[5]), &[0], &[5], &[isize::MAX]).unwrap();
        assert_eq!(shape, s(&[1]));
        assert_eq!(ranges[0].at(0), 0);
        let (ranges, shape) = slice(&s(&[5]), &[-1], &[-6], &[isize::MIN]).unwrap();
        assert_eq!(shape, s(&[1]));
        assert_eq!(ranges[0].at(0), 4);
        let (_, shape) = slice(&s(&[5, 2]), &[1, 0], &[5, 2], &[3, isize::MAX - 1]).unwrap();
        assert_eq!(shape, s(&[2, 1]));
    }

    #[test]
    fn test_extend_huge_stride_is_rejected() {
        assert!(matches!(
            extend(&s(&[2]), &s(&[4]), &[0], &[isize::MAX]),
            Err(Error::ShapeMismatch { op: "extend", .. })
        ));
        assert!(matches!(
            extend(&s(&[3]), &s(&[4]), &[usize::MAX], &[isize::MIN]),
            Err(Error::ShapeMismatch { op: "extend", .. })
        ));
        // a single element never steps, so any stride fits
        assert!(extend(&s(&[1]), &s(&[4]), &[3], &[isize::MIN]).is_ok());
    }

    #[test]
    fn test_extend_fit() {
        assert!(extend(&s(&[2, 2]), &s(&[4, 4]), &[1, 1], &[1, 1]).is_ok());
        assert!(extend(&s(&[2, 2]), &s(&[4, 4]), &[2, 1], &[2, -2]).is_err());
        assert!(extend(&s(&[2, 2]), &s(&[4, 4]), &[0, 1], &[3, -2]).is_ok());
        assert!(matches!(
            extend(&s(&[2]), &s(&[4]), &[0], &[0]),
            Err(Error::InvalidSliceRange { stride: 0, .. })
        ));
        assert!(matches!(
            extend(&s(&[2]), &s(&[4, 4]), &[0, 0], &[1, 1]),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_concat_shape() {
        assert_eq!(concat(&s(&[2, 2]), &s(&[2, 2]), 0).unwrap(), (0, s(&[4, 2])));
        assert_eq!(concat(&s(&[2, 2]), &s(&[2, 3]), 1).unwrap(), (1, s(&[2, 5])));
        assert!(matches!(
            concat(&s(&[2, 2]), &s(&[2, 3]), 0),
            Err(Error::ShapeMismatch { op: "concat", .. })
        ));
        assert!(concat(&s(&[2, 2]), &s(&[2]), 0).is_err());
    }

    #[test]
    fn test_expand_and_repeat() {
        assert_eq!(expand(&s(&[2, 3]), 0, 4).unwrap(), (0, s(&[4, 2, 3])));
        assert_eq!(expand(&s(&[2, 3]), 2, 4).unwrap(), (2, s(&[2, 3, 4])));
        assert!(expand(&s(&[2, 3]), 3, 4).is_err());
        assert_eq!(repeat(&s(&[2, 2]), &[2, 3]).unwrap(), s(&[4, 6]));
        assert!(repeat(&s(&[2, 2]), &[2]).is_err());
    }

    #[test]
    fn test_transpose_permutation() {
        assert_eq!(transpose(&s(&[2, 3, 4]), &[2, 0, 1]).unwrap(), s(&[4, 2, 3]));
        assert_eq!(
            transpose(&s(&[2, 3]), &[0, 0]),
            Err(Error::InvalidPermutation(vec![0, 0]))
        );
        assert!(transpose(&s(&[2, 3]), &[0, 2]).is_err());
        assert!(transpose(&s(&[2, 3]), &[0]).is_err());
        assert_eq!(inverse_permutation(&[2, 0, 1]), vec![1, 2, 0]);
    }

    #[test]
    fn test_convolve_shape() {
        assert_eq!(
            convolve(&s(&[6, 6, 3]), &s(&[3, 3, 3]), &[1, 1]).unwrap(),
            s(&[4, 4])
        );
        assert_eq!(
            convolve(&s(&[7, 3]), &s(&[3, 3]), &[2]).unwrap(),
            s(&[3])
        );
        assert!(matches!(
            convolve(&s(&[2, 3]), &s(&[3, 3]), &[1]),
            Err(Error::KernelTooLarge { dim: 0, kernel: 3, size: 2 })
        ));
        assert!(matches!(
            convolve(&s(&[6, 3]), &s(&[3, 2]), &[1]),
            Err(Error::ShapeMismatch { op: "convolve", .. })
        ));
        assert!(matches!(
            convolve(&s(&[6, 3]), &s(&[3, 3]), &[0]),
            Err(Error::InvalidStride { .. })
        ));
        assert_eq!(slide(&s(&[6, 3]), &s(&[2, 3]), &[1]).unwrap(), s(&[2, 3]));
    }

    #[test]
    fn test_index_shapes() {
        assert_eq!(index(&s(&[3, 2, 2]), &s(&[2])).unwrap(), (0, s(&[2, 2, 2])));
        assert_eq!(index(&s(&[3, 2, 2]), &s(&[3, 4])).unwrap(), (1, s(&[3, 4, 2])));
        assert!(index(&s(&[3, 2, 2]), &s(&[2, 4])).is_err());
        assert_eq!(index_set(&s(&[4, 2]), &s(&[3, 2]), &s(&[3])).unwrap(), 0);
        assert_eq!(index_set(&s(&[4, 2]), &s(&[4, 2]), &s(&[4, 2])).unwrap(), 1);
        assert!(index_set(&s(&[4, 2]), &s(&[3, 3]), &s(&[3])).is_err());
        assert!(index_set(&s(&[4, 2]), &s(&[3, 2]), &s(&[2])).is_err());
    }

    #[test]
    fn test_sliding_window_shape() {
        assert_eq!(
            sliding_window(&s(&[4, 2]), &[3, 2], &[1, 1]).unwrap(),
            s(&[2, 3, 2])
        );
        assert_eq!(
            sliding_window(&s(&[4, 3, 3]), &[2, 2, 2], &[2, 1, 2]).unwrap(),
            s(&[4, 2, 2, 2])
        );
        assert!(matches!(
            sliding_window(&s(&[4, 2]), &[5, 2], &[1, 1]),
            Err(Error::KernelTooLarge { .. })
        ));
    }
}

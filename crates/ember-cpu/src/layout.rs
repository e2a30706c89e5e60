use ember_core::{Shape, SliceRange};

// Layout — how a logical shape maps onto a flat row-major buffer
//
// The engine materializes every node into a contiguous buffer. Structural
// operations (transpose, slice, expand, sliding windows) are evaluated by
// describing the result as a strided view of the input buffer and then
// gathering it:
//
//   result[i] = input[offset + sum(index[d] * strides[d])]
//
// Strides are signed: a negative stride walks a dimension backwards (slices
// with a negative step) and a zero stride repeats the same elements
// (expand).

/// A strided view over a flat buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    dims: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl Layout {
    /// Row-major layout of `shape`.
    pub fn contiguous(shape: &Shape) -> Self {
        Layout {
            dims: shape.dims().to_vec(),
            strides: shape
                .stride_contiguous()
                .into_iter()
                .map(|s| s as isize)
                .collect(),
            offset: 0,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn elem_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Result dimension i reads source dimension `axes[i]`.
    ///
    /// [2, 3] with strides [3, 1] transposed by [1, 0] → [3, 2] with
    /// strides [1, 3].
    pub fn permute(&self, axes: &[usize]) -> Layout {
        Layout {
            dims: axes.iter().map(|&a| self.dims[a]).collect(),
            strides: axes.iter().map(|&a| self.strides[a]).collect(),
            offset: self.offset,
        }
    }

    /// Select `ranges` (one per dimension). The offset moves to the first
    /// selected element and each stride is scaled by its step.
    pub fn slice(&self, ranges: &[SliceRange]) -> Layout {
        let mut offset = self.offset as isize;
        let mut dims = Vec::with_capacity(ranges.len());
        let mut strides = Vec::with_capacity(ranges.len());
        for (r, &s) in ranges.iter().zip(&self.strides) {
            dims.push(r.len());
            if !r.is_empty() {
                offset += r.start * s;
            }
            // a single selected element never steps, whatever the step is
            strides.push(if r.len() > 1 { s * r.step } else { s });
        }
        Layout {
            dims,
            strides,
            offset: offset.max(0) as usize,
        }
    }

    /// Insert a dimension of `size` at `axis` that repeats the data.
    pub fn insert_broadcast_axis(&self, axis: usize, size: usize) -> Layout {
        let mut dims = self.dims.clone();
        let mut strides = self.strides.clone();
        dims.insert(axis, size);
        strides.insert(axis, 0);
        Layout {
            dims,
            strides,
            offset: self.offset,
        }
    }

    /// The `dims`-shaped block starting at multi-index `origin`.
    pub fn window(&self, origin: &[usize], dims: &[usize]) -> Layout {
        let shift: isize = origin
            .iter()
            .zip(&self.strides)
            .map(|(&o, &s)| o as isize * s)
            .sum();
        Layout {
            dims: dims.to_vec(),
            strides: self.strides.clone(),
            offset: (self.offset as isize + shift) as usize,
        }
    }

    /// Flat index of multi-index `index`.
    pub fn flat_index(&self, index: &[usize]) -> usize {
        let mut flat = self.offset as isize;
        for (i, &idx) in index.iter().enumerate() {
            flat += idx as isize * self.strides[i];
        }
        flat as usize
    }

    /// Iterator over the flat indices of every element, in logical order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }

    /// Copy the viewed elements out of `data` in logical order.
    pub fn gather<T: Copy>(&self, data: &[T]) -> Vec<T> {
        self.strided_indices().map(|i| data[i]).collect()
    }
}

// StridedIter — walks a Layout in logical (row-major) order
//
// For a contiguous layout this counts 0, 1, 2, ... For a permuted, sliced or
// broadcast layout it jumps around the buffer following the strides.

/// Iterator that yields flat buffer indices for each element of a Layout.
pub struct StridedIter {
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<isize>,
    /// Flat index of `current`, kept up to date incrementally.
    position: isize,
    remaining: usize,
    started: bool,
}

impl StridedIter {
    fn new(layout: &Layout) -> Self {
        StridedIter {
            current: vec![0; layout.dims.len()],
            dims: layout.dims.clone(),
            strides: layout.strides.clone(),
            position: layout.offset as isize,
            remaining: layout.elem_count(),
            started: false,
        }
    }

    /// Advance the multi-dimensional index by one (rightmost dimension first).
    fn advance(&mut self) {
        for i in (0..self.dims.len()).rev() {
            self.current[i] += 1;
            self.position += self.strides[i];
            if self.current[i] < self.dims[i] {
                return;
            }
            self.position -= self.strides[i] * self.dims[i] as isize;
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;
        self.remaining -= 1;
        Some(self.position as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_indices() {
        let layout = Layout::contiguous(&Shape::from((2, 3)));
        assert_eq!(layout.strides(), &[3, 1]);
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_permute_indices() {
        // [[0, 1, 2],
        //  [3, 4, 5]] read column-major
        let layout = Layout::contiguous(&Shape::from((2, 3))).permute(&[1, 0]);
        assert_eq!(layout.dims(), &[3, 2]);
        assert_eq!(layout.strides(), &[1, 3]);
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_reversed_slice() {
        let layout = Layout::contiguous(&Shape::from(6)).slice(&[SliceRange {
            start: 5,
            end: -1,
            step: -2,
        }]);
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![5, 3, 1]);
    }

    #[test]
    fn test_slice_offset() {
        let layout = Layout::contiguous(&Shape::from((4, 6))).slice(&[
            SliceRange::full(4),
            SliceRange {
                start: 2,
                end: 5,
                step: 1,
            },
        ]);
        assert_eq!(layout.dims(), &[4, 3]);
        assert_eq!(layout.offset(), 2);
        assert_eq!(layout.flat_index(&[1, 0]), 8);
    }

    #[test]
    fn test_broadcast_axis_repeats() {
        let layout = Layout::contiguous(&Shape::from(2)).insert_broadcast_axis(0, 3);
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_window() {
        let layout = Layout::contiguous(&Shape::from((4, 2)));
        let w = layout.window(&[1, 0], &[3, 2]);
        assert_eq!(w.gather(&[0., 1., 2., 3., 4., 5., 6., 7.]), vec![2., 3., 4., 5., 6., 7.]);
    }

    #[test]
    fn test_single_element_slice_with_huge_step() {
        let base = Layout::contiguous(&Shape::from((3, 4)));
        let layout = base.slice(&[
            SliceRange { start: 2, end: 3, step: isize::MAX },
            SliceRange { start: 1, end: 4, step: 2 },
        ]);
        assert_eq!(layout.dims(), &[1, 2]);
        assert_eq!(layout.gather(&(0..12).collect::<Vec<i64>>()), vec![9, 11]);
    }
}

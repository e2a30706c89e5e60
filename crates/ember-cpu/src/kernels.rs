use std::borrow::Cow;

use rayon::prelude::*;

use ember_core::{algebra, BinaryOp, DType, Error, ReduceOp, Result, Shape, SliceRange, UnaryOp};

use crate::buffer::Buffer;
use crate::layout::Layout;

// Kernels — reference implementations of every node kind
//
// Buffers are flat row-major. Integer kernels run on i64 and float kernels
// on f64 (see buffer.rs); the engine fits each result to the node's element
// type afterwards. Integer arithmetic wraps on overflow, integer division
// truncates toward zero and an integer division by zero yields 0.

/// Element arithmetic shared by the typed kernels.
pub trait Num: Copy + PartialOrd + Send + Sync + 'static {
    const ZERO: Self;
    const ONE: Self;
    const LOWEST: Self;
    const HIGHEST: Self;

    fn plus(self, other: Self) -> Self;
    fn times(self, other: Self) -> Self;
    fn smaller(self, other: Self) -> Self;
    fn larger(self, other: Self) -> Self;

    /// View a buffer with this element type, converting when it holds the other kind.
    fn view(buf: &Buffer) -> Cow<'_, [Self]>;
    fn wrap(data: Vec<Self>) -> Buffer;
}

impl Num for i64 {
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const LOWEST: Self = i64::MIN;
    const HIGHEST: Self = i64::MAX;

    fn plus(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
    fn times(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }
    fn smaller(self, other: Self) -> Self {
        self.min(other)
    }
    fn larger(self, other: Self) -> Self {
        self.max(other)
    }
    fn view(buf: &Buffer) -> Cow<'_, [Self]> {
        buf.ints()
    }
    fn wrap(data: Vec<Self>) -> Buffer {
        Buffer::Int(data)
    }
}

impl Num for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const LOWEST: Self = f64::NEG_INFINITY;
    const HIGHEST: Self = f64::INFINITY;

    fn plus(self, other: Self) -> Self {
        self + other
    }
    fn times(self, other: Self) -> Self {
        self * other
    }
    fn smaller(self, other: Self) -> Self {
        self.min(other)
    }
    fn larger(self, other: Self) -> Self {
        self.max(other)
    }
    fn view(buf: &Buffer) -> Cow<'_, [Self]> {
        buf.floats()
    }
    fn wrap(data: Vec<Self>) -> Buffer {
        Buffer::Float(data)
    }
}

/// Build `n` values from `f`, on the rayon pool when `n >= threshold`.
pub fn tabulate<T, F>(n: usize, threshold: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if n >= threshold {
        (0..n).into_par_iter().map(f).collect()
    } else {
        (0..n).map(f).collect()
    }
}

//  Leaves

pub fn arange(shape: &Shape, axis: usize) -> Vec<i64> {
    let dims = shape.dims();
    let inner: usize = dims[axis + 1..].iter().product();
    let size = dims[axis].max(1);
    (0..shape.elem_count())
        .map(|i| ((i / inner.max(1)) % size) as i64)
        .collect()
}

pub fn identity(n: usize) -> Vec<i64> {
    let mut out = vec![0; n * n];
    for i in 0..n {
        out[i * n + i] = 1;
    }
    out
}

//  Element-wise

/// One binary operation on two integers of common element type `compute`.
pub fn int_binary(op: BinaryOp, x: i64, y: i64, compute: DType) -> i64 {
    match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Div if y == 0 => 0,
        BinaryOp::Div => x.wrapping_div(y),
        BinaryOp::Pow => {
            let v = (x as f64).powf(y as f64);
            if compute == DType::I32 {
                i64::from(v as i32)
            } else {
                v as i64
            }
        }
        BinaryOp::Equal => i64::from(x == y),
        BinaryOp::Greater => i64::from(x > y),
        BinaryOp::Less => i64::from(x < y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
    }
}

/// One arithmetic binary operation on two floats. Comparisons are handled
/// by `float_compare`.
pub fn float_binary(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Pow => x.powf(y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
        BinaryOp::Equal | BinaryOp::Greater | BinaryOp::Less => float_compare(op, x, y) as f64,
    }
}

pub fn float_compare(op: BinaryOp, x: f64, y: f64) -> i64 {
    let hit = match op {
        BinaryOp::Equal => x == y,
        BinaryOp::Greater => x > y,
        BinaryOp::Less => x < y,
        _ => false,
    };
    i64::from(hit)
}

/// Node-node operation. Shapes are aligned at their trailing dimensions,
/// so output element i reads element `i % len` of each operand.
pub fn binary(op: BinaryOp, lhs: &Buffer, rhs: &Buffer, compute: DType, n: usize, threshold: usize) -> Buffer {
    if compute.is_int() {
        let (a, b) = (lhs.ints(), rhs.ints());
        let (la, lb) = (a.len().max(1), b.len().max(1));
        Buffer::Int(tabulate(n, threshold, |i| {
            int_binary(op, a[i % la], b[i % lb], compute)
        }))
    } else {
        let (a, b) = (lhs.floats(), rhs.floats());
        let (la, lb) = (a.len().max(1), b.len().max(1));
        if op.is_comparison() {
            Buffer::Int(tabulate(n, threshold, |i| float_compare(op, a[i % la], b[i % lb])))
        } else {
            Buffer::Float(tabulate(n, threshold, |i| float_binary(op, a[i % la], b[i % lb])))
        }
    }
}

fn int_unary(op: UnaryOp, x: i64) -> i64 {
    match op {
        UnaryOp::Neg => x.wrapping_neg(),
        UnaryOp::Abs => x.wrapping_abs(),
        UnaryOp::Sign => {
            if x < 0 {
                -1
            } else {
                1
            }
        }
        UnaryOp::Even => i64::from(x % 2 == 0),
        _ => op.apply(x as f64, DType::I64) as i64,
    }
}

pub fn unary(op: UnaryOp, data: &Buffer, input: DType, output: DType, threshold: usize) -> Buffer {
    match data {
        Buffer::Int(v) if output.is_int() => {
            Buffer::Int(tabulate(v.len(), threshold, |i| int_unary(op, v[i])))
        }
        _ => {
            let x = data.floats();
            let y = tabulate(x.len(), threshold, |i| op.apply(x[i], input));
            if output.is_int() {
                Buffer::Int(y.into_iter().map(|v| v as i64).collect())
            } else {
                Buffer::Float(y)
            }
        }
    }
}

//  Reductions and contractions

fn fold_start<T: Num>(op: ReduceOp) -> T {
    match op {
        ReduceOp::Sum => T::ZERO,
        ReduceOp::Mul => T::ONE,
        ReduceOp::Min => T::HIGHEST,
        ReduceOp::Max => T::LOWEST,
    }
}

fn fold_step<T: Num>(op: ReduceOp, acc: T, x: T) -> T {
    match op {
        ReduceOp::Sum => acc.plus(x),
        ReduceOp::Mul => acc.times(x),
        ReduceOp::Min => acc.smaller(x),
        ReduceOp::Max => acc.larger(x),
    }
}

/// Fold dimension `dim` of `shape` away.
pub fn reduce<T: Num>(op: ReduceOp, data: &[T], shape: &Shape, dim: usize) -> Vec<T> {
    let dims = shape.dims();
    let outer: usize = dims[..dim].iter().product();
    let size = dims[dim];
    let inner: usize = dims[dim + 1..].iter().product();
    let mut out = vec![fold_start::<T>(op); outer * inner];
    for o in 0..outer {
        for k in 0..size {
            let base = (o * size + k) * inner;
            for i in 0..inner {
                let slot = &mut out[o * inner + i];
                *slot = fold_step(op, *slot, data[base + i]);
            }
        }
    }
    out
}

fn dot<T: Num>(pairs: impl Iterator<Item = (T, T)>) -> T {
    pairs.fold(T::ZERO, |acc, (x, y)| acc.plus(x.times(y)))
}

/// `[..batch, m, k] x [..batch', k, n]`, where batch' is a suffix of batch.
pub fn matmul<T: Num>(a: &[T], a_shape: &Shape, b: &[T], b_shape: &Shape, threshold: usize) -> Vec<T> {
    let ad = a_shape.dims();
    let bd = b_shape.dims();
    let (m, k) = (ad[ad.len() - 2], ad[ad.len() - 1]);
    let n = bd[bd.len() - 1];
    let a_batch: usize = ad[..ad.len() - 2].iter().product();
    let b_batch: usize = bd[..bd.len() - 2].iter().product::<usize>().max(1);
    tabulate(a_batch * m * n, threshold, |idx| {
        let t = idx / (m * n);
        let (i, j) = ((idx / n) % m, idx % n);
        let a_base = t * m * k + i * k;
        let b_base = (t % b_batch) * k * n;
        dot((0..k).map(|p| (a[a_base + p], b[b_base + p * n + j])))
    })
}

/// The kernel-shaped block of `input` for every output position of a
/// convolution, in row-major order of the output.
fn kernel_windows(in_shape: &Shape, k_shape: &Shape, stride: &[usize]) -> Vec<Layout> {
    let rank = in_shape.rank();
    let counts: Vec<usize> = (0..rank - 1)
        .map(|d| (in_shape.dims()[d] - k_shape.dims()[d]) / stride[d] + 1)
        .collect();
    let grid = Shape::new(counts);
    let base = Layout::contiguous(in_shape);
    (0..grid.elem_count())
        .map(|w| {
            let mut origin: Vec<usize> = grid
                .unravel(w)
                .iter()
                .zip(stride)
                .map(|(p, s)| p * s)
                .collect();
            origin.push(0);
            base.window(&origin, k_shape.dims())
        })
        .collect()
}

pub fn convolve<T: Num>(input: &[T], in_shape: &Shape, kernel: &[T], k_shape: &Shape, stride: &[usize]) -> Vec<T> {
    kernel_windows(in_shape, k_shape, stride)
        .iter()
        .map(|w| dot(w.strided_indices().zip(kernel).map(|(i, &k)| (input[i], k))))
        .collect()
}

pub fn slide<T: Num>(input: &[T], in_shape: &Shape, kernel: &[T], k_shape: &Shape, stride: &[usize]) -> Vec<T> {
    let mut acc = vec![T::ZERO; kernel.len()];
    for w in kernel_windows(in_shape, k_shape, stride) {
        for (slot, i) in acc.iter_mut().zip(w.strided_indices()) {
            *slot = slot.plus(input[i]);
        }
    }
    acc.iter().zip(kernel).map(|(&a, &k)| a.times(k)).collect()
}

//  Structural

pub fn slice<T: Copy>(data: &[T], shape: &Shape, ranges: &[SliceRange]) -> Vec<T> {
    Layout::contiguous(shape).slice(ranges).gather(data)
}

pub fn transpose<T: Copy>(data: &[T], shape: &Shape, axes: &[usize]) -> Vec<T> {
    Layout::contiguous(shape).permute(axes).gather(data)
}

pub fn expand<T: Copy>(data: &[T], shape: &Shape, axis: usize, size: usize) -> Vec<T> {
    Layout::contiguous(shape)
        .insert_broadcast_axis(axis, size)
        .gather(data)
}

/// Place `src` into zeros of `out_shape`. Element i of dimension d lands at
/// `insert_at[d] + i * |stride[d]|`, counting i from the end when the stride
/// is negative.
pub fn extend<T: Num>(src: &[T], src_shape: &Shape, out_shape: &Shape, insert_at: &[usize], stride: &[isize]) -> Vec<T> {
    let mut out = vec![T::ZERO; out_shape.elem_count()];
    let src_dims = src_shape.dims();
    for (i, &v) in src.iter().enumerate() {
        let dest: Vec<usize> = src_shape
            .unravel(i)
            .iter()
            .enumerate()
            .map(|(d, &x)| {
                let x = if stride[d] < 0 { src_dims[d] - 1 - x } else { x };
                insert_at[d] + x * stride[d].unsigned_abs()
            })
            .collect();
        out[out_shape.ravel(&dest)] = v;
    }
    out
}

pub fn concat<T: Copy>(a: &[T], a_shape: &Shape, b: &[T], axis: usize) -> Vec<T> {
    let outer: usize = a_shape.dims()[..axis].iter().product();
    let a_chunk = a.len() / outer.max(1);
    let b_chunk = b.len() / outer.max(1);
    let mut out = Vec::with_capacity(a.len() + b.len());
    for o in 0..outer {
        out.extend_from_slice(&a[o * a_chunk..(o + 1) * a_chunk]);
        out.extend_from_slice(&b[o * b_chunk..(o + 1) * b_chunk]);
    }
    out
}

pub fn repeat<T: Copy>(data: &[T], shape: &Shape, out_shape: &Shape) -> Vec<T> {
    let dims = shape.dims();
    (0..out_shape.elem_count())
        .map(|i| {
            let src: Vec<usize> = out_shape
                .unravel(i)
                .iter()
                .zip(dims)
                .map(|(x, d)| x % d)
                .collect();
            data[shape.ravel(&src)]
        })
        .collect()
}

fn checked_index(op: &str, v: i64, size: usize) -> Result<usize> {
    usize::try_from(v)
        .ok()
        .filter(|&i| i < size)
        .ok_or_else(|| {
            Error::msg(format!(
                "{op}: index {v} out of range for dimension of size {size}"
            ))
        })
}

/// Gather along `axis`: the index for output position `o` is
/// `indices[o[..=axis]]`.
pub fn index<T: Copy>(
    data: &[T],
    shape: &Shape,
    indices: &[i64],
    idx_shape: &Shape,
    axis: usize,
    out_shape: &Shape,
) -> Result<Vec<T>> {
    let size = shape.dims()[axis];
    (0..out_shape.elem_count())
        .map(|i| {
            let mut pos = out_shape.unravel(i);
            let v = indices[idx_shape.ravel(&pos[..=axis])];
            pos[axis] = checked_index("index", v, size)?;
            Ok(data[shape.ravel(&pos)])
        })
        .collect()
}

/// Scatter `b` into a copy of `a`. Destinations hit at least once take the
/// sum of their sources; an index of -1 drops the source element.
pub fn index_set<T: Num>(
    a: &[T],
    a_shape: &Shape,
    b: &[T],
    b_shape: &Shape,
    indices: &[i64],
    idx_shape: &Shape,
    axis: usize,
) -> Result<Vec<T>> {
    let size = a_shape.dims()[axis];
    let mut sums: Vec<Option<T>> = vec![None; a.len()];
    for (i, &v) in b.iter().enumerate() {
        let mut pos = b_shape.unravel(i);
        let target = indices[idx_shape.ravel(&pos[..=axis])];
        if target == -1 {
            continue;
        }
        pos[axis] = checked_index("index_set", target, size)?;
        let slot = &mut sums[a_shape.ravel(&pos)];
        *slot = Some(slot.unwrap_or(T::ZERO).plus(v));
    }
    Ok(a.iter()
        .zip(sums)
        .map(|(&orig, sum)| sum.unwrap_or(orig))
        .collect())
}

/// Every `size` window stepped by `stride`, innermost dimension fastest.
pub fn sliding_window<T: Copy>(data: &[T], shape: &Shape, size: &[usize], stride: &[usize]) -> Vec<T> {
    let grid = Shape::new(algebra::window_counts(shape, size, stride));
    let base = Layout::contiguous(shape);
    let mut out = Vec::with_capacity(grid.elem_count() * size.iter().product::<usize>());
    for w in 0..grid.elem_count() {
        let origin: Vec<usize> = grid
            .unravel(w)
            .iter()
            .zip(stride)
            .map(|(p, s)| p * s)
            .collect();
        out.extend(base.window(&origin, size).gather(data));
    }
    out
}

/// Reorder the entries along `axis`: position j reads entry `perm[j]`.
pub fn permute<T: Copy>(data: &[T], shape: &Shape, axis: usize, perm: &[usize]) -> Vec<T> {
    let dims = shape.dims();
    let size = dims[axis];
    let inner: usize = dims[axis + 1..].iter().product();
    (0..data.len())
        .map(|i| {
            let j = (i / inner.max(1)) % size.max(1);
            let shift = perm[j] as isize - j as isize;
            data[(i as isize + shift * inner as isize) as usize]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division() {
        assert_eq!(int_binary(BinaryOp::Div, 7, 2, DType::I32), 3);
        assert_eq!(int_binary(BinaryOp::Div, -7, 2, DType::I64), -3);
        assert_eq!(int_binary(BinaryOp::Div, 7, 0, DType::I32), 0);
        assert_eq!(int_binary(BinaryOp::Div, i64::MIN, -1, DType::I64), i64::MIN);
        assert_eq!(int_binary(BinaryOp::Pow, 2, 10, DType::I32), 1024);
        assert_eq!(float_binary(BinaryOp::Div, 7.0, 2.0), 3.5);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(int_binary(BinaryOp::Add, i64::MAX, 1, DType::I64), i64::MIN);
        assert_eq!(int_binary(BinaryOp::Mul, i64::MAX, 2, DType::I64), -2);
        let big = (1i64 << 53) + 1;
        assert_eq!(int_binary(BinaryOp::Add, big, 0, DType::I64), big);
    }

    #[test]
    fn test_binary_trailing_alignment() {
        let lhs = Buffer::Float(vec![1., 2., 3., 4., 5., 6.]);
        let rhs = Buffer::Float(vec![10., 20., 30.]);
        let out = binary(BinaryOp::Add, &lhs, &rhs, DType::F64, 6, usize::MAX);
        assert_eq!(out, Buffer::Float(vec![11., 22., 33., 14., 25., 36.]));
    }

    #[test]
    fn test_comparisons_yield_integers() {
        let lhs = Buffer::Float(vec![1.0, 2.0, 3.0]);
        let rhs = Buffer::Int(vec![2]);
        let out = binary(BinaryOp::Greater, &lhs, &rhs, DType::F64, 3, usize::MAX);
        assert_eq!(out, Buffer::Int(vec![0, 0, 1]));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let lhs = Buffer::Int((0..100).collect());
        let rhs = Buffer::Int(vec![3; 100]);
        let seq = binary(BinaryOp::Mul, &lhs, &rhs, DType::I64, 100, usize::MAX);
        let par = binary(BinaryOp::Mul, &lhs, &rhs, DType::I64, 100, 1);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_unary_on_integers() {
        let data = Buffer::Int(vec![i64::MIN, -3, 4]);
        let out = unary(UnaryOp::Neg, &data, DType::I64, DType::I64, usize::MAX);
        assert_eq!(out, Buffer::Int(vec![i64::MIN, 3, -4]));
        let out = unary(UnaryOp::Even, &data, DType::I64, DType::I32, usize::MAX);
        assert_eq!(out, Buffer::Int(vec![1, 0, 1]));
        let out = unary(UnaryOp::Sqrt, &Buffer::Int(vec![4, 9]), DType::I32, DType::F64, usize::MAX);
        assert_eq!(out, Buffer::Float(vec![2.0, 3.0]));
    }

    #[test]
    fn test_reduce() {
        let data = [1., 2., 3., 4., 5., 6.];
        let shape = Shape::from((2, 3));
        assert_eq!(reduce(ReduceOp::Sum, &data, &shape, 0), vec![5., 7., 9.]);
        assert_eq!(reduce(ReduceOp::Sum, &data, &shape, 1), vec![6., 15.]);
        assert_eq!(reduce(ReduceOp::Max, &data, &shape, 1), vec![3., 6.]);
        assert_eq!(reduce(ReduceOp::Mul, &data, &shape, 0), vec![4., 10., 18.]);
        let ints = [3i64, -1, 4];
        assert_eq!(reduce(ReduceOp::Min, &ints, &Shape::from(3), 0), vec![-1]);
        assert_eq!(reduce(ReduceOp::Mul, &ints, &Shape::from(3), 0), vec![-12]);
    }

    #[test]
    fn test_matmul() {
        let a = [1i64, 2, 3, 4];
        let b = [5i64, 6, 7, 8];
        let s = Shape::from((2, 2));
        assert_eq!(matmul(&a, &s, &b, &s, usize::MAX), vec![19, 22, 43, 50]);
        // batched left operand against one right matrix
        let a2: Vec<f64> = a.iter().chain(a.iter()).map(|&x| x as f64).collect();
        let b2: Vec<f64> = b.iter().map(|&x| x as f64).collect();
        let out = matmul(&a2, &Shape::from((2, 2, 2)), &b2, &s, usize::MAX);
        assert_eq!(out, vec![19., 22., 43., 50., 19., 22., 43., 50.]);
    }

    #[test]
    fn test_arange_and_identity() {
        assert_eq!(arange(&Shape::from((2, 3)), 1), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(arange(&Shape::from((2, 3)), 0), vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(identity(2), vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_concat_axes() {
        let a = [0, 1, 2, 3];
        let b = [4, 5, 6, 7];
        let s = Shape::from((2, 2));
        assert_eq!(concat(&a, &s, &b, 0), vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(concat(&a, &s, &b, 1), vec![0, 1, 4, 5, 2, 3, 6, 7]);
    }

    #[test]
    fn test_repeat() {
        let out = repeat(&[0, 1, 2, 3], &Shape::from((2, 2)), &Shape::from((4, 6)));
        assert_eq!(&out[..6], &[0, 1, 0, 1, 0, 1]);
        assert_eq!(&out[6..12], &[2, 3, 2, 3, 2, 3]);
        assert_eq!(&out[12..18], &[0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_extend_with_gaps() {
        let out = extend(&[1., 2.], &Shape::from(2), &Shape::from(5), &[1], &[2]);
        assert_eq!(out, vec![0., 1., 0., 2., 0.]);
        let out = extend(&[1i64, 2], &Shape::from(2), &Shape::from(5), &[1], &[-2]);
        assert_eq!(out, vec![0, 2, 0, 1, 0]);
    }

    #[test]
    fn test_convolve_and_slide() {
        // 1-D signal with one channel: [4, 1], kernel [2, 1]
        let input = [1., 2., 3., 4.];
        let kernel = [1., 10.];
        let (is, ks) = (Shape::from((4, 1)), Shape::from((2, 1)));
        assert_eq!(convolve(&input, &is, &kernel, &ks, &[1]), vec![21., 32., 43.]);
        assert_eq!(convolve(&input, &is, &kernel, &ks, &[2]), vec![21., 43.]);
        // kernel[0] sees 1+2+3, kernel[1] sees 2+3+4
        assert_eq!(slide(&input, &is, &kernel, &ks, &[1]), vec![6., 90.]);
        assert_eq!(slide(&[1i64, 2, 3, 4], &is, &[1, 10], &ks, &[1]), vec![6, 90]);
    }

    #[test]
    fn test_index_gather() {
        let data: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let shape = Shape::from((3, 2, 2));
        let out = index(&data, &shape, &[1, 0], &Shape::from(2), 0, &Shape::from((2, 2, 2))).unwrap();
        assert_eq!(out, vec![4., 5., 6., 7., 0., 1., 2., 3.]);
        assert!(index(&data, &shape, &[3], &Shape::from(1), 0, &Shape::from((1, 2, 2))).is_err());
        assert!(index(&data, &shape, &[-2], &Shape::from(1), 0, &Shape::from((1, 2, 2))).is_err());
    }

    #[test]
    fn test_index_set_per_element() {
        let a = [0i64, 1, 2, 3, 4, 5, 6, 7];
        let b = [4i64, 5, 6, 7, 8, 9, 10, 11];
        let idx = [-1, 0, 1, 1, 1, 0, 1, -1];
        let s = Shape::from((4, 2));
        let out = index_set(&a, &s, &b, &s, &idx, &s, 1).unwrap();
        assert_eq!(out, vec![5, 1, 2, 13, 9, 8, 6, 10]);
    }

    #[test]
    fn test_sliding_window() {
        let data = [0, 1, 2, 3, 4, 5, 6, 7];
        let out = sliding_window(&data, &Shape::from((4, 2)), &[3, 2], &[1, 1]);
        assert_eq!(out, vec![0, 1, 2, 3, 4, 5, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_permute_moves_rows() {
        let data = [0., 1., 2., 3., 4., 5.];
        let out = permute(&data, &Shape::from((3, 2)), 0, &[2, 0, 1]);
        assert_eq!(out, vec![4., 5., 0., 1., 2., 3.]);
    }

    #[test]
    fn test_slice_and_transpose() {
        let data: Vec<i64> = (0..6).collect();
        let shape = Shape::from((2, 3));
        let r = [
            SliceRange::full(2),
            SliceRange { start: 2, end: -1, step: -1 },
        ];
        assert_eq!(slice(&data, &shape, &r), vec![2, 1, 0, 5, 4, 3]);
        assert_eq!(transpose(&data, &shape, &[1, 0]), vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(expand(&[1., 2.], &Shape::from(2), 0, 2), vec![1., 2., 1., 2.]);
    }
}

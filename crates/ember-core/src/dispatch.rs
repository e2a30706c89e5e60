use crate::algebra;
use crate::dtype::{DType, Scalar};
use crate::engine::{Engine, NodeInfo, ScalarSide};
use crate::error::{Error, Result};
use crate::node::GraphNode;
use crate::op::{BinaryOp, Op, ReduceOp, UnaryOp};
use crate::policy;
use crate::shape::Shape;

// Operation dispatcher
//
// Every operation follows the same three steps:
//
//   1. validate   shape algebra + element type rules, no engine call yet
//   2. policy     materialize operands if the operation needs resident data
//   3. construct  one engine call, wrapped in a new owned GraphNode
//
// A failure in step 1 leaves the graph untouched, so the caller can fix the
// arguments and try again. Only `UseAfterRelease` and engine failures are
// fatal.

/// One side of a binary operation: a graph node or a plain scalar.
#[derive(Debug)]
pub enum Operand<'a, E: Engine> {
    Node(&'a GraphNode<E>),
    Scalar(Scalar),
}

impl<'a, E: Engine> Clone for Operand<'a, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, E: Engine> Copy for Operand<'a, E> {}

impl<'a, E: Engine> From<&'a GraphNode<E>> for Operand<'a, E> {
    fn from(node: &'a GraphNode<E>) -> Self {
        Operand::Node(node)
    }
}

impl<'a, E: Engine> From<Scalar> for Operand<'a, E> {
    fn from(s: Scalar) -> Self {
        Operand::Scalar(s)
    }
}

macro_rules! operand_from_element {
    ($($ty:ty),*) => {
        $(
            impl<'a, E: Engine> From<$ty> for Operand<'a, E> {
                fn from(v: $ty) -> Self {
                    Operand::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

operand_from_element!(i32, i64, f32, f64);

/// Log a rejected request before handing the error back.
pub(crate) fn validated<T>(op: Op, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if !e.is_fatal() {
            log::warn!("rejected {op}: {e}");
        }
    }
    result
}

// Binary operations

/// Build `lhs op rhs`. At least one side must be a graph node.
pub fn binary<'a, E: Engine>(
    op: BinaryOp,
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    match (lhs.into(), rhs.into()) {
        (Operand::Node(a), Operand::Node(b)) => binary_nodes(op, a, b),
        (Operand::Node(a), Operand::Scalar(s)) => binary_scalar(op, a, s, ScalarSide::Right),
        (Operand::Scalar(s), Operand::Node(b)) => binary_scalar(op, b, s, ScalarSide::Left),
        (Operand::Scalar(a), Operand::Scalar(b)) => validated(
            Op::Binary(op),
            Err(Error::UnsupportedOperandType(format!(
                "{} needs at least one graph node, got scalars {a} and {b}",
                op.name()
            ))),
        ),
    }
}

fn binary_nodes<E: Engine>(op: BinaryOp, a: &GraphNode<E>, b: &GraphNode<E>) -> Result<GraphNode<E>> {
    let shape = validated(Op::Binary(op), algebra::broadcast(op.name(), a.shape(), b.shape()))?;
    let out = NodeInfo::new(shape, op.result_dtype(a.dtype(), b.dtype()));
    let (ha, hb) = (a.handle()?, b.handle()?);
    GraphNode::build(a.engine(), Op::Binary(op), out, |e, out| e.binary(op, ha, hb, out))
}

fn binary_scalar<E: Engine>(
    op: BinaryOp,
    node: &GraphNode<E>,
    scalar: Scalar,
    side: ScalarSide,
) -> Result<GraphNode<E>> {
    let out = NodeInfo::new(
        node.shape().clone(),
        op.result_dtype(node.dtype(), scalar.dtype()),
    );
    let h = node.handle()?;
    GraphNode::build(node.engine(), Op::Binary(op), out, |e, out| {
        e.binary_scalar(op, h, scalar, side, out)
    })
}

pub fn add<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Add, lhs, rhs)
}

/// `minuend - subtrahend`.
pub fn sub<'a, E: Engine>(
    minuend: impl Into<Operand<'a, E>>,
    subtrahend: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Sub, minuend, subtrahend)
}

pub fn mul<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Mul, lhs, rhs)
}

/// `numerator / denominator`.
pub fn div<'a, E: Engine>(
    numerator: impl Into<Operand<'a, E>>,
    denominator: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Div, numerator, denominator)
}

/// `base ^ exponent`.
pub fn pow<'a, E: Engine>(
    base: impl Into<Operand<'a, E>>,
    exponent: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Pow, base, exponent)
}

pub fn equal<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Equal, lhs, rhs)
}

/// 1 where `lhs > rhs`, else 0.
pub fn greater<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Greater, lhs, rhs)
}

/// 1 where `lhs < rhs`, else 0.
pub fn less<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Less, lhs, rhs)
}

pub fn min<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Min, lhs, rhs)
}

pub fn max<'a, E: Engine>(
    lhs: impl Into<Operand<'a, E>>,
    rhs: impl Into<Operand<'a, E>>,
) -> Result<GraphNode<E>> {
    binary(BinaryOp::Max, lhs, rhs)
}

macro_rules! binary_methods {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            pub fn $name<'a>(&'a self, rhs: impl Into<Operand<'a, E>>) -> Result<Self> {
                binary($op, self, rhs)
            }
        )*
    };
}

macro_rules! unary_methods {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<Self> {
                self.unary($op)
            }
        )*
    };
}

impl<E: Engine> GraphNode<E> {
    //  Element-wise binary (self is the left operand)

    binary_methods! {
        add => BinaryOp::Add,
        sub => BinaryOp::Sub,
        mul => BinaryOp::Mul,
        div => BinaryOp::Div,
        pow => BinaryOp::Pow,
        equal => BinaryOp::Equal,
        greater => BinaryOp::Greater,
        less => BinaryOp::Less,
        minimum => BinaryOp::Min,
        maximum => BinaryOp::Max,
    }

    //  Element-wise unary

    pub fn unary(&self, op: UnaryOp) -> Result<Self> {
        let out = NodeInfo::new(self.shape().clone(), op.result_dtype(self.dtype()));
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Unary(op), out, |e, out| e.unary(op, h, out))
    }

    unary_methods! {
        log => UnaryOp::Log,
        log2 => UnaryOp::Log2,
        log10 => UnaryOp::Log10,
        sin => UnaryOp::Sin,
        cos => UnaryOp::Cos,
        tan => UnaryOp::Tan,
        asin => UnaryOp::Asin,
        acos => UnaryOp::Acos,
        atan => UnaryOp::Atan,
        sqrt => UnaryOp::Sqrt,
        exp => UnaryOp::Exp,
        neg => UnaryOp::Neg,
        abs => UnaryOp::Abs,
        sign => UnaryOp::Sign,
        even => UnaryOp::Even,
    }

    /// Element type conversion.
    pub fn convert(&self, dtype: DType) -> Result<Self> {
        let out = NodeInfo::new(self.shape().clone(), dtype);
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Convert, out, |e, out| e.convert(h, out))
    }

    //  Forcing operations

    /// Matrix product over the last two dimensions.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        let shape = validated(Op::Matmul, algebra::matmul(self.shape(), rhs.shape()))?;
        let out = NodeInfo::new(shape, DType::promote(self.dtype(), rhs.dtype()));
        policy::prepare(Op::Matmul, &[self, rhs])?;
        let (ha, hb) = (self.handle()?, rhs.handle()?);
        GraphNode::build(self.engine(), Op::Matmul, out, |e, out| e.matmul(ha, hb, out))
    }

    /// Reduce dimension `dim` away.
    pub fn reduce(&self, op: ReduceOp, dim: isize) -> Result<Self> {
        let kind = Op::Reduce(op);
        let (dim, shape) = validated(kind, algebra::reduce(self.shape(), dim))?;
        let out = NodeInfo::new(shape, self.dtype());
        policy::prepare(kind, &[self])?;
        let h = self.handle()?;
        GraphNode::build(self.engine(), kind, out, |e, out| e.reduce(op, h, dim, out))
    }

    pub fn reduce_sum(&self, dim: isize) -> Result<Self> {
        self.reduce(ReduceOp::Sum, dim)
    }

    pub fn reduce_mul(&self, dim: isize) -> Result<Self> {
        self.reduce(ReduceOp::Mul, dim)
    }

    pub fn reduce_min(&self, dim: isize) -> Result<Self> {
        self.reduce(ReduceOp::Min, dim)
    }

    pub fn reduce_max(&self, dim: isize) -> Result<Self> {
        self.reduce(ReduceOp::Max, dim)
    }

    /// Slide `kernel` over the node with the given stride; the last
    /// dimension is fully reduced.
    pub fn convolve(&self, kernel: &Self, stride: &[usize]) -> Result<Self> {
        let shape = validated(
            Op::Convolve,
            algebra::convolve(self.shape(), kernel.shape(), stride),
        )?;
        let out = NodeInfo::new(shape, DType::promote(self.dtype(), kernel.dtype()));
        policy::prepare(Op::Convolve, &[self, kernel])?;
        let (h, hk) = (self.handle()?, kernel.handle()?);
        GraphNode::build(self.engine(), Op::Convolve, out, |e, out| {
            e.convolve(h, hk, stride, out)
        })
    }

    /// Dual of `convolve`: the result has the kernel's shape and accumulates
    /// every product the kernel element took part in.
    pub fn slide(&self, kernel: &Self, stride: &[usize]) -> Result<Self> {
        let shape = validated(Op::Slide, algebra::slide(self.shape(), kernel.shape(), stride))?;
        let out = NodeInfo::new(shape, DType::promote(self.dtype(), kernel.dtype()));
        policy::prepare(Op::Slide, &[self, kernel])?;
        let (h, hk) = (self.handle()?, kernel.handle()?);
        GraphNode::build(self.engine(), Op::Slide, out, |e, out| e.slide(h, hk, stride, out))
    }

    //  Structural operations (always lazy)

    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        validated(Op::Reshape, algebra::reshape(self.shape(), &shape))?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Reshape, out, |e, out| e.reshape(h, out))
    }

    /// Rank-1 view of every element.
    pub fn flatten(&self) -> Result<Self> {
        self.reshape(algebra::flatten(self.shape()))
    }

    /// Merge dimension `dim` into `dim - 1`.
    pub fn flatten_dim(&self, dim: isize) -> Result<Self> {
        let shape = validated(Op::Reshape, algebra::flatten_dim(self.shape(), dim))?;
        self.reshape(shape)
    }

    /// Select `start..end` per leading dimension.
    pub fn slice(&self, start: &[isize], end: &[isize]) -> Result<Self> {
        self.slice_with_stride(start, end, &vec![1; start.len()])
    }

    /// Select `start..end` stepping by `stride` per leading dimension. A
    /// negative stride walks backwards and needs `start > end`.
    pub fn slice_with_stride(&self, start: &[isize], end: &[isize], stride: &[isize]) -> Result<Self> {
        let (ranges, shape) =
            validated(Op::Slice, algebra::slice(self.shape(), start, end, stride))?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Slice, out, |e, out| e.slice(h, &ranges, out))
    }

    /// Embed the node into a zero tensor of `shape` at `insert_at`.
    pub fn extend(&self, shape: impl Into<Shape>, insert_at: &[usize]) -> Result<Self> {
        self.extend_with_stride(shape, insert_at, &vec![1; self.rank()])
    }

    /// Like `extend`, leaving `|stride[i]| - 1` zeros between neighbours of
    /// dimension i (reversed where the stride is negative).
    pub fn extend_with_stride(
        &self,
        shape: impl Into<Shape>,
        insert_at: &[usize],
        stride: &[isize],
    ) -> Result<Self> {
        let shape = shape.into();
        validated(
            Op::Extend,
            algebra::extend(self.shape(), &shape, insert_at, stride),
        )?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Extend, out, |e, out| {
            e.extend(h, insert_at, stride, out)
        })
    }

    /// Join `other` after `self` along `axis`.
    pub fn concat(&self, other: &Self, axis: isize) -> Result<Self> {
        let (axis, shape) = validated(Op::Concat, algebra::concat(self.shape(), other.shape(), axis))?;
        let out = NodeInfo::new(shape, DType::promote(self.dtype(), other.dtype()));
        let (ha, hb) = (self.handle()?, other.handle()?);
        GraphNode::build(self.engine(), Op::Concat, out, |e, out| e.concat(ha, hb, axis, out))
    }

    /// Insert a dimension of `size` before `axis`, repeating the data.
    pub fn expand(&self, axis: isize, size: usize) -> Result<Self> {
        let (axis, shape) = validated(Op::Expand, algebra::expand(self.shape(), axis, size))?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Expand, out, |e, out| e.expand(h, axis, out))
    }

    /// Tile dimension i `repeats[i]` times.
    pub fn repeat(&self, repeats: &[usize]) -> Result<Self> {
        let shape = validated(Op::Repeat, algebra::repeat(self.shape(), repeats))?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Repeat, out, |e, out| e.repeat(h, repeats, out))
    }

    /// Permute dimensions: result dimension i is source dimension `axes[i]`.
    pub fn transpose(&self, axes: &[usize]) -> Result<Self> {
        let shape = validated(Op::Transpose, algebra::transpose(self.shape(), axes))?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Transpose, out, |e, out| e.transpose(h, axes, out))
    }

    /// Gather along dimension `indices.rank - 1`.
    pub fn index(&self, indices: &Self) -> Result<Self> {
        validated(Op::Index, require_integer("index", indices.dtype()))?;
        let (axis, shape) = validated(Op::Index, algebra::index(self.shape(), indices.shape()))?;
        let out = NodeInfo::new(shape, self.dtype());
        let (h, hi) = (self.handle()?, indices.handle()?);
        GraphNode::build(self.engine(), Op::Index, out, |e, out| e.index(h, hi, axis, out))
    }

    /// Scatter `b` into a copy of `self` at `indices`. Colliding sources are
    /// summed; an index of -1 discards the source element.
    pub fn index_set(&self, b: &Self, indices: &Self) -> Result<Self> {
        validated(Op::IndexSet, require_integer("index_set", indices.dtype()))?;
        let axis = validated(
            Op::IndexSet,
            algebra::index_set(self.shape(), b.shape(), indices.shape()),
        )?;
        let out = NodeInfo::new(self.shape().clone(), DType::promote(self.dtype(), b.dtype()));
        let (ha, hb, hi) = (self.handle()?, b.handle()?, indices.handle()?);
        GraphNode::build(self.engine(), Op::IndexSet, out, |e, out| {
            e.index_set(ha, hb, hi, axis, out)
        })
    }

    /// Every window of `size` stepped by `stride`, stacked along a new
    /// leading dimension.
    pub fn sliding_window(&self, size: &[usize], stride: &[usize]) -> Result<Self> {
        let shape = validated(
            Op::SlidingWindow,
            algebra::sliding_window(self.shape(), size, stride),
        )?;
        let out = NodeInfo::new(shape, self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::SlidingWindow, out, |e, out| {
            e.sliding_window(h, size, stride, out)
        })
    }

    /// Randomly reorder the entries along `axis`.
    pub fn permute(&self, axis: isize) -> Result<Self> {
        let axis = validated(
            Op::Permute,
            algebra::resolve_axis("permute", axis, self.rank()),
        )?;
        let out = NodeInfo::new(self.shape().clone(), self.dtype());
        let h = self.handle()?;
        GraphNode::build(self.engine(), Op::Permute, out, |e, out| e.permute(h, axis, out))
    }
}

pub(crate) fn require_integer(op: &'static str, indices: DType) -> Result<()> {
    if indices.is_int() {
        Ok(())
    } else {
        Err(Error::UnsupportedOperandType(format!(
            "{op} indices must be i32 or i64, got {indices}"
        )))
    }
}

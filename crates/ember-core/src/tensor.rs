use std::fmt;
use std::ops::Deref;

use crate::algebra;
use crate::dispatch;
use crate::dtype::{DType, Element, HostData, Scalar};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::node::GraphNode;
use crate::op::{BinaryOp, Op, ReduceOp};
use crate::shape::Shape;

// Tensor — user-facing value: a light scalar or a graph node
//
// Most values in a program are graph nodes. Plain numbers (learning rates,
// scale factors, loop constants) start life as LIGHT tensors: an in-process
// Scalar that the engine has never seen. Two light tensors combine without
// touching the engine at all.
//
// PROMOTION:
//
//   Light(scalar) ──promote(shape)──▶ Graph(constant node of `shape`)
//
// Promotion is one-way. A light operand meeting a graph operand is turned
// into a constant node with the graph side's shape; unary and shape
// operations on a light tensor see it as a `[1]` node. Those temporary
// constants are owned by the operation, not by the tensor: only
// `promote` changes what a tensor holds. The request is validated against
// the `[1]` shape before the constant is built, so a rejected operation
// leaves the engine untouched.

/// What a tensor currently holds.
pub enum Value<E: Engine> {
    Light(Scalar),
    Graph(GraphNode<E>),
}

/// A light scalar or an owned graph node, plus the engine it belongs to.
pub struct Tensor<E: Engine> {
    engine: E,
    value: Value<E>,
}

/// A graph node borrowed from a tensor or built on the spot for a light one.
enum NodeRef<'a, E: Engine> {
    Borrowed(&'a GraphNode<E>),
    Owned(GraphNode<E>),
}

impl<'a, E: Engine> Deref for NodeRef<'a, E> {
    type Target = GraphNode<E>;

    fn deref(&self) -> &GraphNode<E> {
        match self {
            NodeRef::Borrowed(n) => n,
            NodeRef::Owned(n) => n,
        }
    }
}

macro_rules! binary_tensor_ops {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            pub fn $name(&self, rhs: &Self) -> Result<Self> {
                self.binary($op, rhs)
            }
        )*
    };
}

macro_rules! unary_tensor_ops {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<Self> {
                self.map(|_| Ok(()), |n| n.$name())
            }
        )*
    };
}

impl<E: Engine> Tensor<E> {
    // Constructors

    /// A light tensor. Nothing is sent to the engine.
    pub fn scalar(engine: &E, value: impl Into<Scalar>) -> Self {
        Tensor {
            engine: engine.clone(),
            value: Value::Light(value.into()),
        }
    }

    pub fn from_node(node: GraphNode<E>) -> Self {
        Tensor {
            engine: node.engine().clone(),
            value: Value::Graph(node),
        }
    }

    /// A store node holding `data`.
    pub fn from_data(engine: &E, data: impl Into<HostData>, shape: impl Into<Shape>) -> Result<Self> {
        Ok(Self::from_node(GraphNode::store(engine, data, shape)?))
    }

    /// Shorthand for `from_data` with a typed vector.
    pub fn from_vec<T: Element>(engine: &E, data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        Self::from_data(engine, data, shape)
    }

    pub fn constant(engine: &E, value: impl Into<Scalar>, shape: impl Into<Shape>) -> Result<Self> {
        Ok(Self::from_node(GraphNode::constant(engine, value, shape)?))
    }

    pub fn random(engine: &E, shape: impl Into<Shape>) -> Result<Self> {
        Ok(Self::from_node(GraphNode::random(engine, shape)?))
    }

    pub fn arange(engine: &E, shape: impl Into<Shape>, axis: isize) -> Result<Self> {
        Ok(Self::from_node(GraphNode::arange(engine, shape, axis)?))
    }

    pub fn identity(engine: &E, n: usize) -> Result<Self> {
        Ok(Self::from_node(GraphNode::identity(engine, n)?))
    }

    // Accessors

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn value(&self) -> &Value<E> {
        &self.value
    }

    pub fn is_light(&self) -> bool {
        matches!(self.value, Value::Light(_))
    }

    /// The light value, if the tensor has not been promoted.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match &self.value {
            Value::Light(s) => Some(*s),
            Value::Graph(_) => None,
        }
    }

    pub fn node(&self) -> Option<&GraphNode<E>> {
        match &self.value {
            Value::Light(_) => None,
            Value::Graph(n) => Some(n),
        }
    }

    /// The shape; a light tensor reports `[1]`.
    pub fn shape(&self) -> Shape {
        match &self.value {
            Value::Light(_) => Shape::from(1),
            Value::Graph(n) => n.shape().clone(),
        }
    }

    pub fn dtype(&self) -> DType {
        match &self.value {
            Value::Light(s) => s.dtype(),
            Value::Graph(n) => n.dtype(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().rank()
    }

    // Promotion and lifecycle

    /// Turn a light tensor into a constant node of `shape`. A graph tensor is
    /// left as it is.
    pub fn promote(&mut self, shape: impl Into<Shape>) -> Result<&GraphNode<E>> {
        if let Value::Light(s) = self.value {
            let node = GraphNode::constant(&self.engine, s, shape)?;
            log::trace!("promoted light {s} to {node:?}");
            self.value = Value::Graph(node);
        }
        match &self.value {
            Value::Graph(n) => Ok(n),
            Value::Light(s) => Err(Error::engine(format!("light value {s} was not promoted"))),
        }
    }

    /// Take the node out; a light tensor is promoted to `[1]` first.
    pub fn into_node(mut self) -> Result<GraphNode<E>> {
        self.promote(1)?;
        match std::mem::replace(&mut self.value, Value::Light(Scalar::I32(0))) {
            Value::Graph(n) => Ok(n),
            Value::Light(s) => Err(Error::engine(format!("light value {s} was not promoted"))),
        }
    }

    /// A second tensor over the same value. Graph tensors share their node
    /// through an explicit reference increment.
    pub fn share(&self) -> Result<Self> {
        let value = match &self.value {
            Value::Light(s) => Value::Light(*s),
            Value::Graph(n) => Value::Graph(n.share()?),
        };
        Ok(Tensor {
            engine: self.engine.clone(),
            value,
        })
    }

    /// Release the node now. Any later use is `UseAfterRelease`. Closing a
    /// light tensor has nothing to give back.
    pub fn close(&mut self) -> Result<()> {
        match &mut self.value {
            Value::Light(_) => Ok(()),
            Value::Graph(n) => n.release(),
        }
    }

    /// Force the node's data to be resident.
    pub fn execute(&self) -> Result<()> {
        match &self.value {
            Value::Light(_) => Ok(()),
            Value::Graph(n) => n.ensure_computed(),
        }
    }

    pub fn read(&self) -> Result<HostData> {
        match &self.value {
            Value::Light(s) => Ok(HostData::filled(*s, 1)),
            Value::Graph(n) => n.read(),
        }
    }

    pub fn to_vec_f64(&self) -> Result<Vec<f64>> {
        Ok(self.read()?.to_f64_vec())
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.read()?.to_vec())
    }

    // Internal helpers

    fn graph(&self) -> Result<NodeRef<'_, E>> {
        match &self.value {
            Value::Graph(n) => Ok(NodeRef::Borrowed(n)),
            Value::Light(s) => Ok(NodeRef::Owned(GraphNode::constant(&self.engine, *s, 1)?)),
        }
    }

    /// Apply `f` to the graph form. `check` sees the shape first when the
    /// tensor is light.
    fn map<C, F>(&self, check: C, f: F) -> Result<Self>
    where
        C: FnOnce(&Shape) -> Result<()>,
        F: FnOnce(&GraphNode<E>) -> Result<GraphNode<E>>,
    {
        if self.is_light() {
            check(&self.shape())?;
        }
        let node = self.graph()?;
        Ok(Self::from_node(f(&node)?))
    }

    fn zip<C, F>(&self, other: &Self, check: C, f: F) -> Result<Self>
    where
        C: FnOnce(&Shape, &Shape) -> Result<()>,
        F: FnOnce(&GraphNode<E>, &GraphNode<E>) -> Result<GraphNode<E>>,
    {
        if self.is_light() || other.is_light() {
            check(&self.shape(), &other.shape())?;
        }
        let (a, b) = (self.graph()?, other.graph()?);
        Ok(Self::from_node(f(&a, &b)?))
    }

    // Element-wise binary

    /// `self op rhs`. Light-light stays light; a light side meeting a graph
    /// side becomes a constant node of the graph side's shape.
    pub fn binary(&self, op: BinaryOp, rhs: &Self) -> Result<Self> {
        let node = match (&self.value, &rhs.value) {
            (Value::Light(a), Value::Light(b)) => {
                return Ok(Tensor::scalar(&self.engine, a.binary(op, *b)?));
            }
            (Value::Graph(a), Value::Graph(b)) => dispatch::binary(op, a, b)?,
            (Value::Light(a), Value::Graph(b)) => {
                let a = GraphNode::constant(&self.engine, *a, b.shape().clone())?;
                dispatch::binary(op, &a, b)?
            }
            (Value::Graph(a), Value::Light(b)) => {
                let b = GraphNode::constant(&self.engine, *b, a.shape().clone())?;
                dispatch::binary(op, a, &b)?
            }
        };
        Ok(Self::from_node(node))
    }

    binary_tensor_ops! {
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

    // Element-wise unary

    unary_tensor_ops! {
        log, log2, log10, sin, cos, tan, asin, acos, atan, sqrt, exp, neg, abs, sign, even,
    }

    /// Element type conversion. A light tensor is cast in-process.
    pub fn convert(&self, dtype: DType) -> Result<Self> {
        match &self.value {
            Value::Light(s) => Ok(Tensor::scalar(&self.engine, s.cast(dtype))),
            Value::Graph(n) => Ok(Self::from_node(n.convert(dtype)?)),
        }
    }

    // Forcing operations

    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        self.zip(
            rhs,
            |a, b| checked(Op::Matmul, algebra::matmul(a, b)),
            |a, b| a.matmul(b),
        )
    }

    pub fn reduce(&self, op: ReduceOp, dim: isize) -> Result<Self> {
        self.map(
            |s| checked(Op::Reduce(op), algebra::reduce(s, dim)),
            |n| n.reduce(op, dim),
        )
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

    pub fn convolve(&self, kernel: &Self, stride: &[usize]) -> Result<Self> {
        self.zip(
            kernel,
            |a, k| checked(Op::Convolve, algebra::convolve(a, k, stride)),
            |a, k| a.convolve(k, stride),
        )
    }

    pub fn slide(&self, kernel: &Self, stride: &[usize]) -> Result<Self> {
        self.zip(
            kernel,
            |a, k| checked(Op::Slide, algebra::slide(a, k, stride)),
            |a, k| a.slide(k, stride),
        )
    }

    // Structural

    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        self.map(
            |s| checked(Op::Reshape, algebra::reshape(s, &shape)),
            |n| n.reshape(shape.clone()),
        )
    }

    pub fn flatten(&self) -> Result<Self> {
        self.map(|_| Ok(()), |n| n.flatten())
    }

    pub fn flatten_dim(&self, dim: isize) -> Result<Self> {
        self.map(
            |s| checked(Op::Reshape, algebra::flatten_dim(s, dim)),
            |n| n.flatten_dim(dim),
        )
    }

    pub fn slice(&self, start: &[isize], end: &[isize]) -> Result<Self> {
        self.slice_with_stride(start, end, &vec![1; start.len()])
    }

    pub fn slice_with_stride(&self, start: &[isize], end: &[isize], stride: &[isize]) -> Result<Self> {
        self.map(
            |s| checked(Op::Slice, algebra::slice(s, start, end, stride)),
            |n| n.slice_with_stride(start, end, stride),
        )
    }

    pub fn extend(&self, shape: impl Into<Shape>, insert_at: &[usize]) -> Result<Self> {
        self.extend_with_stride(shape, insert_at, &vec![1; self.rank()])
    }

    pub fn extend_with_stride(
        &self,
        shape: impl Into<Shape>,
        insert_at: &[usize],
        stride: &[isize],
    ) -> Result<Self> {
        let shape = shape.into();
        self.map(
            |s| checked(Op::Extend, algebra::extend(s, &shape, insert_at, stride)),
            |n| n.extend_with_stride(shape.clone(), insert_at, stride),
        )
    }

    pub fn concat(&self, other: &Self, axis: isize) -> Result<Self> {
        self.zip(
            other,
            |a, b| checked(Op::Concat, algebra::concat(a, b, axis)),
            |a, b| a.concat(b, axis),
        )
    }

    pub fn expand(&self, axis: isize, size: usize) -> Result<Self> {
        self.map(
            |s| checked(Op::Expand, algebra::expand(s, axis, size)),
            |n| n.expand(axis, size),
        )
    }

    pub fn repeat(&self, repeats: &[usize]) -> Result<Self> {
        self.map(
            |s| checked(Op::Repeat, algebra::repeat(s, repeats)),
            |n| n.repeat(repeats),
        )
    }

    pub fn transpose(&self, axes: &[usize]) -> Result<Self> {
        self.map(
            |s| checked(Op::Transpose, algebra::transpose(s, axes)),
            |n| n.transpose(axes),
        )
    }

    pub fn index(&self, indices: &Self) -> Result<Self> {
        self.zip(
            indices,
            |a, i| {
                checked(Op::Index, dispatch::require_integer("index", indices.dtype()))?;
                checked(Op::Index, algebra::index(a, i))
            },
            |a, i| a.index(i),
        )
    }

    pub fn index_set(&self, b: &Self, indices: &Self) -> Result<Self> {
        if [self, b, indices].iter().any(|t| t.is_light()) {
            checked(
                Op::IndexSet,
                dispatch::require_integer("index_set", indices.dtype()),
            )?;
            checked(
                Op::IndexSet,
                algebra::index_set(&self.shape(), &b.shape(), &indices.shape()),
            )?;
        }
        let (a, b, i) = (self.graph()?, b.graph()?, indices.graph()?);
        Ok(Self::from_node(a.index_set(&b, &i)?))
    }

    pub fn sliding_window(&self, size: &[usize], stride: &[usize]) -> Result<Self> {
        self.map(
            |s| checked(Op::SlidingWindow, algebra::sliding_window(s, size, stride)),
            |n| n.sliding_window(size, stride),
        )
    }

    pub fn permute(&self, axis: isize) -> Result<Self> {
        self.map(
            |s| checked(Op::Permute, algebra::resolve_axis("permute", axis, s.rank())),
            |n| n.permute(axis),
        )
    }
}

/// Validation outcome of a light operand, logged like the dispatcher's.
fn checked<T>(op: Op, result: Result<T>) -> Result<()> {
    dispatch::validated(op, result).map(drop)
}

impl<E: Engine> From<GraphNode<E>> for Tensor<E> {
    fn from(node: GraphNode<E>) -> Self {
        Tensor::from_node(node)
    }
}

impl<E: Engine> fmt::Debug for Tensor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Light(s) => write!(f, "Tensor(light {s})"),
            Value::Graph(n) => write!(f, "Tensor({n:?})"),
        }
    }
}

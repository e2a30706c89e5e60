use std::fmt;

use crate::algebra::SliceRange;
use crate::dtype::{DType, HostData, Scalar};
use crate::error::Result;
use crate::op::{BinaryOp, ReduceOp, UnaryOp};
use crate::shape::Shape;

// Engine — the external execution engine
//
// The core never computes values itself. It validates arguments, decides
// what has to be materialized, and then asks an engine to record a new node.
// The engine owns the graph: it hands out opaque handles, keeps a reference
// count per node, evaluates nodes on request and frees them on release.
//
// WHY A TRAIT?
//
// The engine is a fixed collaborator with its own lifetime rules (it may
// live in another process or on a device). A trait keeps the core generic
// over it, so the in-process reference engine and any native binding are
// interchangeable: GraphNode<E: Engine>, Tensor<E: Engine>.
//
// CONTRACT
//
// - Every construction method is called only after the core has validated
//   the arguments; `out` carries the already computed result shape and type.
// - A construction method returns a handle with reference count 1.
//   Predecessors referenced by the new node are retained by the engine.
// - `retain` returns a second handle to the same node and bumps its count;
//   `release` drops one count. A released handle must never be used again.
// - Using an unknown or released handle is `UseAfterRelease`.

/// Shape and element type of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    pub shape: Shape,
    pub dtype: DType,
}

impl NodeInfo {
    pub fn new(shape: Shape, dtype: DType) -> Self {
        NodeInfo { shape, dtype }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.shape, self.dtype)
    }
}

/// Which side of a node-scalar operation the scalar sits on.
///
/// `Sub`, `Div`, `Pow` and the comparisons are asymmetric: `5 - x` and
/// `x - 5` are different nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarSide {
    Left,
    Right,
}

/// The node-construction and lifecycle interface of an execution engine.
pub trait Engine: Clone + Send + Sync + fmt::Debug + 'static {
    /// Opaque handle to one reference of a node.
    type Handle: fmt::Debug + Send + Sync + 'static;

    /// A human-readable engine name (e.g. "cpu").
    fn name(&self) -> String;

    //  Leaf constructors

    /// A node holding `data`. It is materialized from the start.
    fn store(&self, data: HostData, out: &NodeInfo) -> Result<Self::Handle>;

    /// A node filled with `value`.
    fn constant(&self, value: Scalar, out: &NodeInfo) -> Result<Self::Handle>;

    /// Uniform random values in `[0, 1)`.
    fn random(&self, out: &NodeInfo) -> Result<Self::Handle>;

    /// Every element holds its own index along `axis`.
    fn arange(&self, axis: usize, out: &NodeInfo) -> Result<Self::Handle>;

    /// Square identity matrix.
    fn identity(&self, out: &NodeInfo) -> Result<Self::Handle>;

    //  Element-wise

    /// `lhs op rhs`, aligned at trailing dimensions.
    fn binary(
        &self,
        op: BinaryOp,
        lhs: &Self::Handle,
        rhs: &Self::Handle,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    /// `node op scalar` or `scalar op node`, depending on `side`.
    fn binary_scalar(
        &self,
        op: BinaryOp,
        node: &Self::Handle,
        scalar: Scalar,
        side: ScalarSide,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn unary(&self, op: UnaryOp, input: &Self::Handle, out: &NodeInfo) -> Result<Self::Handle>;

    /// Element type conversion to `out.dtype`.
    fn convert(&self, input: &Self::Handle, out: &NodeInfo) -> Result<Self::Handle>;

    //  Reductions and contractions (operands are materialized first)

    fn reduce(
        &self,
        op: ReduceOp,
        input: &Self::Handle,
        dim: usize,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn matmul(&self, lhs: &Self::Handle, rhs: &Self::Handle, out: &NodeInfo)
        -> Result<Self::Handle>;

    fn convolve(
        &self,
        input: &Self::Handle,
        kernel: &Self::Handle,
        stride: &[usize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn slide(
        &self,
        input: &Self::Handle,
        kernel: &Self::Handle,
        stride: &[usize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    //  Structural

    fn reshape(&self, input: &Self::Handle, out: &NodeInfo) -> Result<Self::Handle>;

    fn slice(
        &self,
        input: &Self::Handle,
        ranges: &[SliceRange],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn extend(
        &self,
        input: &Self::Handle,
        insert_at: &[usize],
        stride: &[isize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn concat(
        &self,
        a: &Self::Handle,
        b: &Self::Handle,
        axis: usize,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    /// Insert `out.shape[axis]` copies along a new dimension at `axis`.
    fn expand(&self, input: &Self::Handle, axis: usize, out: &NodeInfo) -> Result<Self::Handle>;

    fn repeat(
        &self,
        input: &Self::Handle,
        repeats: &[usize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn transpose(
        &self,
        input: &Self::Handle,
        axes: &[usize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn index(
        &self,
        input: &Self::Handle,
        indices: &Self::Handle,
        axis: usize,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn index_set(
        &self,
        a: &Self::Handle,
        b: &Self::Handle,
        indices: &Self::Handle,
        axis: usize,
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    fn sliding_window(
        &self,
        input: &Self::Handle,
        size: &[usize],
        stride: &[usize],
        out: &NodeInfo,
    ) -> Result<Self::Handle>;

    /// Randomly reorder the entries along `axis`.
    fn permute(&self, input: &Self::Handle, axis: usize, out: &NodeInfo) -> Result<Self::Handle>;

    //  Lifecycle

    /// Force the node's data to become resident. Blocks until done.
    fn execute(&self, handle: &Self::Handle) -> Result<()>;

    /// Whether the node's data is already resident.
    fn is_materialized(&self, handle: &Self::Handle) -> Result<bool>;

    /// Copy out the data of a materialized node.
    fn read(&self, handle: &Self::Handle) -> Result<HostData>;

    /// Take one more reference to the node.
    fn retain(&self, handle: &Self::Handle) -> Result<Self::Handle>;

    /// Drop one reference. The node is freed when the count reaches zero.
    fn release(&self, handle: Self::Handle) -> Result<()>;
}

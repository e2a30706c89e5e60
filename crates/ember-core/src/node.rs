use std::fmt;

use crate::dtype::{DType, Element, HostData, Scalar};
use crate::engine::{Engine, NodeInfo};
use crate::error::{Error, Result};
use crate::op::Op;
use crate::shape::Shape;

// GraphNode — owned handle to one node of the engine's graph
//
// A GraphNode owns exactly one reference to an engine node. It is NOT Clone:
// a second owner is only ever created through `share()`, which asks the
// engine to bump the node's reference count. The reference is given back
// exactly once, either by an explicit `release()` or when the GraphNode is
// dropped, whichever comes first.
//
// STATES:
//
//   Unmaterialized ──(execute / forced by an operation)──▶ Materialized
//         │                                                     │
//         └──────────────────(release / drop)───────────────────┴──▶ Released
//
// Once released the handle is gone; every further use returns the fatal
// `UseAfterRelease` error instead of touching the engine.

/// Lifecycle state of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Describes a pending computation.
    Unmaterialized,
    /// Result data is resident.
    Materialized,
    /// The reference has been given back to the engine.
    Released,
}

/// An owned reference to a node of a lazily evaluated graph.
pub struct GraphNode<E: Engine> {
    engine: E,
    handle: Option<E::Handle>,
    info: NodeInfo,
}

impl<E: Engine> GraphNode<E> {
    // Internal constructors

    pub(crate) fn from_handle(engine: E, handle: E::Handle, info: NodeInfo) -> Self {
        GraphNode {
            engine,
            handle: Some(handle),
            info,
        }
    }

    /// Ask the engine for a new node and take ownership of it.
    pub(crate) fn build<F>(engine: &E, op: Op, out: NodeInfo, construct: F) -> Result<Self>
    where
        F: FnOnce(&E, &NodeInfo) -> Result<E::Handle>,
    {
        let handle = construct(engine, &out)?;
        log::debug!("{}: built {} node {:?}", engine.name(), op, out);
        Ok(GraphNode::from_handle(engine.clone(), handle, out))
    }

    // Leaf constructors

    /// A node holding `data` with the given shape.
    pub fn store(engine: &E, data: impl Into<HostData>, shape: impl Into<Shape>) -> Result<Self> {
        let data = data.into();
        let shape = Shape::checked(shape.into().into_dims())?;
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let out = NodeInfo::new(shape, data.dtype());
        Self::build(engine, Op::Store, out, |e, out| e.store(data, out))
    }

    /// A node of `shape` filled with `value`; the element type is the value's.
    pub fn constant(engine: &E, value: impl Into<Scalar>, shape: impl Into<Shape>) -> Result<Self> {
        let value = value.into();
        let out = NodeInfo::new(Shape::checked(shape.into().into_dims())?, value.dtype());
        Self::build(engine, Op::Constant, out, |e, out| e.constant(value, out))
    }

    /// Uniform random `F64` values in `[0, 1)`.
    pub fn random(engine: &E, shape: impl Into<Shape>) -> Result<Self> {
        let out = NodeInfo::new(Shape::checked(shape.into().into_dims())?, DType::F64);
        Self::build(engine, Op::Random, out, |e, out| e.random(out))
    }

    /// `I64` node where every element holds its index along `axis`.
    pub fn arange(engine: &E, shape: impl Into<Shape>, axis: isize) -> Result<Self> {
        let shape = Shape::checked(shape.into().into_dims())?;
        let axis = crate::algebra::resolve_axis("arange", axis, shape.rank())?;
        let out = NodeInfo::new(shape, DType::I64);
        Self::build(engine, Op::Arange, out, |e, out| e.arange(axis, out))
    }

    /// `I32` identity matrix of shape `[n, n]`.
    pub fn identity(engine: &E, n: usize) -> Result<Self> {
        let out = NodeInfo::new(Shape::from((n, n)), DType::I32);
        Self::build(engine, Op::Identity, out, |e, out| e.identity(out))
    }

    // Accessors

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn shape(&self) -> &Shape {
        &self.info.shape
    }

    pub fn dtype(&self) -> DType {
        self.info.dtype
    }

    pub fn rank(&self) -> usize {
        self.info.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.info.shape.elem_count()
    }

    /// The engine handle, or `UseAfterRelease` once released.
    pub fn handle(&self) -> Result<&E::Handle> {
        match &self.handle {
            Some(h) => Ok(h),
            None => {
                log::error!("use of released {} node {:?}", self.engine.name(), self.info);
                Err(Error::UseAfterRelease)
            }
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    pub fn state(&self) -> Result<NodeState> {
        match &self.handle {
            None => Ok(NodeState::Released),
            Some(h) => Ok(if self.engine.is_materialized(h)? {
                NodeState::Materialized
            } else {
                NodeState::Unmaterialized
            }),
        }
    }

    // Lifecycle

    /// A second owner of the same node (explicit reference increment).
    pub fn share(&self) -> Result<Self> {
        let handle = self.engine.retain(self.handle()?)?;
        log::trace!("retain {:?}", handle);
        Ok(GraphNode::from_handle(
            self.engine.clone(),
            handle,
            self.info.clone(),
        ))
    }

    /// Give the reference back to the engine now instead of on drop.
    /// Releasing twice is `UseAfterRelease`.
    pub fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(h) => {
                log::trace!("release {:?}", h);
                self.engine.release(h)
            }
            None => {
                log::error!("double release of {} node {:?}", self.engine.name(), self.info);
                Err(Error::UseAfterRelease)
            }
        }
    }

    /// Force the node's data to become resident.
    pub fn execute(&self) -> Result<()> {
        self.engine.execute(self.handle()?)
    }

    /// Materialize the node unless its data is already resident.
    pub fn ensure_computed(&self) -> Result<()> {
        let handle = self.handle()?;
        if !self.engine.is_materialized(handle)? {
            log::debug!("forcing node {:?} {}", handle, self.info);
            self.engine.execute(handle)?;
        }
        Ok(())
    }

    /// Materialize and copy the data out.
    pub fn read(&self) -> Result<HostData> {
        self.ensure_computed()?;
        self.engine.read(self.handle()?)
    }

    pub fn to_vec_f64(&self) -> Result<Vec<f64>> {
        Ok(self.read()?.to_f64_vec())
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.read()?.to_vec())
    }
}

impl<E: Engine> Drop for GraphNode<E> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            log::trace!("drop {:?}", h);
            if let Err(e) = self.engine.release(h) {
                log::warn!("failed to release node on drop: {e}");
            }
        }
    }
}

impl<E: Engine> fmt::Debug for GraphNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(h) => write!(
                f,
                "GraphNode(handle={:?}, shape={}, dtype={})",
                h, self.info.shape, self.info.dtype
            ),
            None => write!(
                f,
                "GraphNode(released, shape={}, dtype={})",
                self.info.shape, self.info.dtype
            ),
        }
    }
}

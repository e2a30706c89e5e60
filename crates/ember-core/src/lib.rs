//! # ember-core
//!
//! Lazy tensor graph primitives for Ember.
//!
//! This crate provides:
//! - [`DType`] / [`Scalar`] / [`HostData`] — the closed set of element types
//! - [`Shape`] and the [`algebra`] module — shape and stride validation
//! - [`Engine`] trait — the interface of the external execution engine
//! - [`GraphNode`] — owned, reference-counted handle to a graph node
//! - [`dispatch`] — builds new nodes from operators and operands
//! - [`policy`] — decides which operations materialize their operands
//! - [`Tensor`] — a light scalar or a graph node
// - DType: supported numeric types (i32, i64, f32, f64) and promotion
// - Shape / algebra: dimension sequences and per-operation shape rules
// - Engine: node construction, materialization and release
// - GraphNode: lifecycle of one engine node (unmaterialized → materialized → released)
// - Dispatcher: validate → apply policy → construct
// - Tensor: user-facing Light | Graph value

pub mod algebra;
pub mod dispatch;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod node;
pub mod op;
pub mod policy;
pub mod shape;
pub mod tensor;

#[cfg(test)]
mod testing;

pub use algebra::SliceRange;
pub use dispatch::Operand;
pub use dtype::{DType, Element, HostData, Scalar};
pub use engine::{Engine, NodeInfo, ScalarSide};
pub use error::{Error, Result};
pub use node::{GraphNode, NodeState};
pub use op::{BinaryOp, Op, ReduceOp, UnaryOp};
pub use shape::Shape;
pub use tensor::{Tensor, Value};

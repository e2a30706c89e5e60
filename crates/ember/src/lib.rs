//! # Ember
//!
//! Lazily evaluated tensor computation graphs.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use ember::prelude::*;
//!
//! # fn main() -> ember::Result<()> {
//! let engine = CpuEngine::new();
//! let a = Tensor::from_vec(&engine, vec![1i32, 2, 3, 4, 5, 6], (2, 3))?;
//! let sums = a.reduce_sum(0)?;
//! assert_eq!(sums.to_vec::<i32>()?, vec![5, 7, 9]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `ember-core` | DType, Scalar, Shape, shape algebra, Engine trait, GraphNode, dispatcher, Tensor |
//! | `ember-cpu` | In-process reference engine with lazy evaluation and rayon kernels |
//! | `ember-data` | Dataset trait, collation, subsets, train/test splits, FakeDataset |

/// Re-export core types.
pub use ember_core::{
    algebra, dispatch, policy, BinaryOp, DType, Element, Engine, Error, GraphNode, HostData,
    NodeInfo, NodeState, Op, Operand, ReduceOp, Result, Scalar, ScalarSide, Shape, SliceRange,
    Tensor, UnaryOp, Value,
};

/// Re-export the CPU engine.
pub use ember_cpu::{CpuConfig, CpuEngine, NodeId};

/// Re-export datasets and collation.
pub mod data {
    pub use ember_data::*;
}

/// A tensor on the CPU engine.
pub type CpuTensor = Tensor<CpuEngine>;

/// A graph node on the CPU engine.
pub type CpuNode = GraphNode<CpuEngine>;

pub mod prelude {
    pub use crate::data::{collate, Collate, Dataset, FakeDataset, FakeEntry};
    pub use crate::{CpuConfig, CpuEngine, CpuNode, CpuTensor};
    pub use crate::{
        BinaryOp, DType, Engine, Error, GraphNode, NodeState, ReduceOp, Result, Scalar, Shape,
        Tensor, UnaryOp,
    };
}

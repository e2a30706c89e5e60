use crate::engine::Engine;
use crate::error::Result;
use crate::node::GraphNode;
use crate::op::Op;

// Execution trigger policy
//
// Some operations need every input element to produce a single output
// element: reductions, matrix products, convolution and its dual, slide.
// Their operands are materialized before the node is built, so the engine
// builds the new node on resident data instead of an ever-growing pending
// graph. Everything else (element-wise arithmetic, reshape, slice,
// transpose, concat, expand, ...) stays fully lazy.

/// True when `op` needs its operands materialized before construction.
pub fn forces_operands(op: Op) -> bool {
    matches!(op, Op::Matmul | Op::Reduce(_) | Op::Convolve | Op::Slide)
}

/// Apply the policy: materialize `operands` if `op` requires it.
///
/// Called by the dispatcher after validation and before construction, so a
/// forced node's data is resident before any node that consumes it exists.
pub fn prepare<E: Engine>(op: Op, operands: &[&GraphNode<E>]) -> Result<()> {
    if !forces_operands(op) {
        return Ok(());
    }
    for node in operands {
        node.ensure_computed()?;
    }
    Ok(())
}

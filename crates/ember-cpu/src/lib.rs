// CPU Engine — in-process reference execution engine
//
// This crate implements the ember-core Engine trait entirely in process. It
// is the engine the test-suites run against and the reference every native
// engine binding is compared with.
//
// ARCHITECTURE:
// - CpuEngine is a cheap clonable handle (Arc) onto one shared GraphState
// - GraphState maps NodeId → Entry; an Entry records what the node computes
//   (NodeKind), its shape and element type, its reference count and, once
//   materialized, its data
// - Construction only records the node and retains its predecessors;
//   nothing is computed until `execute` (or eager mode) asks for it
// - Evaluation walks the graph with an explicit stack, never recursion, so
//   arbitrarily deep chains evaluate; a shared predecessor is computed once
//   and dropped after its last consumer. Only the executed node keeps data
// - Integer nodes hold i64 and float nodes f64 (see buffer.rs), fitted to
//   the node's element type after every kernel
// - `random` and `permute` draw from one StdRng, seeded from CpuConfig
//
// USAGE:
//   let engine = CpuEngine::with_config(CpuConfig::default().seed(7));
//   let a = Tensor::from_vec(&engine, vec![1.0f32, 2.0, 3.0], 3)?;
//   let b = a.add(&Tensor::scalar(&engine, 1.0f32))?;
//   assert_eq!(b.to_vec::<f32>()?, vec![2.0, 3.0, 4.0]);

mod buffer;
mod config;
mod kernels;
pub mod layout;

pub use config::CpuConfig;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use ember_core::{
    BinaryOp, DType, Engine, Error, HostData, NodeInfo, ReduceOp, Result, Scalar, ScalarSide,
    Shape, SliceRange, UnaryOp,
};

use crate::buffer::{map_buffer, Buffer};
use crate::kernels::Num;

/// Run a kernel on i64 elements when `dtype` is an integer type and on f64
/// elements otherwise; `$t` names the element type inside `$body`.
macro_rules! by_kind {
    ($dtype:expr, $t:ident => $body:expr) => {
        if $dtype.is_int() {
            type $t = i64;
            <$t as Num>::wrap($body)
        } else {
            type $t = f64;
            <$t as Num>::wrap($body)
        }
    };
}

/// Handle to one node of a CpuEngine graph. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// NodeKind — what a node computes and from which predecessors

#[derive(Debug, Clone)]
enum NodeKind {
    Store,
    Random,
    Constant(Scalar),
    Arange(usize),
    Identity,
    Binary(BinaryOp, NodeId, NodeId),
    BinaryScalar(BinaryOp, NodeId, Scalar, ScalarSide),
    Unary(UnaryOp, NodeId),
    Convert(NodeId),
    Reduce(ReduceOp, NodeId, usize),
    Matmul(NodeId, NodeId),
    Convolve(NodeId, NodeId, Vec<usize>),
    Slide(NodeId, NodeId, Vec<usize>),
    Reshape(NodeId),
    Slice(NodeId, Vec<SliceRange>),
    Extend(NodeId, Vec<usize>, Vec<isize>),
    Concat(NodeId, NodeId, usize),
    Expand(NodeId, usize),
    Repeat(NodeId),
    Transpose(NodeId, Vec<usize>),
    Index(NodeId, NodeId, usize),
    IndexSet(NodeId, NodeId, NodeId, usize),
    SlidingWindow(NodeId, Vec<usize>, Vec<usize>),
    Permute(NodeId, usize, Vec<usize>),
}

impl NodeKind {
    /// Predecessors, in the order evaluation hands their data to the kernel.
    fn inputs(&self) -> Vec<NodeId> {
        use NodeKind::*;
        match self {
            Store | Random | Constant(_) | Arange(_) | Identity => vec![],
            Unary(_, a)
            | Convert(a)
            | Reduce(_, a, _)
            | Reshape(a)
            | Slice(a, _)
            | Extend(a, _, _)
            | Expand(a, _)
            | Repeat(a)
            | Transpose(a, _)
            | SlidingWindow(a, _, _)
            | Permute(a, _, _)
            | BinaryScalar(_, a, _, _) => vec![*a],
            Binary(_, a, b)
            | Matmul(a, b)
            | Convolve(a, b, _)
            | Slide(a, b, _)
            | Concat(a, b, _)
            | Index(a, b, _) => vec![*a, *b],
            IndexSet(a, b, i, _) => vec![*a, *b, *i],
        }
    }
}

#[derive(Debug)]
struct Entry {
    kind: NodeKind,
    info: NodeInfo,
    refs: usize,
    data: Option<Arc<Buffer>>,
}

struct GraphState {
    next_id: u64,
    nodes: HashMap<NodeId, Entry>,
    rng: StdRng,
}

impl GraphState {
    fn entry(&self, id: NodeId) -> Result<&Entry> {
        self.nodes.get(&id).ok_or(Error::UseAfterRelease)
    }

    fn info(&self, id: NodeId) -> Result<&NodeInfo> {
        Ok(&self.entry(id)?.info)
    }

    fn shape(&self, id: NodeId) -> Result<&Shape> {
        Ok(&self.entry(id)?.info.shape)
    }
}

// CpuEngine

/// The in-process engine. Clones share the same graph.
#[derive(Clone)]
pub struct CpuEngine {
    state: Arc<Mutex<GraphState>>,
    config: CpuConfig,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::debug!("cpu engine created with {:?}", config);
        CpuEngine {
            state: Arc::new(Mutex::new(GraphState {
                next_id: 0,
                nodes: HashMap::new(),
                rng,
            })),
            config,
        }
    }

    /// Engine configured from `EMBER_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(CpuConfig::from_env())
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Number of nodes still held by at least one reference.
    pub fn live_nodes(&self) -> Result<usize> {
        Ok(self.lock()?.nodes.len())
    }

    /// Current reference count of a node, or `None` once it is freed.
    pub fn ref_count(&self, id: &NodeId) -> Result<Option<usize>> {
        Ok(self.lock()?.nodes.get(id).map(|e| e.refs))
    }

    fn lock(&self) -> Result<MutexGuard<'_, GraphState>> {
        self.state
            .lock()
            .map_err(|_| Error::engine("cpu graph state lock poisoned"))
    }

    /// Record a node, retaining its predecessors.
    fn insert(&self, kind: NodeKind, out: &NodeInfo, data: Option<Buffer>) -> Result<NodeId> {
        let id = {
            let mut st = self.lock()?;
            let inputs = kind.inputs();
            for p in &inputs {
                st.entry(*p)?;
            }
            for p in &inputs {
                if let Some(e) = st.nodes.get_mut(p) {
                    e.refs += 1;
                }
            }
            let id = NodeId(st.next_id);
            st.next_id += 1;
            log::trace!("cpu: {id} = {:?} {}", kind, out);
            st.nodes.insert(
                id,
                Entry {
                    kind,
                    info: out.clone(),
                    refs: 1,
                    data: data.map(Arc::new),
                },
            );
            id
        };
        if self.config.eager {
            if let Err(e) = self.execute(&id) {
                if let Err(release_err) = self.release(id) {
                    log::warn!("cpu: failed to release {id} after eager error: {release_err}");
                }
                return Err(e);
            }
        }
        Ok(id)
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CpuEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.state.try_lock().map(|st| st.nodes.len()).ok();
        f.debug_struct("CpuEngine")
            .field("config", &self.config)
            .field("live_nodes", &live)
            .finish()
    }
}

// Evaluation

/// Compute the data of `root`, returning it with the number of nodes
/// evaluated.
///
/// A post-order walk on an explicit stack lists every node whose data is not
/// resident, inputs before consumers. Each is then computed once; its result
/// is kept only until the last listed consumer has read it.
fn evaluate(st: &GraphState, root: NodeId, threshold: usize) -> Result<(Arc<Buffer>, usize)> {
    if let Some(data) = &st.entry(root)?.data {
        return Ok((data.clone(), 0));
    }

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root, false)];
    while let Some((id, done)) = stack.pop() {
        if done {
            order.push(id);
            continue;
        }
        if !visited.insert(id) {
            continue;
        }
        stack.push((id, true));
        for p in st.entry(id)?.kind.inputs() {
            if !visited.contains(&p) && st.entry(p)?.data.is_none() {
                stack.push((p, false));
            }
        }
    }

    let mut uses: HashMap<NodeId, usize> = HashMap::new();
    for id in &order {
        for p in st.entry(*id)?.kind.inputs() {
            *uses.entry(p).or_default() += 1;
        }
    }

    let mut memo: HashMap<NodeId, Arc<Buffer>> = HashMap::new();
    for &id in &order {
        let entry = st.entry(id)?;
        let preds = entry.kind.inputs();
        let inputs = preds
            .iter()
            .map(|p| match memo.get(p) {
                Some(data) => Ok(data.clone()),
                None => st.entry(*p)?.data.clone().ok_or_else(|| {
                    Error::engine(format!("cpu: input {p} of {id} was not computed"))
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        let data = compute(st, id, entry, &inputs, threshold)?;
        drop(inputs);
        for p in &preds {
            if let Some(left) = uses.get_mut(p) {
                *left -= 1;
                if *left == 0 {
                    memo.remove(p);
                }
            }
        }
        memo.insert(id, Arc::new(data));
    }

    let data = memo
        .remove(&root)
        .ok_or_else(|| Error::engine(format!("cpu: {root} was not computed")))?;
    Ok((data, order.len()))
}

/// Run the kernel of one node on the data of its predecessors.
fn compute(
    st: &GraphState,
    id: NodeId,
    entry: &Entry,
    inputs: &[Arc<Buffer>],
    threshold: usize,
) -> Result<Buffer> {
    let out = &entry.info;
    let n = out.shape.elem_count();

    use NodeKind::*;
    let data = match &entry.kind {
        Store | Random => {
            return Err(Error::engine(format!("cpu: leaf {id} has no data")));
        }
        Constant(v) => Buffer::filled(*v, n),
        Arange(axis) => Buffer::Int(kernels::arange(&out.shape, *axis)),
        Identity => Buffer::Int(kernels::identity(out.shape.dims()[0])),
        Binary(op, a, b) => {
            let common = DType::promote(st.info(*a)?.dtype, st.info(*b)?.dtype);
            kernels::binary(*op, &inputs[0], &inputs[1], common, n, threshold)
        }
        BinaryScalar(op, a, s, side) => {
            let common = DType::promote(st.info(*a)?.dtype, s.dtype());
            let s = Buffer::filled(*s, 1);
            match side {
                ScalarSide::Left => kernels::binary(*op, &s, &inputs[0], common, n, threshold),
                ScalarSide::Right => kernels::binary(*op, &inputs[0], &s, common, n, threshold),
            }
        }
        Unary(op, a) => kernels::unary(*op, &inputs[0], st.info(*a)?.dtype, out.dtype, threshold),
        Convert(_) => inputs[0].convert(out.dtype),
        Reshape(_) => Buffer::clone(&inputs[0]),
        Reduce(op, a, dim) => {
            map_buffer!(&*inputs[0], d => kernels::reduce(*op, d, st.shape(*a)?, *dim))
        }
        Matmul(a, b) => by_kind!(out.dtype, T => kernels::matmul(
            &T::view(&inputs[0]),
            st.shape(*a)?,
            &T::view(&inputs[1]),
            st.shape(*b)?,
            threshold,
        )),
        Convolve(a, k, stride) => by_kind!(out.dtype, T => kernels::convolve(
            &T::view(&inputs[0]),
            st.shape(*a)?,
            &T::view(&inputs[1]),
            st.shape(*k)?,
            stride,
        )),
        Slide(a, k, stride) => by_kind!(out.dtype, T => kernels::slide(
            &T::view(&inputs[0]),
            st.shape(*a)?,
            &T::view(&inputs[1]),
            st.shape(*k)?,
            stride,
        )),
        Slice(a, ranges) => map_buffer!(&*inputs[0], d => kernels::slice(d, st.shape(*a)?, ranges)),
        Extend(a, insert_at, stride) => map_buffer!(&*inputs[0], d => kernels::extend(
            d,
            st.shape(*a)?,
            &out.shape,
            insert_at,
            stride,
        )),
        Concat(a, _, axis) => by_kind!(out.dtype, T => kernels::concat(
            &T::view(&inputs[0]),
            st.shape(*a)?,
            &T::view(&inputs[1]),
            *axis,
        )),
        Expand(a, axis) => map_buffer!(&*inputs[0], d => kernels::expand(
            d,
            st.shape(*a)?,
            *axis,
            out.shape.dims()[*axis],
        )),
        Repeat(a) => map_buffer!(&*inputs[0], d => kernels::repeat(d, st.shape(*a)?, &out.shape)),
        Transpose(a, axes) => map_buffer!(&*inputs[0], d => kernels::transpose(d, st.shape(*a)?, axes)),
        Index(a, i, axis) => map_buffer!(&*inputs[0], d => kernels::index(
            d,
            st.shape(*a)?,
            &inputs[1].ints(),
            st.shape(*i)?,
            *axis,
            &out.shape,
        )?),
        IndexSet(a, b, i, axis) => by_kind!(out.dtype, T => kernels::index_set(
            &T::view(&inputs[0]),
            st.shape(*a)?,
            &T::view(&inputs[1]),
            st.shape(*b)?,
            &inputs[2].ints(),
            st.shape(*i)?,
            *axis,
        )?),
        SlidingWindow(a, size, stride) => {
            map_buffer!(&*inputs[0], d => kernels::sliding_window(d, st.shape(*a)?, size, stride))
        }
        Permute(a, axis, perm) => {
            map_buffer!(&*inputs[0], d => kernels::permute(d, st.shape(*a)?, *axis, perm))
        }
    };
    Ok(data.fit(out.dtype))
}

// Engine trait implementation

impl Engine for CpuEngine {
    type Handle = NodeId;

    fn name(&self) -> String {
        "cpu".to_string()
    }

    fn store(&self, data: HostData, out: &NodeInfo) -> Result<NodeId> {
        if data.len() != out.shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: out.shape.clone(),
                expected: out.shape.elem_count(),
                got: data.len(),
            });
        }
        let values = Buffer::from_host(data).fit(out.dtype);
        self.insert(NodeKind::Store, out, Some(values))
    }

    fn constant(&self, value: Scalar, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Constant(value), out, None)
    }

    fn random(&self, out: &NodeInfo) -> Result<NodeId> {
        let values = {
            let mut st = self.lock()?;
            (0..out.shape.elem_count())
                .map(|_| st.rng.gen::<f64>())
                .collect::<Vec<_>>()
        };
        self.insert(NodeKind::Random, out, Some(Buffer::Float(values)))
    }

    fn arange(&self, axis: usize, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Arange(axis), out, None)
    }

    fn identity(&self, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Identity, out, None)
    }

    fn binary(&self, op: BinaryOp, lhs: &NodeId, rhs: &NodeId, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Binary(op, *lhs, *rhs), out, None)
    }

    fn binary_scalar(
        &self,
        op: BinaryOp,
        node: &NodeId,
        scalar: Scalar,
        side: ScalarSide,
        out: &NodeInfo,
    ) -> Result<NodeId> {
        self.insert(NodeKind::BinaryScalar(op, *node, scalar, side), out, None)
    }

    fn unary(&self, op: UnaryOp, input: &NodeId, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Unary(op, *input), out, None)
    }

    fn convert(&self, input: &NodeId, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Convert(*input), out, None)
    }

    fn reduce(&self, op: ReduceOp, input: &NodeId, dim: usize, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Reduce(op, *input, dim), out, None)
    }

    fn matmul(&self, lhs: &NodeId, rhs: &NodeId, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Matmul(*lhs, *rhs), out, None)
    }

    fn convolve(
        &self,
        input: &NodeId,
        kernel: &NodeId,
        stride: &[usize],
        out: &NodeInfo,
    ) -> Result<NodeId> {
        self.insert(NodeKind::Convolve(*input, *kernel, stride.to_vec()), out, None)
    }

    fn slide(&self, input: &NodeId, kernel: &NodeId, stride: &[usize], out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Slide(*input, *kernel, stride.to_vec()), out, None)
    }

    fn reshape(&self, input: &NodeId, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Reshape(*input), out, None)
    }

    fn slice(&self, input: &NodeId, ranges: &[SliceRange], out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Slice(*input, ranges.to_vec()), out, None)
    }

    fn extend(
        &self,
        input: &NodeId,
        insert_at: &[usize],
        stride: &[isize],
        out: &NodeInfo,
    ) -> Result<NodeId> {
        self.insert(
            NodeKind::Extend(*input, insert_at.to_vec(), stride.to_vec()),
            out,
            None,
        )
    }

    fn concat(&self, a: &NodeId, b: &NodeId, axis: usize, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Concat(*a, *b, axis), out, None)
    }

    fn expand(&self, input: &NodeId, axis: usize, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Expand(*input, axis), out, None)
    }

    fn repeat(&self, input: &NodeId, _repeats: &[usize], out: &NodeInfo) -> Result<NodeId> {
        // the output shape already carries the repeat counts
        self.insert(NodeKind::Repeat(*input), out, None)
    }

    fn transpose(&self, input: &NodeId, axes: &[usize], out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Transpose(*input, axes.to_vec()), out, None)
    }

    fn index(&self, input: &NodeId, indices: &NodeId, axis: usize, out: &NodeInfo) -> Result<NodeId> {
        self.insert(NodeKind::Index(*input, *indices, axis), out, None)
    }

    fn index_set(
        &self,
        a: &NodeId,
        b: &NodeId,
        indices: &NodeId,
        axis: usize,
        out: &NodeInfo,
    ) -> Result<NodeId> {
        self.insert(NodeKind::IndexSet(*a, *b, *indices, axis), out, None)
    }

    fn sliding_window(
        &self,
        input: &NodeId,
        size: &[usize],
        stride: &[usize],
        out: &NodeInfo,
    ) -> Result<NodeId> {
        self.insert(
            NodeKind::SlidingWindow(*input, size.to_vec(), stride.to_vec()),
            out,
            None,
        )
    }

    fn permute(&self, input: &NodeId, axis: usize, out: &NodeInfo) -> Result<NodeId> {
        let perm = {
            let mut st = self.lock()?;
            let mut perm: Vec<usize> = (0..out.shape.dims()[axis]).collect();
            perm.shuffle(&mut st.rng);
            perm
        };
        self.insert(NodeKind::Permute(*input, axis, perm), out, None)
    }

    fn execute(&self, handle: &NodeId) -> Result<()> {
        let mut st = self.lock()?;
        if st.entry(*handle)?.data.is_some() {
            return Ok(());
        }
        let (data, evaluated) = evaluate(&st, *handle, self.config.parallel_threshold)?;
        log::debug!("cpu: executed {handle} ({evaluated} nodes evaluated)");
        if let Some(entry) = st.nodes.get_mut(handle) {
            entry.data = Some(data);
        }
        Ok(())
    }

    fn is_materialized(&self, handle: &NodeId) -> Result<bool> {
        Ok(self.lock()?.entry(*handle)?.data.is_some())
    }

    fn read(&self, handle: &NodeId) -> Result<HostData> {
        let st = self.lock()?;
        let entry = st.entry(*handle)?;
        let data = match &entry.data {
            Some(d) => d.clone(),
            None => evaluate(&st, *handle, self.config.parallel_threshold)?.0,
        };
        Ok(data.to_host(entry.info.dtype))
    }

    fn retain(&self, handle: &NodeId) -> Result<NodeId> {
        let mut st = self.lock()?;
        let entry = st.nodes.get_mut(handle).ok_or(Error::UseAfterRelease)?;
        entry.refs += 1;
        log::trace!("cpu: retain {handle} -> {}", entry.refs);
        Ok(*handle)
    }

    fn release(&self, handle: NodeId) -> Result<()> {
        let mut st = self.lock()?;
        st.entry(handle)?;
        let mut pending = vec![handle];
        while let Some(id) = pending.pop() {
            let Some(entry) = st.nodes.get_mut(&id) else {
                continue;
            };
            entry.refs -= 1;
            if entry.refs == 0 {
                if let Some(freed) = st.nodes.remove(&id) {
                    log::trace!("cpu: freed {id}");
                    pending.extend(freed.kind.inputs());
                }
            }
        }
        Ok(())
    }
}

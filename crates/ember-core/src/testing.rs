use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::algebra::SliceRange;
use crate::dtype::{HostData, Scalar};
use crate::engine::{Engine, NodeInfo, ScalarSide};
use crate::error::{Error, Result};
use crate::op::{BinaryOp, ReduceOp, UnaryOp};

// RecordingEngine — an engine that computes nothing
//
// It records every construction and lifecycle call and tracks reference
// counts, so the unit tests of this crate can check the order in which the
// dispatcher talks to an engine without depending on a real one.

#[derive(Debug, Default)]
struct Recorder {
    next: u64,
    calls: Vec<String>,
    refs: HashMap<u64, usize>,
    materialized: HashSet<u64>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingEngine {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingEngine {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn live(&self) -> usize {
        self.inner.lock().unwrap().refs.len()
    }

    fn node(&self, call: String, materialized: bool) -> Result<u64> {
        let mut r = self.inner.lock().unwrap();
        r.next += 1;
        let id = r.next;
        r.refs.insert(id, 1);
        if materialized {
            r.materialized.insert(id);
        }
        r.calls.push(call);
        Ok(id)
    }

    fn check(&self, h: &u64) -> Result<()> {
        if self.inner.lock().unwrap().refs.contains_key(h) {
            Ok(())
        } else {
            Err(Error::UseAfterRelease)
        }
    }
}

impl Engine for RecordingEngine {
    type Handle = u64;

    fn name(&self) -> String {
        "recording".into()
    }

    fn store(&self, _data: HostData, out: &NodeInfo) -> Result<u64> {
        self.node(format!("store {out}"), true)
    }

    fn constant(&self, value: Scalar, out: &NodeInfo) -> Result<u64> {
        self.node(format!("constant {value} {out}"), false)
    }

    fn random(&self, out: &NodeInfo) -> Result<u64> {
        self.node(format!("random {out}"), false)
    }

    fn arange(&self, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.node(format!("arange {axis} {out}"), false)
    }

    fn identity(&self, out: &NodeInfo) -> Result<u64> {
        self.node(format!("identity {out}"), false)
    }

    fn binary(&self, op: BinaryOp, lhs: &u64, rhs: &u64, out: &NodeInfo) -> Result<u64> {
        self.check(lhs)?;
        self.check(rhs)?;
        self.node(format!("binary {op:?} {out}"), false)
    }

    fn binary_scalar(
        &self,
        op: BinaryOp,
        node: &u64,
        scalar: Scalar,
        side: ScalarSide,
        out: &NodeInfo,
    ) -> Result<u64> {
        self.check(node)?;
        self.node(format!("binary_scalar {op:?} {scalar} {side:?} {out}"), false)
    }

    fn unary(&self, op: UnaryOp, input: &u64, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("unary {op:?} {out}"), false)
    }

    fn convert(&self, input: &u64, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("convert {out}"), false)
    }

    fn reduce(&self, op: ReduceOp, input: &u64, dim: usize, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("reduce {op:?} {dim} {out}"), false)
    }

    fn matmul(&self, lhs: &u64, rhs: &u64, out: &NodeInfo) -> Result<u64> {
        self.check(lhs)?;
        self.check(rhs)?;
        self.node(format!("matmul {out}"), false)
    }

    fn convolve(&self, input: &u64, kernel: &u64, _stride: &[usize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.check(kernel)?;
        self.node(format!("convolve {out}"), false)
    }

    fn slide(&self, input: &u64, kernel: &u64, _stride: &[usize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.check(kernel)?;
        self.node(format!("slide {out}"), false)
    }

    fn reshape(&self, input: &u64, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("reshape {out}"), false)
    }

    fn slice(&self, input: &u64, _ranges: &[SliceRange], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("slice {out}"), false)
    }

    fn extend(&self, input: &u64, _at: &[usize], _stride: &[isize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("extend {out}"), false)
    }

    fn concat(&self, a: &u64, b: &u64, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.check(a)?;
        self.check(b)?;
        self.node(format!("concat {axis} {out}"), false)
    }

    fn expand(&self, input: &u64, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("expand {axis} {out}"), false)
    }

    fn repeat(&self, input: &u64, _repeats: &[usize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("repeat {out}"), false)
    }

    fn transpose(&self, input: &u64, _axes: &[usize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("transpose {out}"), false)
    }

    fn index(&self, input: &u64, indices: &u64, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.check(indices)?;
        self.node(format!("index {axis} {out}"), false)
    }

    fn index_set(&self, a: &u64, b: &u64, indices: &u64, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.check(a)?;
        self.check(b)?;
        self.check(indices)?;
        self.node(format!("index_set {axis} {out}"), false)
    }

    fn sliding_window(&self, input: &u64, _size: &[usize], _stride: &[usize], out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("sliding_window {out}"), false)
    }

    fn permute(&self, input: &u64, axis: usize, out: &NodeInfo) -> Result<u64> {
        self.check(input)?;
        self.node(format!("permute {axis} {out}"), false)
    }

    fn execute(&self, handle: &u64) -> Result<()> {
        self.check(handle)?;
        let mut r = self.inner.lock().unwrap();
        r.materialized.insert(*handle);
        r.calls.push(format!("execute {handle}"));
        Ok(())
    }

    fn is_materialized(&self, handle: &u64) -> Result<bool> {
        self.check(handle)?;
        Ok(self.inner.lock().unwrap().materialized.contains(handle))
    }

    fn read(&self, handle: &u64) -> Result<HostData> {
        self.check(handle)?;
        Ok(HostData::F64(Vec::new()))
    }

    fn retain(&self, handle: &u64) -> Result<u64> {
        let mut r = self.inner.lock().unwrap();
        match r.refs.get_mut(handle) {
            Some(n) => *n += 1,
            None => return Err(Error::UseAfterRelease),
        }
        r.calls.push(format!("retain {handle}"));
        Ok(*handle)
    }

    fn release(&self, handle: u64) -> Result<()> {
        let mut r = self.inner.lock().unwrap();
        let n = r.refs.get_mut(&handle).ok_or(Error::UseAfterRelease)?;
        *n -= 1;
        if *n == 0 {
            r.refs.remove(&handle);
            r.materialized.remove(&handle);
        }
        r.calls.push(format!("release {handle}"));
        Ok(())
    }
}

use std::fmt;

use crate::dtype::DType;

// Operator enums
//
// These enums serve two purposes:
// 1. They parameterize the engine entry points (one trait method per
//    category instead of one per operator).
// 2. They are recorded in the `Op` descriptor, which the execution trigger
//    policy and the logs use to know WHICH operation is being built.

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Equal,
    Greater,
    Less,
    Min,
    Max,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 10] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Pow,
        BinaryOp::Equal,
        BinaryOp::Greater,
        BinaryOp::Less,
        BinaryOp::Min,
        BinaryOp::Max,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
            BinaryOp::Equal => "equal",
            BinaryOp::Greater => "greater",
            BinaryOp::Less => "less",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
        }
    }

    /// Comparisons produce 0/1 values.
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::Greater | BinaryOp::Less)
    }

    /// Element type of `lhs op rhs`: comparisons are always `I32`, everything
    /// else follows the promotion rank.
    pub fn result_dtype(&self, lhs: DType, rhs: DType) -> DType {
        if self.is_comparison() {
            DType::I32
        } else {
            DType::promote(lhs, rhs)
        }
    }
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Log,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Exp,
    Neg,
    Abs,
    Sign,
    Even,
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Log => "log",
            UnaryOp::Log2 => "log2",
            UnaryOp::Log10 => "log10",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Exp => "exp",
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Sign => "sign",
            UnaryOp::Even => "even",
        }
    }

    /// True for the operators whose result is only meaningful as a float.
    pub fn is_transcendental(&self) -> bool {
        !matches!(
            self,
            UnaryOp::Neg | UnaryOp::Abs | UnaryOp::Sign | UnaryOp::Even
        )
    }

    /// Element type of `op(input)`.
    ///
    /// `sign` and `even` are always `I32`. Transcendental operators lift
    /// integer inputs to `F64` and keep float inputs as they are.
    pub fn result_dtype(&self, input: DType) -> DType {
        match self {
            UnaryOp::Sign | UnaryOp::Even => DType::I32,
            UnaryOp::Neg | UnaryOp::Abs => input,
            _ if input.is_int() => DType::F64,
            _ => input,
        }
    }

    /// Evaluate on one value of element type `input`.
    pub fn apply(&self, x: f64, input: DType) -> f64 {
        match self {
            UnaryOp::Log => x.ln(),
            UnaryOp::Log2 => x.log2(),
            UnaryOp::Log10 => x.log10(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Asin => x.asin(),
            UnaryOp::Acos => x.acos(),
            UnaryOp::Atan => x.atan(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sign => {
                if x < 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
            // only integers can be even; a float input never is
            UnaryOp::Even => {
                if input.is_int() && (x as i64) % 2 == 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Reductions along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Mul,
    Min,
    Max,
}

impl ReduceOp {
    pub fn name(&self) -> &'static str {
        match self {
            ReduceOp::Sum => "reduce_sum",
            ReduceOp::Mul => "reduce_mul",
            ReduceOp::Min => "reduce_min",
            ReduceOp::Max => "reduce_max",
        }
    }
}

// Op — descriptor of a node-construction request
//
// The dispatcher tags every construction with an `Op` before it reaches the
// engine. The execution trigger policy reads it to decide whether operands
// must be materialized first; the logs print it.

/// Every kind of node the dispatcher can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Store,
    Constant,
    Random,
    Arange,
    Identity,
    Binary(BinaryOp),
    Unary(UnaryOp),
    Convert,
    Reduce(ReduceOp),
    Matmul,
    Reshape,
    Slice,
    Extend,
    Concat,
    Expand,
    Repeat,
    Transpose,
    Convolve,
    Slide,
    Index,
    IndexSet,
    SlidingWindow,
    Permute,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Store => "store",
            Op::Constant => "constant",
            Op::Random => "random",
            Op::Arange => "arange",
            Op::Identity => "identity",
            Op::Binary(op) => op.name(),
            Op::Unary(op) => op.name(),
            Op::Convert => "convert",
            Op::Reduce(op) => op.name(),
            Op::Matmul => "matmul",
            Op::Reshape => "reshape",
            Op::Slice => "slice",
            Op::Extend => "extend",
            Op::Concat => "concat",
            Op::Expand => "expand",
            Op::Repeat => "repeat",
            Op::Transpose => "transpose",
            Op::Convolve => "convolve",
            Op::Slide => "slide",
            Op::Index => "index",
            Op::IndexSet => "index_set",
            Op::SlidingWindow => "sliding_window",
            Op::Permute => "permute",
        }
    }

    /// Leaf constructors take no graph operands.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Op::Store | Op::Constant | Op::Random | Op::Arange | Op::Identity
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use num_traits::{
    CheckedDiv, NumCast, PrimInt, ToPrimitive, WrappingAdd, WrappingMul, WrappingSub, Zero,
};

use crate::error::{Error, Result};
use crate::op::BinaryOp;

// DType — the closed set of element types
//
// Every graph node carries exactly one of these. The declaration order is the
// promotion rank: when two operands meet, the result takes the type that
// comes later in the list.
//
//   I32 < I64 < F32 < F64
//
// Anything outside this set (u8, f16, bool, ...) is rejected at the boundary
// with `UnsupportedOperandType`; once a value is a `DType`/`Scalar`, an
// invalid type is unrepresentable.

/// Enum of all supported element data types, ordered by promotion rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Every supported type, lowest rank first.
    pub const ALL: [DType; 4] = [DType::I32, DType::I64, DType::F32, DType::F64];

    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    /// Promotion rank: wider and floating types rank higher.
    pub fn rank(&self) -> u8 {
        match self {
            DType::I32 => 0,
            DType::I64 => 1,
            DType::F32 => 2,
            DType::F64 => 3,
        }
    }

    /// The higher-ranked of two types.
    pub fn promote(a: DType, b: DType) -> DType {
        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_int(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "i32" | "int32" => Ok(DType::I32),
            "i64" | "int64" => Ok(DType::I64),
            "f32" | "float32" => Ok(DType::F32),
            "f64" | "float64" => Ok(DType::F64),
            other => Err(Error::UnsupportedOperandType(format!(
                "unknown element type '{other}'"
            ))),
        }
    }
}

// Element — bridge between Rust primitives and DType

/// Trait implemented by the Rust types that can be stored in a graph node.
pub trait Element: Copy + Send + Sync + 'static + NumCast + PartialOrd + fmt::Debug {
    /// The corresponding DType variant.
    const DTYPE: DType;

    /// Wrap a single value.
    fn into_scalar(self) -> Scalar;

    /// Wrap a flat buffer.
    fn into_host(data: Vec<Self>) -> HostData;

    /// Convert to f64 (exact for every type except large i64 values).
    fn to_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }

    /// Convert from f64, truncating toward zero and saturating for integers.
    fn from_f64(v: f64) -> Self;
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;
    fn into_scalar(self) -> Scalar {
        Scalar::I32(self)
    }
    fn into_host(data: Vec<Self>) -> HostData {
        HostData::I32(data)
    }
    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;
    fn into_scalar(self) -> Scalar {
        Scalar::I64(self)
    }
    fn into_host(data: Vec<Self>) -> HostData {
        HostData::I64(data)
    }
    fn from_f64(v: f64) -> Self {
        v as i64
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    fn into_scalar(self) -> Scalar {
        Scalar::F32(self)
    }
    fn into_host(data: Vec<Self>) -> HostData {
        HostData::F32(data)
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
    fn into_scalar(self) -> Scalar {
        Scalar::F64(self)
    }
    fn into_host(data: Vec<Self>) -> HostData {
        HostData::F64(data)
    }
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
}

// Scalar — one value of a concrete element type

/// A single value tagged with its element type.
///
/// This is the payload of a light tensor and the constant operand of a
/// node-scalar operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::I32(_) => DType::I32,
            Scalar::I64(_) => DType::I64,
            Scalar::F32(_) => DType::F32,
            Scalar::F64(_) => DType::F64,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::I32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
        }
    }

    /// Read the value as `T`, going through `NumCast` and saturating when the
    /// value does not fit.
    pub fn get<T: Element>(&self) -> T {
        let direct: Option<T> = match *self {
            Scalar::I32(v) => num_traits::cast(v),
            Scalar::I64(v) => num_traits::cast(v),
            Scalar::F32(v) => num_traits::cast(v),
            Scalar::F64(v) => num_traits::cast(v),
        };
        direct.unwrap_or_else(|| T::from_f64(self.to_f64()))
    }

    /// Convert to another element type.
    pub fn cast(&self, dtype: DType) -> Scalar {
        match dtype {
            DType::I32 => Scalar::I32(self.get()),
            DType::I64 => Scalar::I64(self.get()),
            DType::F32 => Scalar::F32(self.get()),
            DType::F64 => Scalar::F64(self.get()),
        }
    }

    /// Convert a dynamically typed value.
    ///
    /// Only `i32`, `i64`, `f32` and `f64` are accepted; every other type is
    /// an `UnsupportedOperandType` error.
    pub fn from_any(value: &dyn Any) -> Result<Scalar> {
        if let Some(v) = value.downcast_ref::<i32>() {
            Ok(Scalar::I32(*v))
        } else if let Some(v) = value.downcast_ref::<i64>() {
            Ok(Scalar::I64(*v))
        } else if let Some(v) = value.downcast_ref::<f32>() {
            Ok(Scalar::F32(*v))
        } else if let Some(v) = value.downcast_ref::<f64>() {
            Ok(Scalar::F64(*v))
        } else if let Some(v) = value.downcast_ref::<Scalar>() {
            Ok(*v)
        } else {
            Err(Error::UnsupportedOperandType(
                "value is not one of i32, i64, f32, f64".into(),
            ))
        }
    }

    /// Apply a binary operator in-process (light arithmetic).
    ///
    /// Both operands are first promoted to the higher-ranked type.
    /// Comparisons yield an `I32` 0/1.
    pub fn binary(self, op: BinaryOp, rhs: Scalar) -> Result<Scalar> {
        match DType::promote(self.dtype(), rhs.dtype()) {
            DType::I32 => int_binary(op, self.get::<i32>(), rhs.get::<i32>()),
            DType::I64 => int_binary(op, self.get::<i64>(), rhs.get::<i64>()),
            DType::F32 => Ok(float_binary(op, self.get::<f32>(), rhs.get::<f32>())),
            DType::F64 => Ok(float_binary(op, self.get::<f64>(), rhs.get::<f64>())),
        }
    }
}

fn truth(hit: bool) -> Scalar {
    Scalar::I32(hit as i32)
}

fn int_binary<T>(op: BinaryOp, x: T, y: T) -> Result<Scalar>
where
    T: Element + PrimInt + CheckedDiv + WrappingAdd + WrappingSub + WrappingMul,
{
    let v = match op {
        BinaryOp::Add => x.wrapping_add(&y),
        BinaryOp::Sub => x.wrapping_sub(&y),
        BinaryOp::Mul => x.wrapping_mul(&y),
        BinaryOp::Div if y.is_zero() => return Err(Error::DivisionByZero),
        // only MIN / -1 overflows, and it wraps back to MIN
        BinaryOp::Div => x.checked_div(&y).unwrap_or(x),
        BinaryOp::Pow => T::from_f64(Element::to_f64(x).powf(Element::to_f64(y))),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
        BinaryOp::Equal => return Ok(truth(x == y)),
        BinaryOp::Greater => return Ok(truth(x > y)),
        BinaryOp::Less => return Ok(truth(x < y)),
    };
    Ok(v.into_scalar())
}

fn float_binary<T>(op: BinaryOp, x: T, y: T) -> Scalar
where
    T: Element + num_traits::Float,
{
    let v = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Pow => x.powf(y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
        BinaryOp::Equal => return truth(x == y),
        BinaryOp::Greater => return truth(x > y),
        BinaryOp::Less => return truth(x < y),
    };
    v.into_scalar()
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::I32(v) => write!(f, "{v}i32"),
            Scalar::I64(v) => write!(f, "{v}i64"),
            Scalar::F32(v) => write!(f, "{v}f32"),
            Scalar::F64(v) => write!(f, "{v}f64"),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

// HostData — a typed flat buffer living in process memory

/// Flat row-major data of one element type, used to feed store nodes and to
/// read materialized results back.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl HostData {
    pub fn dtype(&self) -> DType {
        match self {
            HostData::I32(_) => DType::I32,
            HostData::I64(_) => DType::I64,
            HostData::F32(_) => DType::F32,
            HostData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostData::I32(v) => v.len(),
            HostData::I64(v) => v.len(),
            HostData::F32(v) => v.len(),
            HostData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a buffer of `dtype` from f64 values (truncating for integers).
    pub fn from_f64_slice(dtype: DType, data: &[f64]) -> Self {
        match dtype {
            DType::I32 => HostData::I32(data.iter().map(|&v| i32::from_f64(v)).collect()),
            DType::I64 => HostData::I64(data.iter().map(|&v| i64::from_f64(v)).collect()),
            DType::F32 => HostData::F32(data.iter().map(|&v| f32::from_f64(v)).collect()),
            DType::F64 => HostData::F64(data.to_vec()),
        }
    }

    /// A buffer of `len` copies of `value`.
    pub fn filled(value: Scalar, len: usize) -> Self {
        match value {
            Scalar::I32(v) => HostData::I32(vec![v; len]),
            Scalar::I64(v) => HostData::I64(vec![v; len]),
            Scalar::F32(v) => HostData::F32(vec![v; len]),
            Scalar::F64(v) => HostData::F64(vec![v; len]),
        }
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            HostData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            HostData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            HostData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            HostData::F64(v) => v.clone(),
        }
    }

    /// Element `i` as a scalar.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        match self {
            HostData::I32(v) => v.get(i).map(|&x| Scalar::I32(x)),
            HostData::I64(v) => v.get(i).map(|&x| Scalar::I64(x)),
            HostData::F32(v) => v.get(i).map(|&x| Scalar::F32(x)),
            HostData::F64(v) => v.get(i).map(|&x| Scalar::F64(x)),
        }
    }

    /// Copy out as `T`, converting element by element.
    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        (0..self.len())
            .filter_map(|i| self.get(i))
            .map(|s| s.get::<T>())
            .collect()
    }
}

impl<T: Element> From<Vec<T>> for HostData {
    fn from(v: Vec<T>) -> Self {
        T::into_host(v)
    }
}

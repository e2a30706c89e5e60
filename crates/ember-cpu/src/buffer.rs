use std::borrow::Cow;

use ember_core::{DType, HostData, Scalar};

// Buffer — the resident data of one node
//
// Integer nodes (I32, I64) hold their elements as i64 and float nodes
// (F32, F64) as f64, so every I64 value survives storage and arithmetic
// bit for bit. An I32 buffer only ever holds values in i32 range and an
// F32 buffer only values an f32 can represent; `fit` restores that after
// every kernel by wrapping (I32) or rounding (F32).

/// Flat row-major node data.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

/// Apply the same element-generic kernel to either variant.
macro_rules! map_buffer {
    ($buf:expr, $data:ident => $body:expr) => {
        match $buf {
            $crate::buffer::Buffer::Int($data) => $crate::buffer::Buffer::Int($body),
            $crate::buffer::Buffer::Float($data) => $crate::buffer::Buffer::Float($body),
        }
    };
}
pub(crate) use map_buffer;

impl Buffer {
    pub fn from_host(data: HostData) -> Self {
        match data {
            HostData::I32(v) => Buffer::Int(v.into_iter().map(i64::from).collect()),
            HostData::I64(v) => Buffer::Int(v),
            HostData::F32(v) => Buffer::Float(v.into_iter().map(f64::from).collect()),
            HostData::F64(v) => Buffer::Float(v),
        }
    }

    pub fn filled(value: Scalar, len: usize) -> Self {
        match value {
            Scalar::I32(v) => Buffer::Int(vec![i64::from(v); len]),
            Scalar::I64(v) => Buffer::Int(vec![v; len]),
            Scalar::F32(v) => Buffer::Float(vec![f64::from(v); len]),
            Scalar::F64(v) => Buffer::Float(vec![v; len]),
        }
    }

    /// The elements as i64; floats truncate toward zero and saturate.
    pub fn ints(&self) -> Cow<'_, [i64]> {
        match self {
            Buffer::Int(v) => Cow::Borrowed(v),
            Buffer::Float(v) => Cow::Owned(v.iter().map(|&x| x as i64).collect()),
        }
    }

    pub fn floats(&self) -> Cow<'_, [f64]> {
        match self {
            Buffer::Int(v) => Cow::Owned(v.iter().map(|&x| x as f64).collect()),
            Buffer::Float(v) => Cow::Borrowed(v),
        }
    }

    /// Bring a kernel result back into the range of `dtype`: I32 wraps,
    /// F32 rounds to nearest.
    pub fn fit(self, dtype: DType) -> Self {
        match (self, dtype) {
            (Buffer::Int(v), DType::I32) => {
                Buffer::Int(v.into_iter().map(|x| x as i32 as i64).collect())
            }
            (Buffer::Float(v), DType::F32) => {
                Buffer::Float(v.into_iter().map(|x| x as f32 as f64).collect())
            }
            (buf @ Buffer::Int(_), DType::I64) | (buf @ Buffer::Float(_), DType::F64) => buf,
            (buf, dtype) => buf.convert(dtype),
        }
    }

    /// Element type conversion. Integers narrowing to I32 saturate, floats
    /// converting to an integer type truncate toward zero and saturate.
    pub fn convert(&self, dtype: DType) -> Self {
        match (self, dtype) {
            (Buffer::Int(v), DType::I32) => Buffer::Int(
                v.iter()
                    .map(|&x| x.clamp(i64::from(i32::MIN), i64::from(i32::MAX)))
                    .collect(),
            ),
            (Buffer::Float(v), DType::I32) => {
                Buffer::Int(v.iter().map(|&x| x as i32 as i64).collect())
            }
            (_, DType::I64) => Buffer::Int(self.ints().into_owned()),
            (_, DType::F32) => Buffer::Float(self.floats().iter().map(|&x| x as f32 as f64).collect()),
            (_, DType::F64) => Buffer::Float(self.floats().into_owned()),
        }
    }

    pub fn to_host(&self, dtype: DType) -> HostData {
        match dtype {
            DType::I32 => HostData::I32(self.ints().iter().map(|&x| x as i32).collect()),
            DType::I64 => HostData::I64(self.ints().into_owned()),
            DType::F32 => HostData::F32(self.floats().iter().map(|&x| x as f32).collect()),
            DType::F64 => HostData::F64(self.floats().into_owned()),
        }
    }
}

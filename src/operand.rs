//! The values validated by a chain.
//!
//! Checks only see operands through this module: a scalar or a dense tensor
//! with a dtype label, a shape, and row-major `f64` storage shared by `Arc`.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperandError {
    #[error("shape {shape:?} holds {expected} elements, got {found}")]
    ShapeMismatch { shape: Vec<usize>, expected: usize, found: usize },
    #[error("cannot unstack a rank-0 tensor")]
    RankZero,
    #[error("unknown dtype '{0}'")]
    UnknownDType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    pub fn is_floating(&self) -> bool { matches!(self, DType::F32 | DType::F64) }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

impl std::str::FromStr for DType {
    type Err = OperandError;

    /// Accepts the short names and the numpy-style long ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(DType::Bool),
            "i32" | "int32" => Ok(DType::I32),
            "i64" | "int64" => Ok(DType::I64),
            "f32" | "float32" => Ok(DType::F32),
            "f64" | "float64" => Ok(DType::F64),
            other => Err(OperandError::UnknownDType(other.to_string())),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

pub type Shape = SmallVec<[usize; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    data: Arc<[f64]>,
}

impl Tensor {
    pub fn new(dtype: DType, shape: &[usize], data: Vec<f64>) -> Result<Self, OperandError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(OperandError::ShapeMismatch { shape: shape.to_vec(), expected, found: data.len() });
        }
        Ok(Self { dtype, shape: SmallVec::from_slice(shape), data: data.into() })
    }

    /// A rank-1 `f64` tensor.
    pub fn vector(data: Vec<f64>) -> Self {
        Self { dtype: DType::F64, shape: SmallVec::from_slice(&[data.len()]), data: data.into() }
    }

    pub fn dtype(&self) -> DType { self.dtype }
    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn rank(&self) -> usize { self.shape.len() }
    pub fn data(&self) -> &[f64] { &self.data }

    /// Size of the leading dimension.
    pub fn batch_size(&self) -> Option<usize> { self.shape.first().copied() }

    /// Splits along the leading dimension.
    pub fn unstack(&self) -> Result<Vec<Tensor>, OperandError> {
        let (&rows, rest) = self.shape.split_first().ok_or(OperandError::RankZero)?;
        let stride: usize = rest.iter().product();
        Ok((0..rows)
            .map(|r| Tensor {
                dtype: self.dtype,
                shape: SmallVec::from_slice(rest),
                data: self.data[r * stride..(r + 1) * stride].into(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Tensor(Tensor),
}

impl Operand {
    pub fn values(&self) -> &[f64] {
        match self {
            Operand::Scalar(x) => std::slice::from_ref(x),
            Operand::Tensor(t) => t.data(),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Operand::Scalar(_) => DType::F64,
            Operand::Tensor(t) => t.dtype(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Operand::Scalar(_) => &[],
            Operand::Tensor(t) => t.shape(),
        }
    }

    pub fn rank(&self) -> usize { self.shape().len() }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self { Operand::Scalar(x) }
}

impl From<Tensor> for Operand {
    fn from(t: Tensor) -> Self { Operand::Tensor(t) }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Scalar(x) => write!(f, "{}", x),
            Operand::Tensor(t) => write!(f, "tensor<{}>{:?}", t.dtype, t.shape.as_slice()),
        }
    }
}

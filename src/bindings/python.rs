use crate::chain::{Chain, ChainError, Check, ConstructionError, Context, Value};
use crate::compute::{Batch, BatchOutcome, Compiled, Eager};
use crate::operand::{DType, Operand, OperandError, Tensor};
use crate::store::Interner;
use crate::validation::presets;
use crate::validation::rules::{
    Annotate, BatchShape, DtypeIs, Finite, Floating, InRange, Log, NonNegative, Passthrough, Probability, RankIs,
    Raise, Suppress, SuppressWhenFlagged,
};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyList};
use std::sync::OnceLock;

static COMPILED: OnceLock<Compiled> = OnceLock::new();

fn construction_err(err: ConstructionError) -> PyErr { PyValueError::new_err(err.to_string()) }

fn operand_err(err: OperandError) -> PyErr { PyValueError::new_err(err.to_string()) }

fn chain_err(err: ChainError) -> PyErr {
    match err {
        ChainError::Raised { failure, .. } => PyValueError::new_err(failure.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn to_value(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::None);
    }
    // bool before int: Python bools are ints.
    if obj.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(obj.extract::<bool>()?));
    }
    if let Ok(i) = obj.extract::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = obj.extract::<f64>() {
        return Ok(Value::Float(f));
    }
    if let Ok(s) = obj.extract::<String>() {
        return Ok(Value::Str(s));
    }
    if obj.is_instance_of::<PyList>() {
        let mut items = Vec::new();
        for item in obj.try_iter()? {
            items.push(to_value(&item?)?);
        }
        return Ok(Value::List(items));
    }
    Err(PyTypeError::new_err(format!("unsupported context value of type {}", obj.get_type().name()?)))
}

fn to_context(dict: Option<&Bound<'_, PyDict>>) -> PyResult<Context> {
    let mut ctx = Context::new();
    if let Some(dict) = dict {
        for (key, value) in dict.iter() {
            let key: String = key.extract()?;
            ctx.insert(key, to_value(&value)?);
        }
    }
    Ok(ctx)
}

fn to_operand(values: Vec<f64>, shape: Option<Vec<usize>>, dtype: &str) -> PyResult<Operand> {
    let dtype: DType = dtype.parse().map_err(operand_err)?;
    let shape = shape.unwrap_or_else(|| vec![values.len()]);
    let tensor = Tensor::new(dtype, &shape, values).map_err(operand_err)?;
    Ok(Operand::from(tensor))
}

/// An immutable, interned chain of built-in checks.
#[pyclass(name = "_Chain", frozen)]
pub struct PyChain {
    inner: Chain,
}

impl PyChain {
    fn of<C: Check>(check: C) -> PyResult<Self> {
        Interner::global().node(check).map(|inner| Self { inner }).map_err(construction_err)
    }
}

#[pymethods]
impl PyChain {
    #[staticmethod]
    pub fn probability() -> PyResult<Self> { Self::of(Probability) }

    #[staticmethod]
    pub fn non_negative() -> PyResult<Self> { Self::of(NonNegative) }

    #[staticmethod]
    pub fn finite() -> PyResult<Self> { Self::of(Finite) }

    #[staticmethod]
    pub fn in_range(low: f64, high: f64) -> PyResult<Self> { Self::of(InRange::new(low, high)) }

    #[staticmethod]
    pub fn floating() -> PyResult<Self> { Self::of(Floating) }

    #[staticmethod]
    pub fn dtype(name: String) -> PyResult<Self> {
        Self::of(DtypeIs(name.parse().map_err(operand_err)?))
    }

    #[staticmethod]
    pub fn rank(rank: usize) -> PyResult<Self> { Self::of(RankIs(rank)) }

    #[staticmethod]
    pub fn batch_shape() -> PyResult<Self> { Self::of(BatchShape) }

    #[staticmethod]
    pub fn passthrough() -> PyResult<Self> { Self::of(Passthrough) }

    #[staticmethod]
    pub fn suppress_when_flagged(default: bool) -> PyResult<Self> { Self::of(SuppressWhenFlagged::new(default)) }

    #[staticmethod]
    pub fn suppress() -> PyResult<Self> { Self::of(Suppress) }

    #[staticmethod]
    pub fn raise_errors() -> PyResult<Self> { Self::of(Raise) }

    #[staticmethod]
    pub fn log(label: String) -> PyResult<Self> { Self::of(Log::new(label)) }

    #[staticmethod]
    pub fn annotate(note: String) -> PyResult<Self> { Self::of(Annotate::new(note)) }

    /// `chain` with the logging, raising terminal in front.
    #[staticmethod]
    #[pyo3(signature = (chain, suppress_errors=false))]
    pub fn capped(chain: PyRef<'_, PyChain>, suppress_errors: bool) -> PyResult<Self> {
        presets::capped(&Interner::global(), &chain.inner, suppress_errors)
            .map(|inner| Self { inner })
            .map_err(construction_err)
    }

    pub fn __and__(&self, other: PyRef<'_, PyChain>) -> Self { Self { inner: self.inner.append(&other.inner) } }

    pub fn __len__(&self) -> usize { self.inner.len() }

    pub fn __eq__(&self, other: PyRef<'_, PyChain>) -> bool { Chain::ptr_eq(&self.inner, &other.inner) }

    pub fn __hash__(&self) -> isize { self.inner.id().index() as isize }

    pub fn __repr__(&self) -> String { format!("_Chain({})", self.inner) }

    pub fn kinds(&self) -> Vec<String> {
        self.inner.kinds().into_iter().map(|k| k.short_name().to_string()).collect()
    }

    pub fn insert(&self, index: usize, other: PyRef<'_, PyChain>) -> Self {
        Self { inner: self.inner.insert(index, &other.inner) }
    }

    /// Runs the eager backend. Returns whether the operand is valid; raised
    /// failures become `ValueError`.
    #[pyo3(signature = (values, shape=None, dtype="f64".to_string(), context=None))]
    pub fn validate(
        &self,
        values: Vec<f64>,
        shape: Option<Vec<usize>>,
        dtype: String,
        context: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<bool> {
        let operand = to_operand(values, shape, &dtype)?;
        let ctx = to_context(context)?;
        Eager::new().run(&self.inner, &operand, &ctx).map(|v| v.is_valid()).map_err(chain_err)
    }

    /// Runs the compiled backend with one lane per row.
    #[pyo3(signature = (rows, dtype="f64".to_string(), context=None))]
    pub fn validate_batch(
        &self,
        rows: Vec<Vec<f64>>,
        dtype: String,
        context: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Vec<bool>> {
        let lanes = rows
            .into_iter()
            .map(|row| to_operand(row, None, &dtype))
            .collect::<PyResult<Vec<_>>>()?;
        let ctx = to_context(context)?;
        let report = COMPILED.get_or_init(Compiled::new).run_batch(&self.inner, &Batch::new(lanes), &ctx);
        match report.outcome {
            BatchOutcome::Settled(verdicts) => Ok(verdicts.iter().map(|v| v.is_valid()).collect()),
            BatchOutcome::Aborted => Err(PyRuntimeError::new_err("batch aborted; see the exception sink")),
        }
    }
}

/// A simple function to confirm the Rust core is callable from Python.
#[pyfunction]
pub fn rust_core_version() -> &'static str { env!("CARGO_PKG_VERSION") }

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<PyChain>()?;
    Ok(())
}

// Composable validation chains.
//
// Checks are interned into immutable, structurally shared chains and run by
// one of two backends. With the `python` feature this crate also builds the
// `_core` extension module.

pub mod analysis;
#[cfg(feature = "python")]
pub mod bindings;
pub mod chain;
pub mod compute;
pub mod display;
pub mod operand;
pub mod state;
pub mod store;
pub mod validation;

#[cfg(test)]
mod testing;

pub use chain::{Chain, ChainError, Check, ConstructionError, Context, Disposition, NodeError, Truth, ValidationFailure};
pub use compute::{BatchReport, Compiled, Eager, ExecutionEngine, Verdict};
pub use operand::{DType, Operand, Tensor};
pub use state::{with_exception_sink, with_success_sink, Incident, SinkRegistry};
pub use store::{Args, Interner};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}

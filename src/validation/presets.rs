//! Common chains.
//!
//! Every preset is capped with [`terminal`]: failures are logged, then raised,
//! unless `suppress_errors` stops the chain before any check runs.

use crate::chain::{Chain, ConstructionError};
use crate::operand::DType;
use crate::store::Interner;
use crate::validation::rules::{BatchShape, DtypeIs, Floating, Log, NonNegative, Probability, Raise, SuppressWhenFlagged};

/// `SuppressWhenFlagged & Raise & Log`.
pub fn terminal(interner: &Interner, suppress: bool) -> Result<Chain, ConstructionError> {
    let chain = interner.node(SuppressWhenFlagged::new(suppress))?
        & interner.node(Raise)?
        & interner.node(Log::new("terminal"))?;
    Ok(chain)
}

/// Puts the terminal in front of `chain`.
pub fn capped(interner: &Interner, chain: &Chain, suppress: bool) -> Result<Chain, ConstructionError> {
    Ok(terminal(interner, suppress)?.append_in(interner, chain))
}

/// Floating point values in `[0, 1]` with a leading `batch_size` dimension.
pub fn probability(interner: &Interner, suppress: bool) -> Result<Chain, ConstructionError> {
    let chain = interner.node(Floating)? & interner.node(BatchShape)? & interner.node(Probability)?;
    capped(interner, &chain, suppress)
}

/// Non-negative `i32` counts.
pub fn counter(interner: &Interner, suppress: bool) -> Result<Chain, ConstructionError> {
    let chain = interner.node(DtypeIs(DType::I32))? & interner.node(NonNegative)?;
    capped(interner, &chain, suppress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainError, Context};
    use crate::compute::{Eager, Verdict};
    use crate::operand::{Operand, Tensor};
    use crate::state::SinkRegistry;
    use crate::store::TypeTag;

    fn eager() -> Eager { Eager::with_sinks(SinkRegistry::new()) }

    fn matrix(dtype: DType, rows: usize, data: Vec<f64>) -> Operand {
        let cols = data.len() / rows;
        Operand::from(Tensor::new(dtype, &[rows, cols], data).unwrap())
    }

    #[test]
    fn test_presets_share_the_terminal() {
        let interner = Interner::new();
        let p = probability(&interner, false).unwrap();
        let c = counter(&interner, false).unwrap();

        assert_eq!(p.len(), 6);
        assert_eq!(c.len(), 5);
        assert_eq!(p.kinds()[..3], c.kinds()[..3]);
        assert_eq!(p.kinds()[..3], terminal(&interner, false).unwrap().kinds()[..]);
        assert_eq!(p.tail().tag(), TypeTag::of::<Probability>());
        assert_eq!(probability(&interner, false).unwrap(), p);
    }

    #[test]
    fn test_probability_preset() {
        let interner = Interner::new();
        let chain = probability(&interner, false).unwrap();
        let ctx = Context::new().with("batch_size", 2usize);

        let good = matrix(DType::F32, 2, vec![0.3, 0.6, 0.8, 0.2, 0.4, 1.0]);
        assert_eq!(eager().run(&chain, &good, &ctx).unwrap(), Verdict::Passed);

        let bad = matrix(DType::F32, 2, vec![0.3, 0.6, 1.2, 0.2, 0.4, 1.0]);
        match eager().run(&chain, &bad, &ctx).unwrap_err() {
            ChainError::Raised { kind, failure } => {
                assert_eq!(kind, TypeTag::of::<Raise>());
                assert_eq!(failure.origin, Some(TypeTag::of::<Probability>()));
                assert_eq!(failure.message, "probability exceeds 1 on some elements");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_counter_preset_rejects_floats() {
        let interner = Interner::new();
        let chain = counter(&interner, false).unwrap();
        let bad = matrix(DType::F32, 1, vec![-2.0, 3.4]);
        let err = eager().run(&chain, &bad, &Context::new()).unwrap_err();
        assert!(matches!(err, ChainError::Raised { ref failure, .. } if failure.message == "expected dtype i32, got f32"));

        let good = matrix(DType::I32, 1, vec![0.0, 2.0, 4.0]);
        assert_eq!(eager().run(&chain, &good, &Context::new()).unwrap(), Verdict::Passed);
    }

    #[test]
    fn test_suppressed_preset_checks_nothing() {
        let interner = Interner::new();
        let chain = counter(&interner, true).unwrap();
        let bad = matrix(DType::F32, 1, vec![-2.0, 3.4]);
        assert_eq!(eager().run(&chain, &bad, &Context::new()).unwrap(), Verdict::Passed);

        let ctx = Context::new().with("suppress_errors", false);
        assert!(eager().run(&chain, &bad, &ctx).is_err());
    }
}

use crate::chain::{Check, Context, NodeError, Truth, ValidationFailure};
use crate::operand::{DType, Operand};
use crate::store::Args;

/// The operand has a floating point dtype.
#[derive(Debug, Clone, Copy, Default)]
pub struct Floating;

impl Check for Floating {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(operand.dtype().is_floating().into())
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::type_error(format!("tensor is not floating point (dtype {})", operand.dtype())))
    }
}

/// The operand has exactly this dtype.
#[derive(Debug, Clone, Copy)]
pub struct DtypeIs(pub DType);

impl Check for DtypeIs {
    fn args(&self) -> Args { Args::new().with(self.0.name()) }

    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok((operand.dtype() == self.0).into())
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::type_error(format!("expected dtype {}, got {}", self.0, operand.dtype())))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RankIs(pub usize);

impl Check for RankIs {
    fn args(&self) -> Args { Args::new().with(self.0) }

    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok((operand.rank() == self.0).into())
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::shape(format!("expected rank {}, got {}", self.0, operand.rank())))
    }
}

/// The leading dimension equals the `batch_size` context value.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchShape;

impl BatchShape {
    pub const KEY: &'static str = "batch_size";
}

impl Check for BatchShape {
    fn test(&self, operand: &Operand, ctx: &Context) -> Result<Truth, NodeError> {
        let expected: usize = ctx.require(Self::KEY)?;
        Ok((operand.shape().first() == Some(&expected)).into())
    }

    fn make_failure(&self, operand: &Operand, ctx: &Context) -> Result<ValidationFailure, NodeError> {
        let expected: usize = ctx.require(Self::KEY)?;
        let found = match operand.shape().first() {
            Some(n) => n.to_string(),
            None => "a scalar".to_string(),
        };
        Ok(ValidationFailure::shape(format!("expected batch of size {}, got {}", expected, found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use crate::compute::{Eager, Verdict};
    use crate::operand::Tensor;
    use crate::state::SinkRegistry;
    use crate::store::{Interner, TypeTag};
    use rstest::rstest;

    fn tensor(dtype: DType, shape: &[usize]) -> Operand {
        let n = shape.iter().product();
        Operand::from(Tensor::new(dtype, shape, vec![0.0; n]).unwrap())
    }

    #[rstest]
    #[case(DType::F32, true)]
    #[case(DType::F64, true)]
    #[case(DType::I32, false)]
    #[case(DType::Bool, false)]
    fn test_floating(#[case] dtype: DType, #[case] expected: bool) {
        let truth = Floating.test(&tensor(dtype, &[2]), &Context::new()).unwrap();
        assert_eq!(truth, Truth::Bool(expected));
    }

    #[test]
    fn test_dtype_message() {
        let failure = DtypeIs(DType::I32).make_failure(&tensor(DType::F32, &[1]), &Context::new()).unwrap();
        assert_eq!(failure.message, "expected dtype i32, got f32");
    }

    #[test]
    fn test_batch_shape_reads_context() {
        let interner = Interner::new();
        let eager = Eager::with_sinks(SinkRegistry::new());
        let chain = interner.node(BatchShape).unwrap();
        let x = tensor(DType::F32, &[2, 3]);

        let ok = eager.run(&chain, &x, &Context::new().with("batch_size", 2usize)).unwrap();
        assert_eq!(ok, Verdict::Passed);

        let bad = eager.run(&chain, &x, &Context::new().with("batch_size", 4usize)).unwrap();
        assert_eq!(bad.failure().unwrap().message, "expected batch of size 4, got 2");
    }

    #[test]
    fn test_batch_shape_without_key() {
        let interner = Interner::new();
        let chain = interner.node(BatchShape).unwrap();
        let err = Eager::with_sinks(SinkRegistry::new())
            .run(&chain, &tensor(DType::F32, &[2]), &Context::new())
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::MissingContextKey { kind: TypeTag::of::<BatchShape>(), key: "batch_size".into() }
        );
    }
}

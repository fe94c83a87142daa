//! Range checks over operand values.
//!
//! The scans run four lanes at a time with `wide`; the tail is checked
//! scalarly. NaN compares false against both bounds, so it never passes.

use crate::chain::{Check, Context, NodeError, Truth, ValidationFailure};
use crate::compute::{Batch, Mask};
use crate::operand::Operand;
use crate::store::Args;
use wide::*;

/// True when every value lies in `[low, high]`.
pub fn all_within(values: &[f64], low: f64, high: f64) -> bool {
    let lo = f64x4::splat(low);
    let hi = f64x4::splat(high);

    let mut chunks = values.chunks_exact(4);
    for chunk in &mut chunks {
        let v = f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let inside = v.cmp_ge(lo) & v.cmp_le(hi);
        if inside.move_mask() != 0b1111 {
            return false;
        }
    }
    chunks.remainder().iter().all(|x| *x >= low && *x <= high)
}

fn lanes_within(batch: &Batch, low: f64, high: f64) -> Truth {
    batch.iter().map(|op| all_within(op.values(), low, high)).collect::<Mask>().into()
}

fn count_below(values: &[f64], bound: f64) -> usize { values.iter().filter(|x| **x < bound).count() }
fn count_above(values: &[f64], bound: f64) -> usize { values.iter().filter(|x| **x > bound).count() }

/// Every value in `[low, high]`.
#[derive(Debug, Clone, Copy)]
pub struct InRange {
    pub low: f64,
    pub high: f64,
}

impl InRange {
    pub fn new(low: f64, high: f64) -> Self { Self { low, high } }
}

impl Check for InRange {
    fn args(&self) -> Args { Args::new().named("low", self.low).named("high", self.high) }

    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(all_within(operand.values(), self.low, self.high).into())
    }

    fn test_batch(&self, batch: &Batch, _: &Context) -> Option<Result<Truth, NodeError>> {
        Some(Ok(lanes_within(batch, self.low, self.high)))
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        let values = operand.values();
        let outside = values.len() - values.iter().filter(|x| **x >= self.low && **x <= self.high).count();
        Ok(ValidationFailure::value(format!(
            "{} of {} values outside [{}, {}]",
            outside,
            values.len(),
            self.low,
            self.high
        )))
    }
}

/// Every value in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Probability;

impl Check for Probability {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(all_within(operand.values(), 0.0, 1.0).into())
    }

    fn test_batch(&self, batch: &Batch, _: &Context) -> Option<Result<Truth, NodeError>> {
        Some(Ok(lanes_within(batch, 0.0, 1.0)))
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        let values = operand.values();
        let message = if count_above(values, 1.0) > 0 {
            "probability exceeds 1 on some elements"
        } else if count_below(values, 0.0) > 0 {
            "probability is less than 0 on some elements"
        } else {
            "probability is not a number on some elements"
        };
        Ok(ValidationFailure::value(message))
    }
}

/// Every value `>= 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNegative;

impl Check for NonNegative {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(all_within(operand.values(), 0.0, f64::INFINITY).into())
    }

    fn test_batch(&self, batch: &Batch, _: &Context) -> Option<Result<Truth, NodeError>> {
        Some(Ok(lanes_within(batch, 0.0, f64::INFINITY)))
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        let n = count_below(operand.values(), 0.0);
        Ok(ValidationFailure::value(format!("{} values less than zero", n)))
    }
}

/// No NaN or infinite values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finite;

impl Check for Finite {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(all_within(operand.values(), f64::MIN, f64::MAX).into())
    }

    fn test_batch(&self, batch: &Batch, _: &Context) -> Option<Result<Truth, NodeError>> {
        Some(Ok(lanes_within(batch, f64::MIN, f64::MAX)))
    }

    fn make_failure(&self, operand: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        let n = operand.values().iter().filter(|x| !x.is_finite()).count();
        Ok(ValidationFailure::value(format!("{} non-finite values", n)))
    }
}

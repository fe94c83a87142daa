use crate::operand::{Operand, OperandError, Tensor};
use serde::Serialize;
use std::ops::{BitAnd, Index};

/// One boolean per batch lane.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    bits: Vec<bool>,
}

impl Mask {
    pub fn splat(value: bool, lanes: usize) -> Self { Self { bits: vec![value; lanes] } }

    pub fn len(&self) -> usize { self.bits.len() }
    pub fn is_empty(&self) -> bool { self.bits.is_empty() }

    #[inline(always)]
    pub fn get(&self, lane: usize) -> bool { self.bits.get(lane).copied().unwrap_or(false) }

    pub fn all(&self) -> bool { self.bits.iter().all(|b| *b) }
    pub fn count(&self) -> usize { self.bits.iter().filter(|b| **b).count() }
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ { self.bits.iter().copied() }
}

impl From<Vec<bool>> for Mask {
    fn from(bits: Vec<bool>) -> Self { Self { bits } }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self { Self { bits: iter.into_iter().collect() } }
}

impl BitAnd for &Mask {
    type Output = Mask;
    fn bitand(self, rhs: &Mask) -> Mask {
        self.bits.iter().zip(&rhs.bits).map(|(a, b)| *a && *b).collect()
    }
}

/// Operands validated together by the compiled backend, one per lane.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    lanes: Vec<Operand>,
}

impl Batch {
    pub fn new(lanes: Vec<Operand>) -> Self { Self { lanes } }

    /// One lane per slice along the tensor's leading dimension.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self, OperandError> {
        Ok(Self { lanes: tensor.unstack()?.into_iter().map(Operand::Tensor).collect() })
    }

    pub fn len(&self) -> usize { self.lanes.len() }
    pub fn is_empty(&self) -> bool { self.lanes.is_empty() }
    pub fn lane(&self, index: usize) -> Option<&Operand> { self.lanes.get(index) }
    pub fn iter(&self) -> std::slice::Iter<'_, Operand> { self.lanes.iter() }

    /// The sub-batch of the given lane indices, in order.
    pub fn select(&self, indices: &[usize]) -> Batch {
        Batch { lanes: indices.iter().filter_map(|&i| self.lanes.get(i).cloned()).collect() }
    }
}

impl Index<usize> for Batch {
    type Output = Operand;
    fn index(&self, lane: usize) -> &Operand { &self.lanes[lane] }
}

impl From<Vec<Operand>> for Batch {
    fn from(lanes: Vec<Operand>) -> Self { Self::new(lanes) }
}

/// Counters collected while tracing a batch through a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KernelStats {
    pub steps_executed: usize,
    pub lanes_tested: usize,
    /// Lane counts per branch: failed, stop, continue.
    pub cases: [usize; 3],
}

impl KernelStats {
    pub fn merge(&mut self, other: &KernelStats) {
        self.steps_executed += other.steps_executed;
        self.lanes_tested += other.lanes_tested;
        for (a, b) in self.cases.iter_mut().zip(other.cases) {
            *a += b;
        }
    }
}

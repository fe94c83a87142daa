//! The traced phase of the compiled backend.
//!
//! Runs only tests and continuation predicates. Each lane's outcome at a step
//! is classified into a [`Case`] and dispatched through [`BRANCHES`]; anything
//! with a host-visible side effect is queued as an [`Effect`] instead.

use crate::chain::{ChainError, Context};
use crate::compute::bytecode::Program;
use crate::compute::effects::{Effect, EffectQueue};
use crate::compute::ledger::{Batch, KernelStats, Mask};
use crate::compute::machine::{self, Case};

pub(crate) type Branch = fn(usize, usize, &mut EffectQueue, &mut Vec<usize>);

/// Indexed by `Case as usize`.
pub(crate) static BRANCHES: [Branch; 3] = [on_failed, on_stop, on_continue];

fn on_failed(lane: usize, depth: usize, effects: &mut EffectQueue, _: &mut Vec<usize>) {
    effects.push(Effect::Unwind { lane, depth });
}

fn on_stop(lane: usize, _: usize, effects: &mut EffectQueue, _: &mut Vec<usize>) {
    effects.push(Effect::Succeed { lane });
}

fn on_continue(lane: usize, _: usize, _: &mut EffectQueue, active: &mut Vec<usize>) {
    active.push(lane);
}

pub(crate) fn trace(
    program: &Program,
    batch: &Batch,
    ctx: &Context,
    stats: &mut KernelStats,
) -> Result<EffectQueue, ChainError> {
    let mut effects = EffectQueue::new();
    let mut active: Vec<usize> = (0..batch.len()).collect();

    for (depth, step) in program.steps.iter().enumerate() {
        if active.is_empty() {
            break;
        }

        // 1. Gather the lanes still walking.
        let lanes = batch.select(&active);
        stats.steps_executed += 1;
        stats.lanes_tested += lanes.len();

        // 2. Evaluate the step for the whole sub-batch.
        let passed = machine::test_lanes(step, &lanes, ctx)?;
        let proceed = if passed.count() > 0 {
            machine::proceed_lanes(step, ctx, lanes.len())?
        } else {
            Mask::splat(false, lanes.len())
        };

        // 3. Branch table dispatch.
        let mut still_active = Vec::with_capacity(active.len());
        for (slot, &lane) in active.iter().enumerate() {
            let case: Case = machine::classify(passed.get(slot), proceed.get(slot));
            stats.cases[case as usize] += 1;
            BRANCHES[case as usize](lane, depth, &mut effects, &mut still_active);
        }
        active = still_active;
    }

    Ok(effects)
}

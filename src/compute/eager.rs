//! Host evaluation: behaviors run as the walk reaches them, errors come back
//! to the caller.

use crate::chain::{Chain, ChainError, Context};
use crate::compute::machine::{self, at, Case, Observer, Terminal, Trace, Transition, Verdict};
use crate::compute::ExecutionEngine;
use crate::operand::Operand;
use crate::state::{Incident, SinkRegistry, Sinks};
use rayon::prelude::*;
use smallvec::SmallVec;

#[derive(Clone)]
pub struct Eager {
    sinks: SinkRegistry,
}

impl Eager {
    /// Reports to the process-wide sinks.
    pub fn new() -> Self { Self::with_sinks(SinkRegistry::global()) }

    pub fn with_sinks(sinks: SinkRegistry) -> Self { Self { sinks } }

    pub fn run(&self, chain: &Chain, operand: &Operand, ctx: &Context) -> Result<Verdict, ChainError> {
        walk(chain, operand, ctx, &self.sinks.snapshot(), &mut ())
    }

    /// Like [`Eager::run`], also returning every state transition taken.
    pub fn run_traced(&self, chain: &Chain, operand: &Operand, ctx: &Context) -> (Result<Verdict, ChainError>, Trace) {
        let mut trace = Trace::default();
        let result = walk(chain, operand, ctx, &self.sinks.snapshot(), &mut trace);
        (result, trace)
    }

    /// Runs `chain` over each operand in parallel. All runs share one sink
    /// snapshot; results keep the input order.
    pub fn run_many(&self, chain: &Chain, operands: &[Operand], ctx: &Context) -> Vec<Result<Verdict, ChainError>> {
        let sinks = self.sinks.snapshot();
        operands.par_iter().map(|operand| walk(chain, operand, ctx, &sinks, &mut ())).collect()
    }
}

impl Default for Eager {
    fn default() -> Self { Self::new() }
}

impl ExecutionEngine for Eager {
    type Output = Result<Verdict, ChainError>;

    fn execute(&self, chain: &Chain, operand: &Operand, ctx: &Context) -> Self::Output {
        self.run(chain, operand, ctx)
    }
}

fn walk<O: Observer + ?Sized>(
    chain: &Chain,
    operand: &Operand,
    ctx: &Context,
    sinks: &Sinks,
    observer: &mut O,
) -> Result<Verdict, ChainError> {
    observer.observe(Transition::Start);
    let result = traverse(chain, operand, ctx, sinks, observer);
    if let Err(err) = &result {
        observer.observe(Transition::Terminated(Terminal::of_error(err)));
    }
    result
}

/// Every `Ok` exit has already observed its terminal state.
fn traverse<O: Observer + ?Sized>(
    chain: &Chain,
    operand: &Operand,
    ctx: &Context,
    sinks: &Sinks,
    observer: &mut O,
) -> Result<Verdict, ChainError> {
    let mut path: SmallVec<[&Chain; 8]> = SmallVec::new();
    let mut cursor = Some(chain);

    while let Some(node) = cursor {
        path.push(node);
        observer.observe(at(node, Transition::Testing));

        let passed = machine::test(node, operand, ctx)?;
        if !passed {
            observer.observe(at(node, Transition::Failed));
            let failure = machine::make_failure(node, operand, ctx)?;
            let verdict = machine::unwind(path.as_slice(), failure, ctx, observer)?;
            if let Verdict::Failed(failure) = &verdict {
                tracing::debug!(head = %chain.tag(), %failure, "eager: chain failed");
                sinks.incident(&Incident::Failure(failure.clone()), ctx);
            }
            return Ok(verdict);
        }

        observer.observe(at(node, Transition::Passed));
        cursor = match machine::classify(passed, machine::proceed(node, ctx)?) {
            Case::Continue => node.next(),
            Case::Stop | Case::Failed => None,
        };
    }

    observer.observe(Transition::Terminated(Terminal::Success));
    sinks.success(operand, ctx);
    Ok(Verdict::Passed)
}

impl Chain {
    /// Runs the chain with the eager backend and the process-wide sinks.
    pub fn run(&self, operand: &Operand, ctx: &Context) -> Result<Verdict, ChainError> {
        Eager::new().run(self, operand, ctx)
    }
}

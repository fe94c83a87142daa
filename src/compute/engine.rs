//! The compiled backend.
//!
//! A chain is lowered once into a [`Program`] and replayed over a [`Batch`] in
//! two phases. The traced phase ([`kernel::trace`]) runs only tests and
//! continuation predicates, tolerating masks, and records [`Effect`]s. The
//! host phase then builds failures, runs handlers, and calls sinks.
//!
//! Errors never reach the caller. Anything that would make the eager backend
//! return `Err` is sent to the exception sink as [`Incident::Fatal`] and the
//! whole batch is reported as [`BatchOutcome::Aborted`]; no other sink calls
//! are made for that batch.

use crate::chain::{Chain, ChainError, Context};
use crate::compute::bytecode::{Compiler, Program};
use crate::compute::effects::Effect;
use crate::compute::kernel;
use crate::compute::ledger::{Batch, KernelStats};
use crate::compute::machine::{self, Verdict};
use crate::compute::ExecutionEngine;
use crate::operand::Operand;
use crate::state::{Incident, SinkRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// One verdict per lane, in lane order.
    Settled(Vec<Verdict>),
    /// A fatal error stopped the batch; it was delivered to the exception sink.
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub stats: KernelStats,
}

impl BatchReport {
    pub fn verdicts(&self) -> Option<&[Verdict]> {
        match &self.outcome {
            BatchOutcome::Settled(v) => Some(v),
            BatchOutcome::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool { matches!(self.outcome, BatchOutcome::Aborted) }
}

pub struct Compiled {
    compiler: Compiler,
    sinks: SinkRegistry,
}

impl Compiled {
    pub fn new() -> Self { Self::with_sinks(SinkRegistry::global()) }

    pub fn with_sinks(sinks: SinkRegistry) -> Self { Self { compiler: Compiler::new(), sinks } }

    pub fn compiler(&self) -> &Compiler { &self.compiler }

    pub fn run_batch(&self, chain: &Chain, batch: &Batch, ctx: &Context) -> BatchReport {
        let sinks = self.sinks.snapshot();
        let program = self.compiler.compile(chain);
        let mut stats = KernelStats::default();

        match settle(&program, batch, ctx, &mut stats) {
            Ok(verdicts) => {
                // Deferred host callbacks, in lane order.
                for (verdict, operand) in verdicts.iter().zip(batch.iter()) {
                    match verdict {
                        Verdict::Passed => sinks.success(operand, ctx),
                        Verdict::Failed(failure) => sinks.incident(&Incident::Failure(failure.clone()), ctx),
                        Verdict::Suppressed => {}
                    }
                }
                BatchReport { outcome: BatchOutcome::Settled(verdicts), stats }
            }
            Err(err) => {
                tracing::error!(
                    head = %chain.tag(),
                    fingerprint = %program.fingerprint,
                    lanes = batch.len(),
                    %err,
                    "compiled: batch aborted"
                );
                sinks.incident(&Incident::Fatal(err), ctx);
                BatchReport { outcome: BatchOutcome::Aborted, stats }
            }
        }
    }
}

impl Default for Compiled {
    fn default() -> Self { Self::new() }
}

impl ExecutionEngine for Compiled {
    type Output = BatchReport;

    /// Runs `operand` as a single-lane batch.
    fn execute(&self, chain: &Chain, operand: &Operand, ctx: &Context) -> BatchReport {
        self.run_batch(chain, &Batch::new(vec![operand.clone()]), ctx)
    }
}

fn settle(program: &Program, batch: &Batch, ctx: &Context, stats: &mut KernelStats) -> Result<Vec<Verdict>, ChainError> {
    // 1. Traced phase.
    let effects = kernel::trace(program, batch, ctx, stats)?;

    // 2. Host replay. Sinks wait until every lane has settled.
    let mut verdicts = vec![Verdict::Passed; batch.len()];
    for effect in effects {
        match effect {
            Effect::Succeed { lane } => verdicts[lane] = Verdict::Passed,
            Effect::Unwind { lane, depth } => {
                // The kernel only emits lanes of `batch` and depths of `program`.
                let failure = machine::make_failure(&program.steps[depth], &batch[lane], ctx)?;
                verdicts[lane] = machine::unwind(program.path(depth), failure, ctx, &mut ())?;
            }
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Behavior, ContractViolation};
    use crate::compute::Eager;
    use crate::operand::{DType, Tensor};
    use crate::store::{Interner, TypeTag};
    use crate::testing::*;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    /// A registry whose sinks log "ok:<operand>" and "fail:<message>" / "fatal:<error>".
    fn recording_sinks() -> (SinkRegistry, Log, Vec<crate::state::SinkGuard>) {
        let registry = SinkRegistry::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let (s, e) = (Arc::clone(&log), Arc::clone(&log));
        let guards = vec![
            registry.push_success(move |op: &Operand, _: &Context| s.lock().push(format!("ok:{}", op))),
            registry.push_exception(move |i: &Incident, _: &Context| {
                e.lock().push(match i {
                    Incident::Failure(f) => format!("fail:{}", f),
                    Incident::Fatal(err) => format!("fatal:{}", err),
                })
            }),
        ];
        (registry, log, guards)
    }

    #[test]
    fn test_batch_settles_each_lane() {
        let interner = Interner::new();
        let (sinks, log, _guards) = recording_sinks();
        let engine = Compiled::with_sinks(sinks);
        let chain = &interner.node(Positive).unwrap() & &interner.node(Even).unwrap();
        let batch = Batch::new(vec![Operand::from(2.0), Operand::from(-2.0), Operand::from(3.0)]);

        let report = engine.run_batch(&chain, &batch, &Context::new());
        let verdicts = report.verdicts().unwrap();
        assert_eq!(verdicts.iter().map(Verdict::is_valid).collect::<Vec<_>>(), vec![true, false, false]);
        assert_eq!(verdicts[1].failure().unwrap().origin, Some(TypeTag::of::<Positive>()));
        assert_eq!(verdicts[2].failure().unwrap().origin, Some(TypeTag::of::<Even>()));
        assert_eq!(
            *log.lock(),
            vec!["ok:2", "fail:[Positive] Value: not positive", "fail:[Even] Value: not even"]
        );
    }

    #[test]
    fn test_lanes_failing_at_different_depths_keep_their_failures() {
        let interner = Interner::new();
        let engine = Compiled::with_sinks(SinkRegistry::new());
        let chain = interner.node(Positive).unwrap()
            & interner.node(Even).unwrap()
            & interner.node(Threshold(10.0)).unwrap();
        let batch = Batch::new(vec![Operand::from(12.0), Operand::from(-1.0), Operand::from(3.0), Operand::from(4.0)]);

        let report = engine.run_batch(&chain, &batch, &Context::new());
        let origins: Vec<Option<TypeTag>> =
            report.verdicts().unwrap().iter().map(|v| v.failure().and_then(|f| f.origin)).collect();
        assert_eq!(
            origins,
            vec![Some(TypeTag::of::<Threshold>()), Some(TypeTag::of::<Positive>()), Some(TypeTag::of::<Even>()), None]
        );
        assert_eq!(batch[3], Operand::from(4.0));
    }

    #[test]
    fn test_vectorised_mask_results_are_accepted() {
        let interner = Interner::new();
        let engine = Compiled::with_sinks(SinkRegistry::new());
        let chain = interner.node(ReturnsMask(vec![true, false])).unwrap();
        let batch = Batch::new(vec![Operand::from(0.0), Operand::from(0.0)]);

        let report = engine.run_batch(&chain, &batch, &Context::new());
        let valid: Vec<bool> = report.verdicts().unwrap().iter().map(Verdict::is_valid).collect();
        assert_eq!(valid, vec![true, false]);
    }

    #[test]
    fn test_contract_violation_goes_to_sink_and_aborts() {
        let interner = Interner::new();
        let (sinks, log, _guards) = recording_sinks();
        let engine = Compiled::with_sinks(sinks);
        let chain = &interner.node(Positive).unwrap() & &interner.node(ReturnsInt).unwrap();
        let batch = Batch::new(vec![Operand::from(1.0), Operand::from(-1.0)]);

        let report = engine.run_batch(&chain, &batch, &Context::new());
        assert!(report.is_aborted());
        // The pending failure for lane 1 is discarded with the batch.
        assert_eq!(*log.lock(), vec!["fatal:ReturnsInt.test returned int, expected a boolean"]);
    }

    #[test]
    fn test_contract_error_asymmetry_between_backends() {
        let interner = Interner::new();
        let registry = SinkRegistry::new();
        let fatal = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fatal);
        let _guard = registry.push_exception(move |i: &Incident, _: &Context| seen.lock().push(i.clone()));
        let chain = interner.node(ReturnsInt).unwrap();
        let (x, ctx) = (Operand::from(1.0), Context::new());

        let eager_err = Eager::with_sinks(registry.clone()).run(&chain, &x, &ctx).unwrap_err();
        assert!(fatal.lock().is_empty());

        let report = Compiled::with_sinks(registry).execute(&chain, &x, &ctx);
        assert!(report.is_aborted());
        assert_eq!(*fatal.lock(), vec![Incident::Fatal(eager_err.clone())]);
        match eager_err {
            ChainError::Contract(e) => {
                assert_eq!(e.behavior, Behavior::Test);
                assert_eq!(e.violation, ContractViolation::WrongType { found: "int" });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_raise_aborts_compiled_batch() {
        let interner = Interner::new();
        let (sinks, log, _guards) = recording_sinks();
        let engine = Compiled::with_sinks(sinks);
        let chain = &interner.node(RaiseAll).unwrap() & &interner.node(Positive).unwrap();

        let report = engine.execute(&chain, &Operand::from(-1.0), &Context::new());
        assert!(report.is_aborted());
        assert_eq!(log.lock().len(), 1);
        assert!(log.lock()[0].starts_with("fatal:RaiseAll raised"));
    }

    #[test]
    fn test_program_is_compiled_once() {
        let interner = Interner::new();
        let engine = Compiled::with_sinks(SinkRegistry::new());
        let chain = interner.node(Positive).unwrap();
        for x in [1.0, 2.0, -3.0] {
            engine.execute(&chain, &Operand::from(x), &Context::new());
        }
        assert_eq!(engine.compiler().cached(), 1);
    }

    #[test]
    fn test_tensor_batch_lanes() {
        let interner = Interner::new();
        let engine = Compiled::with_sinks(SinkRegistry::new());
        let chain = interner.node(Positive).unwrap();
        let t = Tensor::new(DType::F32, &[3, 2], vec![1.0, 2.0, -1.0, 2.0, 0.5, 0.5]).unwrap();

        let report = engine.run_batch(&chain, &Batch::from_tensor(&t).unwrap(), &Context::new());
        let valid: Vec<bool> = report.verdicts().unwrap().iter().map(Verdict::is_valid).collect();
        assert_eq!(valid, vec![true, false, true]);
        assert_eq!(report.stats.lanes_tested, 3);
    }

    fn equivalence_chains(interner: &Interner) -> Vec<Chain> {
        let order = Arc::new(Mutex::new(Vec::new()));
        vec![
            interner.node(Positive).unwrap(),
            &interner.node(Positive).unwrap() & &interner.node(Even).unwrap(),
            &interner.node(StopWhen("halt")).unwrap() & &interner.node(Threshold(3.0)).unwrap(),
            &interner.node(SuppressAll).unwrap() & &interner.node(Even).unwrap(),
            interner
                .link(vec![Recorder::link(interner, "outer", &order), Recorder::failing_link(interner, "inner", &order)])
                .unwrap(),
        ]
    }

    #[rstest]
    #[case(4.0, Context::new())]
    #[case(-4.0, Context::new())]
    #[case(3.0, Context::new())]
    #[case(5.0, Context::new().with("halt", true))]
    #[case(5.0, Context::new().with("halt", false))]
    fn test_backends_agree(#[case] x: f64, #[case] ctx: Context) {
        let interner = Interner::new();
        let eager = Eager::with_sinks(SinkRegistry::new());
        let compiled = Compiled::with_sinks(SinkRegistry::new());
        let operand = Operand::from(x);

        for chain in equivalence_chains(&interner) {
            let expected = eager.run(&chain, &operand, &ctx).unwrap();
            let report = compiled.execute(&chain, &operand, &ctx);
            assert_eq!(report.verdicts(), Some(std::slice::from_ref(&expected)), "chain {}", chain);
        }
    }
}

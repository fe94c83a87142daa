//! The per-invocation state machine shared by both backends.
//!
//! ```text
//! Start -> Testing(n) -> Passed(n) -> Testing(n.next) | Terminated(Success)
//!                     -> Failed(n) -> Unwinding(n) .. Unwinding(head) -> Terminated(..)
//! ```
//!
//! Every call into user code goes through [`guard`], which turns returned
//! errors and panics into [`ChainError`]s naming the node and behavior.

use crate::chain::{
    Behavior, BehaviorContractError, Chain, ChainError, Context, ContractViolation, Disposition, NodeError,
    Truth, ValidationFailure, Value,
};
use crate::compute::ledger::{Batch, Mask};
use crate::operand::Operand;
use crate::store::{NodeId, TypeTag};
use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Branch index after a node has been tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Case {
    Failed = 0,
    Stop = 1,
    Continue = 2,
}

#[inline(always)]
pub fn classify(passed: bool, proceed: bool) -> Case {
    match (passed, proceed) {
        (false, _) => Case::Failed,
        (true, false) => Case::Stop,
        (true, true) => Case::Continue,
    }
}

/// Final result of a completed execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed,
    /// The failure as left by the outermost handler.
    Failed(ValidationFailure),
    /// A handler suppressed the failure.
    Suppressed,
}

impl Verdict {
    /// Passed and suppressed runs both count as valid.
    pub fn is_valid(&self) -> bool { !matches!(self, Verdict::Failed(_)) }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Verdict::Failed(f) => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Success,
    Failure,
    Suppressed,
    /// A handler raised the failure to the caller.
    Raised,
    /// A behavior broke its contract or could not read the context.
    Aborted,
}

impl Terminal {
    /// The final state of an execution that ended in `err`.
    pub fn of_error(err: &ChainError) -> Self {
        match err {
            ChainError::Raised { .. } => Terminal::Raised,
            _ => Terminal::Aborted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Testing(NodeId, TypeTag),
    Passed(NodeId, TypeTag),
    Failed(NodeId, TypeTag),
    Unwinding(NodeId, TypeTag),
    Terminated(Terminal),
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Start => f.write_str("start"),
            Transition::Testing(_, kind) => write!(f, "testing {}", kind),
            Transition::Passed(_, kind) => write!(f, "passed {}", kind),
            Transition::Failed(_, kind) => write!(f, "failed {}", kind),
            Transition::Unwinding(_, kind) => write!(f, "unwinding {}", kind),
            Transition::Terminated(t) => write!(f, "terminated {:?}", t),
        }
    }
}

/// Receives transitions as an execution makes them.
pub trait Observer {
    fn observe(&mut self, transition: Transition);
}

impl Observer for () {
    #[inline(always)]
    fn observe(&mut self, _: Transition) {}
}

/// A recorded sequence of transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub transitions: Vec<Transition>,
}

impl Observer for Trace {
    fn observe(&mut self, transition: Transition) { self.transitions.push(transition); }
}

impl Trace {
    /// Kinds whose handlers ran, in call order.
    pub fn unwound(&self) -> Vec<TypeTag> {
        self.transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Unwinding(_, kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Kinds whose tests ran, in call order.
    pub fn tested(&self) -> Vec<TypeTag> {
        self.transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Testing(_, kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn at(node: &Chain, make: fn(NodeId, TypeTag) -> Transition) -> Transition {
    make(node.id(), node.tag())
}

fn contract(node: &Chain, behavior: Behavior, violation: ContractViolation) -> ChainError {
    tracing::warn!(kind = %node.tag(), %behavior, %violation, "behavior contract violated");
    ChainError::Contract(BehaviorContractError { kind: node.tag(), behavior, violation })
}

fn lift(node: &Chain, behavior: Behavior, err: NodeError) -> ChainError {
    match err {
        NodeError::MissingContextKey(key) => ChainError::MissingContextKey { kind: node.tag(), key },
        NodeError::ContextType { key, expected, found } => {
            ChainError::InvalidContext { kind: node.tag(), key, expected, found }
        }
        NodeError::Failed(msg) => contract(node, behavior, ContractViolation::Errored(msg)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => s.to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

/// Runs one behavior of `node`, lifting its errors and panics.
pub fn guard<T>(
    node: &Chain,
    behavior: Behavior,
    f: impl FnOnce() -> Result<T, NodeError>,
) -> Result<T, ChainError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(lift(node, behavior, err)),
        Err(payload) => Err(contract(node, behavior, ContractViolation::Panicked(panic_message(payload)))),
    }
}

/// Narrows a scalar-only result. Masks are rejected.
pub fn expect_bool(node: &Chain, behavior: Behavior, truth: Truth) -> Result<bool, ChainError> {
    match truth {
        Truth::Bool(b) | Truth::Dynamic(Value::Bool(b)) => Ok(b),
        Truth::Mask(_) => Err(contract(node, behavior, ContractViolation::WrongType { found: "mask" })),
        Truth::Dynamic(other) => {
            Err(contract(node, behavior, ContractViolation::WrongType { found: other.type_name() }))
        }
    }
}

/// Widens a result to `lanes` lanes. Scalars broadcast; masks must match.
pub fn expect_lanes(node: &Chain, behavior: Behavior, truth: Truth, lanes: usize) -> Result<Mask, ChainError> {
    match truth {
        Truth::Bool(b) | Truth::Dynamic(Value::Bool(b)) => Ok(Mask::splat(b, lanes)),
        Truth::Mask(mask) if mask.len() == lanes => Ok(mask),
        Truth::Mask(mask) => Err(contract(
            node,
            behavior,
            ContractViolation::MaskLength { expected: lanes, found: mask.len() },
        )),
        Truth::Dynamic(other) => {
            Err(contract(node, behavior, ContractViolation::WrongType { found: other.type_name() }))
        }
    }
}

pub fn test(node: &Chain, operand: &Operand, ctx: &Context) -> Result<bool, ChainError> {
    let truth = guard(node, Behavior::Test, || node.check().test(operand, ctx))?;
    expect_bool(node, Behavior::Test, truth)
}

/// Tests every lane of `batch`, vectorised when the check supports it.
pub fn test_lanes(node: &Chain, batch: &Batch, ctx: &Context) -> Result<Mask, ChainError> {
    let batched = guard(node, Behavior::Test, || node.check().test_batch(batch, ctx).transpose())?;
    match batched {
        Some(truth) => expect_lanes(node, Behavior::Test, truth, batch.len()),
        None => batch.iter().map(|operand| test(node, operand, ctx)).collect(),
    }
}

/// Whether traversal moves on to the continuation. Always false at the tail.
pub fn proceed(node: &Chain, ctx: &Context) -> Result<bool, ChainError> {
    if node.next().is_none() {
        return Ok(false);
    }
    let truth = guard(node, Behavior::ContinuePredicate, || node.check().continue_predicate(ctx))?;
    expect_bool(node, Behavior::ContinuePredicate, truth)
}

pub fn proceed_lanes(node: &Chain, ctx: &Context, lanes: usize) -> Result<Mask, ChainError> {
    if node.next().is_none() {
        return Ok(Mask::splat(false, lanes));
    }
    let truth = guard(node, Behavior::ContinuePredicate, || node.check().continue_predicate(ctx))?;
    expect_lanes(node, Behavior::ContinuePredicate, truth, lanes)
}

/// Builds the failure for a node whose test failed and stamps its origin.
pub fn make_failure(node: &Chain, operand: &Operand, ctx: &Context) -> Result<ValidationFailure, ChainError> {
    let mut failure = guard(node, Behavior::MakeFailure, || node.check().make_failure(operand, ctx))?;
    failure.origin.get_or_insert(node.tag());
    Ok(failure)
}

/// Hands `failure` to every node on `path`, from the last (the failing node)
/// back to the first (the head).
pub fn unwind<N, O>(path: &[N], failure: ValidationFailure, ctx: &Context, observer: &mut O) -> Result<Verdict, ChainError>
where
    N: Borrow<Chain>,
    O: Observer + ?Sized,
{
    let mut failure = failure;
    for node in path.iter().rev() {
        let node = node.borrow();
        observer.observe(at(node, Transition::Unwinding));
        match guard(node, Behavior::HandleFailure, || node.check().handle_failure(failure, ctx))? {
            Disposition::Propagate(next) => failure = next,
            Disposition::Suppress => {
                tracing::debug!(kind = %node.tag(), "failure suppressed");
                observer.observe(Transition::Terminated(Terminal::Suppressed));
                return Ok(Verdict::Suppressed);
            }
            Disposition::Raise(raised) => {
                return Err(ChainError::Raised { kind: node.tag(), failure: raised });
            }
        }
    }
    observer.observe(Transition::Terminated(Terminal::Failure));
    Ok(Verdict::Failed(failure))
}

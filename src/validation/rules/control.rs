//! Nodes that never reject an operand and only shape how failures travel.

use crate::chain::{Check, Context, Disposition, FailureType, NodeError, Truth, ValidationFailure};
use crate::operand::Operand;
use crate::store::{ArgValue, Args};
use parking_lot::Mutex;
use std::sync::Arc;

fn never_fails() -> Result<ValidationFailure, NodeError> {
    Ok(ValidationFailure::new(FailureType::Other, "passthrough node does not fail"))
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Check for Passthrough {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }
}

/// Stops the chain here when `suppress_errors` is set, so nothing further
/// down can fail. The constructor value is used when the key is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppressWhenFlagged {
    pub default: bool,
}

impl SuppressWhenFlagged {
    pub const KEY: &'static str = "suppress_errors";

    pub fn new(default: bool) -> Self { Self { default } }
}

impl Check for SuppressWhenFlagged {
    fn args(&self) -> Args { Args::new().with(self.default) }

    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }

    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }

    fn continue_predicate(&self, ctx: &Context) -> Result<Truth, NodeError> {
        Ok((!ctx.get_or(Self::KEY, self.default)?).into())
    }
}

/// Swallows any failure that reaches it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Suppress;

impl Check for Suppress {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }
    fn handle_failure(&self, _: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Suppress)
    }
}

/// Turns any failure that reaches it into an error for the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raise;

impl Check for Raise {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }
    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Raise(failure))
    }
}

/// Logs failures at `warn` and passes them on.
#[derive(Debug, Clone)]
pub struct Log {
    pub label: String,
}

impl Log {
    pub fn new(label: impl Into<String>) -> Self { Self { label: label.into() } }
}

impl Check for Log {
    fn args(&self) -> Args { Args::new().with(self.label.as_str()) }

    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }

    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }

    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        tracing::warn!(label = %self.label, error_type = ?failure.error_type, "validation: {}", failure);
        Ok(Disposition::Propagate(failure))
    }
}

/// Appends a note to failures passing through.
#[derive(Debug, Clone)]
pub struct Annotate(pub String);

impl Annotate {
    pub fn new(note: impl Into<String>) -> Self { Self(note.into()) }
}

impl Check for Annotate {
    fn args(&self) -> Args { Args::new().with(self.0.as_str()) }

    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }

    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }

    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Propagate(failure.with_note(self.0.clone())))
    }
}

/// Records a copy of every failure passing through.
///
/// Two collectors are the same node only if they share a store.
#[derive(Debug, Clone, Default)]
pub struct Collect {
    store: Arc<Mutex<Vec<ValidationFailure>>>,
}

impl Collect {
    pub fn new() -> Self { Self::default() }

    /// Failures recorded so far, oldest first.
    pub fn collected(&self) -> Vec<ValidationFailure> { self.store.lock().clone() }

    pub fn clear(&self) { self.store.lock().clear() }
}

impl Check for Collect {
    fn args(&self) -> Args { Args::new().with(ArgValue::identity(&self.store)) }

    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }

    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { never_fails() }

    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        self.store.lock().push(failure.clone());
        Ok(Disposition::Propagate(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use crate::compute::{Eager, Verdict};
    use crate::state::{Incident, SinkRegistry};
    use crate::store::Interner;
    use crate::testing::{AlwaysThrows, Positive};
    use rstest::rstest;

    fn eager() -> Eager { Eager::with_sinks(SinkRegistry::new()) }

    #[rstest]
    #[case(false, None, false)]
    #[case(true, None, true)]
    #[case(false, Some(true), true)]
    #[case(true, Some(false), false)]
    fn test_suppress_flag_stops_the_chain(
        #[case] default: bool,
        #[case] flag: Option<bool>,
        #[case] stops: bool,
    ) {
        let interner = Interner::new();
        let chain = interner.node(SuppressWhenFlagged::new(default)).unwrap() & interner.node(AlwaysThrows).unwrap();
        let mut ctx = Context::new();
        if let Some(flag) = flag {
            ctx.insert(SuppressWhenFlagged::KEY, flag);
        }
        let result = eager().run(&chain, &Operand::from(1.0), &ctx);
        assert_eq!(result.is_ok(), stops);
    }

    #[test]
    fn test_suppress_makes_run_valid() {
        let interner = Interner::new();
        let registry = SinkRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let _guard = registry.push_exception(move |_: &Incident, _: &Context| *counter.lock() += 1);

        let chain = interner.node(Suppress).unwrap() & interner.node(Positive).unwrap();
        let verdict = Eager::with_sinks(registry.clone()).run(&chain, &Operand::from(-1.0), &Context::new()).unwrap();

        assert_eq!(verdict, Verdict::Suppressed);
        assert!(verdict.is_valid());
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn test_raise_surfaces_failure() {
        let interner = Interner::new();
        let chain = interner.node(Raise).unwrap() & interner.node(Positive).unwrap();
        let err = eager().run(&chain, &Operand::from(-1.0), &Context::new()).unwrap_err();
        match err {
            ChainError::Raised { failure, .. } => assert_eq!(failure.message, "not positive"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_collect_and_annotate_propagate() {
        let interner = Interner::new();
        let collect = Collect::new();
        let chain = interner.node(collect.clone()).unwrap()
            & interner.node(Annotate::new("inputs")).unwrap()
            & interner.node(Log::new("probe")).unwrap()
            & interner.node(Positive).unwrap();

        let verdict = eager().run(&chain, &Operand::from(-2.0), &Context::new()).unwrap();
        let failure = verdict.failure().unwrap();
        assert_eq!(failure.notes, vec!["inputs".to_string()]);
        assert_eq!(collect.collected(), vec![failure.clone()]);

        collect.clear();
        assert!(collect.collected().is_empty());
    }

    #[test]
    fn test_collectors_with_distinct_stores_are_distinct_nodes() {
        let interner = Interner::new();
        let a = Collect::new();
        assert_eq!(interner.node(a.clone()).unwrap(), interner.node(a).unwrap());
        assert_ne!(interner.node(Collect::new()).unwrap(), interner.node(Collect::new()).unwrap());
    }
}

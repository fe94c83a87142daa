//! Small checks shared by the unit tests.

use crate::chain::{Check, Context, Disposition, Link, NodeError, Truth, ValidationFailure, Value};
use crate::compute::{Batch, Mask};
use crate::operand::Operand;
use crate::store::{ArgValue, Args, Interner};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Positive;

impl Check for Positive {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(operand.values().iter().all(|x| *x > 0.0).into())
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("not positive"))
    }
}

pub struct Even;

impl Check for Even {
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(operand.values().iter().all(|x| x % 2.0 == 0.0).into())
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("not even"))
    }
}

/// Passes when every value is below the threshold.
pub struct Threshold(pub f64);

impl Check for Threshold {
    fn args(&self) -> Args { Args::new().with(self.0) }
    fn test(&self, operand: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Ok(operand.values().iter().all(|x| *x < self.0).into())
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value(format!("not below {}", self.0)))
    }
}

/// Carries an argument with no structural identity.
pub struct Opaque;

impl Check for Opaque {
    fn args(&self) -> Args { Args::new().with(ArgValue::opaque::<fn()>()) }
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
}

pub struct AlwaysThrows;

impl Check for AlwaysThrows {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> {
        Err(NodeError::Failed("always throws".into()))
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
}

pub struct Panics;

impl Check for Panics {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { panic!("check exploded") }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
}

/// Returns the integer 1 from `test`.
pub struct ReturnsInt;

impl Check for ReturnsInt {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(Truth::Dynamic(Value::Int(1))) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
}

/// Returns a fixed mask, both per operand and per batch.
pub struct ReturnsMask(pub Vec<bool>);

impl Check for ReturnsMask {
    fn args(&self) -> Args { Args::new().with(self.0.clone()) }
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(Mask::from(self.0.clone()).into()) }
    fn test_batch(&self, _: &Batch, _: &Context) -> Option<Result<Truth, NodeError>> {
        Some(Ok(Mask::from(self.0.clone()).into()))
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("masked out"))
    }
}

/// Always passes; stops the chain when the named flag is set.
pub struct StopWhen(pub &'static str);

impl Check for StopWhen {
    fn args(&self) -> Args { Args::new().with(self.0) }
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
    fn continue_predicate(&self, ctx: &Context) -> Result<Truth, NodeError> {
        Ok((!ctx.get_or(self.0, false)?).into())
    }
}

/// Requires a context key to be present.
pub struct NeedsKey(pub &'static str);

impl Check for NeedsKey {
    fn args(&self) -> Args { Args::new().with(self.0) }
    fn test(&self, _: &Operand, ctx: &Context) -> Result<Truth, NodeError> {
        ctx.require::<usize>(self.0)?;
        Ok(true.into())
    }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
}

pub struct SuppressAll;

impl Check for SuppressAll {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
    fn handle_failure(&self, _: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Suppress)
    }
}

pub struct RaiseAll;

impl Check for RaiseAll {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Raise(failure))
    }
}

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Logs its name when its handler runs and adds it as a note.
pub struct Recorder {
    name: &'static str,
    log: CallLog,
    fails: bool,
}

impl Recorder {
    pub fn link(interner: &Interner, name: &'static str, log: &CallLog) -> Link {
        Self::build(interner, name, log, false)
    }

    pub fn failing_link(interner: &Interner, name: &'static str, log: &CallLog) -> Link {
        Self::build(interner, name, log, true)
    }

    fn build(interner: &Interner, name: &'static str, log: &CallLog, fails: bool) -> Link {
        let node = interner.node(Recorder { name, log: Arc::clone(log), fails }).unwrap();
        Link::from(&node)
    }
}

impl Check for Recorder {
    fn args(&self) -> Args {
        Args::new().with(self.name).with(ArgValue::identity(&self.log)).named("fails", self.fails)
    }
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok((!self.fails).into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value(format!("{} failed", self.name)))
    }
    fn handle_failure(&self, failure: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        self.log.lock().push(self.name);
        Ok(Disposition::Propagate(failure.with_note(self.name)))
    }
}

/// Always passes; its handler returns an error.
pub struct BadHandler;

impl Check for BadHandler {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
    fn handle_failure(&self, _: ValidationFailure, _: &Context) -> Result<Disposition, NodeError> {
        Err(NodeError::Failed("handler".into()))
    }
}

/// Always passes; its continuation predicate returns the integer 1.
pub struct BadPredicate;

impl Check for BadPredicate {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(true.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> {
        Ok(ValidationFailure::value("unreachable"))
    }
    fn continue_predicate(&self, _: &Context) -> Result<Truth, NodeError> { Ok(Truth::Dynamic(Value::Int(1))) }
}

/// Always fails; building its failure panics.
pub struct BadFactory;

impl Check for BadFactory {
    fn test(&self, _: &Operand, _: &Context) -> Result<Truth, NodeError> { Ok(false.into()) }
    fn make_failure(&self, _: &Operand, _: &Context) -> Result<ValidationFailure, NodeError> { panic!("factory") }
}

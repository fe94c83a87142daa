//! Success and exception sinks with scoped registration.
//!
//! Each registry keeps one stack per sink kind. Pushing a sink returns a
//! [`SinkGuard`]; dropping the guard removes exactly that entry, so the sink
//! below it becomes current again on every exit path, panics included.
//!
//! Registration may happen while executions are in flight. An execution takes
//! a [`Sinks`] snapshot when it starts and never looks at the registry again.

use crate::chain::{ChainError, Context, ValidationFailure};
use crate::operand::Operand;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

/// What reaches the exception sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Incident {
    /// A validation failure no handler suppressed or raised.
    Failure(ValidationFailure),
    /// An error that aborted a compiled batch.
    Fatal(ChainError),
}

pub trait SuccessSink: Send + Sync {
    fn on_success(&self, operand: &Operand, ctx: &Context);
}

pub trait ExceptionSink: Send + Sync {
    fn on_incident(&self, incident: &Incident, ctx: &Context);
}

impl<F> SuccessSink for F
where
    F: Fn(&Operand, &Context) + Send + Sync,
{
    fn on_success(&self, operand: &Operand, ctx: &Context) { self(operand, ctx) }
}

impl<F> ExceptionSink for F
where
    F: Fn(&Incident, &Context) + Send + Sync,
{
    fn on_incident(&self, incident: &Incident, ctx: &Context) { self(incident, ctx) }
}

#[derive(Default)]
struct Stacks {
    success: Vec<(u64, Arc<dyn SuccessSink>)>,
    exception: Vec<(u64, Arc<dyn ExceptionSink>)>,
    next_token: u64,
}

impl Stacks {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

/// A pair of sink stacks. Clones share the same stacks.
#[derive(Clone, Default)]
pub struct SinkRegistry(Arc<RwLock<Stacks>>);

static GLOBAL: OnceLock<SinkRegistry> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Success,
    Exception,
}

impl SinkRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn global() -> Self {
        GLOBAL.get_or_init(SinkRegistry::new).clone()
    }

    pub fn push_success(&self, sink: impl SuccessSink + 'static) -> SinkGuard {
        let mut stacks = self.0.write();
        let token = stacks.token();
        stacks.success.push((token, Arc::new(sink)));
        tracing::trace!(token, depth = stacks.success.len(), "sinks: pushed success sink");
        SinkGuard { registry: self.clone(), slot: Slot::Success, token }
    }

    pub fn push_exception(&self, sink: impl ExceptionSink + 'static) -> SinkGuard {
        let mut stacks = self.0.write();
        let token = stacks.token();
        stacks.exception.push((token, Arc::new(sink)));
        tracing::trace!(token, depth = stacks.exception.len(), "sinks: pushed exception sink");
        SinkGuard { registry: self.clone(), slot: Slot::Exception, token }
    }

    /// The sinks current right now. Missing sinks are no-ops.
    pub fn snapshot(&self) -> Sinks {
        let stacks = self.0.read();
        Sinks {
            success: stacks.success.last().map(|(_, s)| Arc::clone(s)),
            exception: stacks.exception.last().map(|(_, s)| Arc::clone(s)),
        }
    }

    /// Number of registered (success, exception) sinks.
    pub fn depth(&self) -> (usize, usize) {
        let stacks = self.0.read();
        (stacks.success.len(), stacks.exception.len())
    }

    fn remove(&self, slot: Slot, token: u64) {
        let mut stacks = self.0.write();
        match slot {
            Slot::Success => stacks.success.retain(|(t, _)| *t != token),
            Slot::Exception => stacks.exception.retain(|(t, _)| *t != token),
        }
        tracing::trace!(token, ?slot, "sinks: released");
    }
}

/// Keeps a sink registered until dropped.
#[must_use = "the sink is unregistered as soon as the guard is dropped"]
pub struct SinkGuard {
    registry: SinkRegistry,
    slot: Slot,
    token: u64,
}

impl SinkGuard {
    /// Unregisters the sink now.
    pub fn release(self) {}
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.registry.remove(self.slot, self.token);
    }
}

/// The sinks one execution reports to.
#[derive(Clone, Default)]
pub struct Sinks {
    success: Option<Arc<dyn SuccessSink>>,
    exception: Option<Arc<dyn ExceptionSink>>,
}

impl Sinks {
    pub fn none() -> Self { Self::default() }

    pub fn success(&self, operand: &Operand, ctx: &Context) {
        if let Some(sink) = &self.success {
            sink.on_success(operand, ctx);
        }
    }

    pub fn incident(&self, incident: &Incident, ctx: &Context) {
        if let Some(sink) = &self.exception {
            sink.on_incident(incident, ctx);
        }
    }
}

/// Registers `sink` as the process-wide success sink for the guard's lifetime.
pub fn with_success_sink(sink: impl SuccessSink + 'static) -> SinkGuard {
    SinkRegistry::global().push_success(sink)
}

/// Registers `sink` as the process-wide exception sink for the guard's lifetime.
pub fn with_exception_sink(sink: impl ExceptionSink + 'static) -> SinkGuard {
    SinkRegistry::global().push_exception(sink)
}

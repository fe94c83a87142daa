//! The chain link: a user check plus its interned identity and continuation.

use crate::chain::context::{Context, Value};
use crate::chain::error::{ConstructionError, NodeError, ValidationFailure};
use crate::compute::ledger::{Batch, Mask};
use crate::operand::Operand;
use crate::store::interner::Shared;
use crate::store::{Args, CanonicalArgs, Fingerprint, Interner, NodeId, StructuralKey, TypeTag};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Result of `test` and `continue_predicate`.
///
/// `Mask` is only accepted by the compiled backend. `Dynamic` exists for
/// checks bridged from dynamically typed code; anything but a bool inside it
/// is a contract violation.
#[derive(Debug, Clone, PartialEq)]
pub enum Truth {
    Bool(bool),
    Mask(Mask),
    Dynamic(Value),
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self { Truth::Bool(b) }
}

impl From<Mask> for Truth {
    fn from(m: Mask) -> Self { Truth::Mask(m) }
}

/// What `handle_failure` decided for a failure passing through it.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Hand this failure (possibly transformed) to the next ancestor.
    Propagate(ValidationFailure),
    /// Stop unwinding; the run counts as valid and no sink fires.
    Suppress,
    /// Stop unwinding and surface the failure as an error.
    Raise(ValidationFailure),
}

/// The four user-supplied behaviors of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    Test,
    MakeFailure,
    ContinuePredicate,
    HandleFailure,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Behavior::Test => "test",
            Behavior::MakeFailure => "make_failure",
            Behavior::ContinuePredicate => "continue_predicate",
            Behavior::HandleFailure => "handle_failure",
        })
    }
}

/// A validation unit.
///
/// The struct implementing `Check` is the public constructor: its fields are
/// the user arguments, reported through [`Check::args`]. The continuation is
/// attached separately by [`Interner::build`]. Construction goes through the
/// interner, so a check must not depend on being constructed exactly once.
pub trait Check: Send + Sync + 'static {
    /// Constructor arguments. Two checks of the same type with equal args are
    /// interchangeable.
    fn args(&self) -> Args { Args::new() }

    fn test(&self, operand: &Operand, ctx: &Context) -> Result<Truth, NodeError>;

    /// Vectorised test over a batch, returning one lane per operand. `None`
    /// falls back to calling `test` lane by lane.
    fn test_batch(&self, _batch: &Batch, _ctx: &Context) -> Option<Result<Truth, NodeError>> {
        None
    }

    /// Called only after `test` reported false.
    fn make_failure(&self, operand: &Operand, ctx: &Context) -> Result<ValidationFailure, NodeError>;

    fn continue_predicate(&self, _ctx: &Context) -> Result<Truth, NodeError> {
        Ok(Truth::Bool(true))
    }

    fn handle_failure(&self, failure: ValidationFailure, _ctx: &Context) -> Result<Disposition, NodeError> {
        Ok(Disposition::Propagate(failure))
    }
}

pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) key: StructuralKey,
    pub(crate) check: Arc<dyn Check>,
    pub(crate) next: Option<Chain>,
    pub(crate) len: usize,
    pub(crate) home: Weak<Shared>,
}

impl Node {
    #[inline(always)]
    pub fn id(&self) -> NodeId { self.id }
    pub fn tag(&self) -> TypeTag { self.key.tag() }
    pub fn args(&self) -> &CanonicalArgs { self.key.args() }
    pub fn fingerprint(&self) -> Fingerprint { self.key.fingerprint() }
    pub fn key(&self) -> &StructuralKey { &self.key }
    pub fn check(&self) -> &dyn Check { self.check.as_ref() }
    pub(crate) fn check_arc(&self) -> Arc<dyn Check> { Arc::clone(&self.check) }
    pub fn next(&self) -> Option<&Chain> { self.next.as_ref() }

    /// Number of nodes from here to the tail, inclusive.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.len }
}

/// A node together with everything reachable through its continuation.
///
/// Chains are canonical: equality and hashing are by node identity, which
/// for chains from one interner coincides with structural equality.
#[derive(Clone)]
pub struct Chain(pub(crate) Arc<Node>);

impl Chain {
    /// A single-node chain on the global interner.
    pub fn of<C: Check>(check: C) -> Result<Chain, ConstructionError> {
        Interner::global().node(check)
    }

    pub fn ptr_eq(a: &Chain, b: &Chain) -> bool { Arc::ptr_eq(&a.0, &b.0) }

    /// The interner that owns this chain, or the global one if it was dropped.
    pub fn home(&self) -> Interner {
        self.home.upgrade().map(Interner).unwrap_or_else(Interner::global)
    }
}

impl Deref for Chain {
    type Target = Node;
    fn deref(&self) -> &Node { &self.0 }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool { Chain::ptr_eq(self, other) }
}

impl Eq for Chain {}

impl Hash for Chain {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|n| n.tag())).finish()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" & ")?;
            }
            if node.args().is_empty() {
                write!(f, "{}", node.tag())?;
            } else {
                write!(f, "{}({})", node.tag(), node.args())?;
            }
        }
        Ok(())
    }
}

/// One flattened link of a chain: everything but the continuation.
#[derive(Clone)]
pub struct Link {
    pub tag: TypeTag,
    pub args: CanonicalArgs,
    pub(crate) check: Arc<dyn Check>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("tag", &self.tag).field("args", &self.args).finish()
    }
}

impl From<&Chain> for Link {
    fn from(node: &Chain) -> Self {
        Link { tag: node.tag(), args: node.args().clone(), check: node.check_arc() }
    }
}

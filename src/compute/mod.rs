//! Chain execution.
//!
//! Two backends implement [`ExecutionEngine`] over the state machine in
//! [`machine`]: [`Eager`] walks the chain on the host and returns errors to the
//! caller; [`Compiled`] lowers it into a [`Program`] and replays batches,
//! reporting errors through the exception sink.
pub mod bytecode;
pub mod eager;
pub mod effects;
pub mod engine;
pub mod kernel;
pub mod ledger;
pub mod machine;

use crate::chain::{Chain, Context};
use crate::operand::Operand;

pub use bytecode::{Compiler, Program};
pub use eager::Eager;
pub use engine::{BatchOutcome, BatchReport, Compiled};
pub use ledger::{Batch, KernelStats, Mask};
pub use machine::{Case, Observer, Terminal, Trace, Transition, Verdict};

pub trait ExecutionEngine {
    type Output;

    fn execute(&self, chain: &Chain, operand: &Operand, ctx: &Context) -> Self::Output;
}

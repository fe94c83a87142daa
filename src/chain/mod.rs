//! Validation nodes, chain composition, and the execution context.
pub mod algebra;
pub mod context;
pub mod error;
pub mod node;

pub use algebra::Iter;
pub use context::{Context, FromValue, Value};
pub use error::{
    BehaviorContractError, ChainError, ConstructionError, ContractViolation, FailureType, NodeError,
    ValidationFailure,
};
pub use node::{Behavior, Chain, Check, Disposition, Link, Node, Truth};

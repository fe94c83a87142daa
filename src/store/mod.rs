//! Node identity: canonical arguments, structural keys, and the interner.
pub mod args;
pub mod interner;
pub mod key;
pub mod types;

pub use args::{canonicalize, ArgValue, Args, CanonicalArgs, Unhashable};
pub use interner::{Interner, InternerConfig, InternerStats};
pub use key::StructuralKey;
pub use types::{Fingerprint, NodeId, TypeTag};

use crate::chain::node::Behavior;
use crate::store::TypeTag;
use std::fmt;
use thiserror::Error;

/// Broad category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureType {
    Value,
    Type,
    Shape,
    Other,
}

/// "The operand is invalid." Produced by `make_failure`, carried back through
/// every ancestor's `handle_failure`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    /// Kind of the node whose test failed. Stamped by the engine.
    pub origin: Option<TypeTag>,
    pub error_type: FailureType,
    pub message: String,
    /// Annotations appended by handlers on the way out.
    pub notes: Vec<String>,
}

impl ValidationFailure {
    pub fn new(error_type: FailureType, message: impl Into<String>) -> Self {
        Self { origin: None, error_type, message: message.into(), notes: Vec::new() }
    }

    pub fn value(message: impl Into<String>) -> Self { Self::new(FailureType::Value, message) }
    pub fn type_error(message: impl Into<String>) -> Self { Self::new(FailureType::Type, message) }
    pub fn shape(message: impl Into<String>) -> Self { Self::new(FailureType::Shape, message) }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Some(origin) => write!(f, "[{}] {:?}: {}", origin, self.error_type, self.message)?,
            None => write!(f, "{:?}: {}", self.error_type, self.message)?,
        }
        for note in &self.notes {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Errors a check implementation may return from any behavior.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("missing context key '{0}'")]
    MissingContextKey(String),
    #[error("context key '{key}' holds {found}, expected {expected}")]
    ContextType { key: String, expected: &'static str, found: &'static str },
    #[error("{0}")]
    Failed(String),
}

/// How a behavior broke its contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("returned an error: {0}")]
    Errored(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("returned {found}, expected a boolean")]
    WrongType { found: &'static str },
    #[error("returned a mask of {found} lanes, expected {expected}")]
    MaskLength { expected: usize, found: usize },
}

/// A check is implemented incorrectly. Never routed through handlers.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}.{behavior} {violation}")]
pub struct BehaviorContractError {
    pub kind: TypeTag,
    pub behavior: Behavior,
    pub violation: ContractViolation,
}

/// Errors that end an execution without a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error(transparent)]
    Contract(#[from] BehaviorContractError),
    #[error("{kind} requires context key '{key}'")]
    MissingContextKey { kind: TypeTag, key: String },
    #[error("{kind}: context key '{key}' holds {found}, expected {expected}")]
    InvalidContext { kind: TypeTag, key: String, expected: &'static str, found: &'static str },
    #[error("{kind} raised: {failure}")]
    Raised { kind: TypeTag, failure: ValidationFailure },
}

impl ChainError {
    pub fn is_contract(&self) -> bool { matches!(self, ChainError::Contract(_)) }
}

/// Build-time errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("{kind}: unhashable argument at {path}: {reason}")]
    UnhashableArgument { kind: TypeTag, path: String, reason: String },
}

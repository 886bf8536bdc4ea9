//! Runtime error kinds
//!
//! Every failure in the object runtime is a local, recoverable condition
//! reported to the immediate caller. Mutations touch a single table entry,
//! so there is never partial state to roll back.

use std::fmt;

/// Error raised by object runtime operations
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Assignment to a non-writable data property
    NotWritable { name: String },
    /// Delete or incompatible redefinition of a non-configurable property
    NotConfigurable { name: String },
    /// Assignment through an accessor property that has no setter
    NoSetter { name: String },
    /// A prototype chain loops back on itself
    CyclicPrototype,
    /// Super-initialization invoked without the object under construction
    InvalidReceiver,
    /// New property on an object that no longer accepts them
    NotExtensible { name: String },
    /// The root object's prototype can never be reassigned
    ImmutablePrototype,
    /// Chain walk exceeded the configured depth limit
    ChainTooDeep { limit: usize },
    /// Method dispatch resolved a value that is not callable
    NotCallable { name: String },
    /// Object used as a constructor does not carry an initializer or prototype
    NotAConstructor,
    /// Failure raised by a host callable (validation in a setter, ...)
    Host(String),
    /// JSON snapshot could not be produced or parsed
    Json(String),
}

impl RuntimeError {
    /// Build a host error from any message
    pub fn host(msg: impl Into<String>) -> Self {
        RuntimeError::Host(msg.into())
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWritable { name } => {
                write!(f, "TypeError: cannot assign to read only property '{}'", name)
            }
            Self::NotConfigurable { name } => {
                write!(f, "TypeError: property '{}' is not configurable", name)
            }
            Self::NoSetter { name } => {
                write!(f, "TypeError: cannot set property '{}' which has only a getter", name)
            }
            Self::CyclicPrototype => write!(f, "TypeError: cyclic prototype chain"),
            Self::InvalidReceiver => {
                write!(f, "TypeError: super initializer called without a receiver")
            }
            Self::NotExtensible { name } => {
                write!(f, "TypeError: cannot add property '{}', object is not extensible", name)
            }
            Self::ImmutablePrototype => {
                write!(f, "TypeError: the root object's prototype is immutable")
            }
            Self::ChainTooDeep { limit } => {
                write!(f, "RangeError: prototype chain deeper than {} levels", limit)
            }
            Self::NotCallable { name } => write!(f, "TypeError: '{}' is not a function", name),
            Self::NotAConstructor => write!(f, "TypeError: object is not a constructor"),
            Self::Host(msg) => write!(f, "Error: {}", msg),
            Self::Json(msg) => write!(f, "SyntaxError: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

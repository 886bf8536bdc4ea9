//! Runtime support
//!
//! This module contains the core object model:
//! - Descriptors and property tables
//! - Objects, prototype links and the root object
//! - Prototype chain resolution
//! - Constructors, inheritance wiring and mixins
//! - Identity-keyed weak side tables

pub mod chain;
pub mod compose;
pub mod descriptor;
pub mod error;
pub mod function;
pub mod inherit;
pub mod object;
pub mod property;
pub mod weak;

pub use chain::{Chain, DEFAULT_MAX_CHAIN_DEPTH, Resolved};
pub use compose::compose;
pub use descriptor::{PropertyDescriptor, PropertyType, PropertyValue};
pub use error::{RuntimeError, RuntimeResult};
pub use function::{Function, NativeFn};
pub use inherit::{
    Constructor, IDENTITY_KEY, PROTOTYPE_KEY, bind, call_super_method, construct, instance_of,
    super_init,
};
pub use object::{ClassId, ObjectRef, WeakObjectRef, create_root};
pub use property::{Property, PropertyTable, SetOutcome};
pub use weak::{DEFAULT_SWEEP_THRESHOLD, WeakStore};

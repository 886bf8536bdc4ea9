//! protojs - a prototype-based object runtime
//!
//! Objects are property tables linked to a prototype. Reads fall through
//! the prototype chain, writes land on the receiver, and constructors wire
//! instances to shared prototype objects the way classic prototypal
//! inheritance does.
//!
//! # Features
//! - Property descriptors (data and accessor) with writable, enumerable
//!   and configurable flags
//! - Insertion-ordered property tables
//! - Chain resolution with cycle detection and a depth limit
//! - Constructor binding, super-initialization and mixin composition
//! - Identity-keyed weak side tables for private per-object state
//!
//! # Example
//! ```
//! use protojs::{Context, Value};
//!
//! let ctx = Context::new();
//! let shape = ctx
//!     .new_constructor("Shape", 1, |this, args| {
//!         this.set_value("color", args.first().cloned().unwrap_or_default())?;
//!         Ok(Value::Undefined)
//!     })
//!     .unwrap();
//! let s = ctx.construct(&shape, &[Value::from("red")]).unwrap();
//! assert_eq!(ctx.get(&s, "color").unwrap(), Value::from("red"));
//! ```

// Core modules
pub mod context;
pub mod value;

// Built-in objects
pub mod builtins;

// Runtime support
pub mod runtime;

// Re-export main types
pub use context::{Context, ContextOptions, ContextStats};
pub use runtime::{
    Constructor, Function, ObjectRef, PropertyDescriptor, RuntimeError, RuntimeResult,
    WeakObjectRef, WeakStore, create_root,
};
pub use value::Value;

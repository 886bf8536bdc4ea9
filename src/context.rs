//! Object runtime context
//!
//! The Context is the main entry point for embedding the runtime. It holds
//! the root object, the options every chain walk runs under, and a registry
//! of the constructors it created so their back-links can be broken when
//! the context goes away.

use std::cell::RefCell;

use tracing::debug;

use crate::runtime::chain::{Chain, DEFAULT_MAX_CHAIN_DEPTH};
use crate::runtime::descriptor::PropertyDescriptor;
use crate::runtime::error::RuntimeResult;
use crate::runtime::inherit::{self, Constructor};
use crate::runtime::object::{ObjectRef, WeakObjectRef, create_root};
use crate::runtime::weak::{DEFAULT_SWEEP_THRESHOLD, WeakStore};
use crate::value::Value;

/// Tunables for a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Maximum number of objects a chain walk may visit
    pub max_chain_depth: usize,
    /// Insertions between automatic sweeps of weak stores made by the context
    pub sweep_threshold: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl ContextOptions {
    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }
}

/// Object runtime context
pub struct Context {
    /// Root object shared by every chain
    root: ObjectRef,
    options: ContextOptions,
    /// Walk policy derived from the options
    chain: Chain,
    /// Constructors created through this context
    constructors: RefCell<Vec<WeakObjectRef>>,
}

impl Context {
    /// Create a context with default options
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    /// Create a context with the given options
    pub fn with_options(options: ContextOptions) -> Self {
        Context {
            root: create_root(),
            options,
            chain: Chain::with_max_depth(options.max_chain_depth),
            constructors: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Chain walk policy used by this context
    #[inline]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The root object
    #[inline]
    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    /// Create an empty object inheriting from the root
    pub fn new_object(&self) -> ObjectRef {
        ObjectRef::new(Some(&self.root))
    }

    /// Create an empty object with an explicit prototype (or none)
    pub fn create(&self, proto: Option<&ObjectRef>) -> ObjectRef {
        ObjectRef::new(proto)
    }

    /// Create an object inheriting from the root with default data properties
    pub fn new_object_with<'a, I>(&self, props: I) -> RuntimeResult<ObjectRef>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        ObjectRef::with_properties(Some(&self.root), props)
    }

    /// Create a constructor and register it with this context
    ///
    /// When the context drops, each registered constructor still alive is
    /// detached: it keeps constructing, but its prototype loses the
    /// `constructor` back-link.
    pub fn new_constructor<F>(&self, name: &str, arity: u16, init: F) -> RuntimeResult<Constructor>
    where
        F: Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let ctor = Constructor::new(name, arity, init)?;
        let mut registry = self.constructors.borrow_mut();
        registry.retain(WeakObjectRef::is_alive);
        registry.push(ctor.as_object().downgrade());
        Ok(ctor)
    }

    /// Create a weak store that sweeps at the configured threshold
    pub fn new_weak_store<T>(&self) -> WeakStore<T> {
        WeakStore::with_sweep_threshold(self.options.sweep_threshold)
    }

    // Inheritance

    /// Make `child` inherit from `parent`; see [`inherit::bind`]
    pub fn bind(&self, child: &Constructor, parent: &Constructor) -> RuntimeResult<ObjectRef> {
        inherit::bind(child, parent)
    }

    /// Instantiate `ctor`
    pub fn construct(&self, ctor: &Constructor, args: &[Value]) -> RuntimeResult<ObjectRef> {
        inherit::construct(ctor, args)
    }

    pub fn instance_of(&self, node: &ObjectRef, ctor: &Constructor) -> RuntimeResult<bool> {
        self.chain.is_prototype_of(&ctor.prototype()?, node)
    }

    // Chain operations under this context's limits

    pub fn resolve(&self, node: &ObjectRef, name: &str) -> RuntimeResult<Option<PropertyDescriptor>> {
        self.chain.resolve(node, name)
    }

    pub fn enumerate_all(&self, node: &ObjectRef) -> RuntimeResult<Vec<String>> {
        self.chain.enumerate_all(node)
    }

    pub fn has_property(&self, node: &ObjectRef, name: &str) -> RuntimeResult<bool> {
        self.chain.has_property(node, name)
    }

    pub fn get(&self, node: &ObjectRef, name: &str) -> RuntimeResult<Value> {
        self.chain.get(node, name)
    }

    pub fn put(&self, node: &ObjectRef, name: &str, value: Value) -> RuntimeResult<()> {
        self.chain.put(node, name, value)
    }

    pub fn invoke(&self, node: &ObjectRef, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        self.chain.invoke(node, name, args)
    }

    pub fn is_prototype_of(&self, proto: &ObjectRef, node: &ObjectRef) -> RuntimeResult<bool> {
        self.chain.is_prototype_of(proto, node)
    }

    /// Registry statistics
    pub fn stats(&self) -> ContextStats {
        let registry = self.constructors.borrow();
        ContextStats {
            constructors: registry.len(),
            live_constructors: registry.iter().filter(|w| w.is_alive()).count(),
        }
    }

    /// Describe `node`'s chain, one object per line, nearest first
    #[cfg(feature = "dump")]
    pub fn dump(&self, node: &ObjectRef) -> RuntimeResult<String> {
        use std::fmt::Write;

        let mut out = String::new();
        for (depth, current) in self.chain.walk(node).enumerate() {
            let current = current?;
            let _ = writeln!(out, "{:indent$}{:?}", "", current, indent = depth * 2);
        }
        Ok(out)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let registry = std::mem::take(self.constructors.get_mut());
        let mut detached = 0;
        for ctor in registry.iter().filter_map(WeakObjectRef::upgrade) {
            if let Ok(true) = Constructor::from_object(&ctor).and_then(|c| c.detach()) {
                detached += 1;
            }
        }
        debug!(detached, "context dropped");
    }
}

/// Constructor registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    /// Registry entries, dead ones included
    pub constructors: usize,
    /// Constructors still referenced somewhere
    pub live_constructors: usize,
}

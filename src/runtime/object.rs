//! Object representation
//!
//! An object is a property table plus a link to its prototype. Objects are
//! shared through `ObjectRef` handles: any number of children may link to
//! the same prototype, and a prototype lives as long as its longest-lived
//! holder. Links only point from child to prototype, never back.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{error, trace};

use crate::runtime::chain::Chain;
use crate::runtime::descriptor::PropertyDescriptor;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::function::Function;
use crate::runtime::property::{PropertyTable, SetOutcome};
use crate::value::Value;

/// Object class IDs
///
/// These identify the kind of an object and determine which internal data
/// it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId {
    /// Plain object
    Object,
    /// The root object at the top of every chain
    Root,
    /// Constructor (carries an initializer)
    Constructor,
}

/// Class-specific internal data
enum ClassData {
    Ordinary,
    Root,
    Constructor { init: Function },
}

/// Object state behind a handle
struct JSObject {
    /// Class-specific data
    class: ClassData,
    /// Prototype of this object (none for the root and detached objects)
    proto: Option<ObjectRef>,
    /// Own properties
    props: PropertyTable,
    /// Whether new properties may be added
    extensible: bool,
}

impl JSObject {
    fn new(class: ClassData, proto: Option<ObjectRef>) -> Self {
        JSObject {
            class,
            proto,
            props: PropertyTable::new(),
            extensible: true,
        }
    }
}

/// Shared handle to an object
///
/// Cloning the handle shares the object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<JSObject>>);

/// Non-owning handle to an object
///
/// Does not keep the object alive; `upgrade` fails once every `ObjectRef`
/// is gone.
#[derive(Clone)]
pub struct WeakObjectRef(Weak<RefCell<JSObject>>);

thread_local! {
    static ROOT: ObjectRef = ObjectRef::new_root();
}

/// The root object: no prototype, shared by every chain
///
/// Initialized once on first use and never given a prototype afterwards.
/// Object handles are `Rc`-based and never cross threads, so there is one
/// root per thread: every chain built on a thread ends at that thread's
/// root, and objects from two threads can never meet.
pub fn create_root() -> ObjectRef {
    ROOT.with(ObjectRef::clone)
}

impl ObjectRef {
    fn from_object(obj: JSObject) -> Self {
        ObjectRef(Rc::new(RefCell::new(obj)))
    }

    fn new_root() -> Self {
        let root = Self::from_object(JSObject::new(ClassData::Root, None));
        if let Err(err) = crate::builtins::object::install(&root) {
            error!(%err, "failed to install root builtins");
        }
        root
    }

    /// Create an empty object with the given prototype
    pub fn new(proto: Option<&ObjectRef>) -> Self {
        Self::from_object(JSObject::new(ClassData::Ordinary, proto.cloned()))
    }

    /// Create an object pre-populated with default data properties
    pub fn with_properties<'a, I>(proto: Option<&ObjectRef>, props: I) -> RuntimeResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let obj = Self::new(proto);
        for (name, value) in props {
            obj.define_property(name, PropertyDescriptor::data(value))?;
        }
        Ok(obj)
    }

    /// Create a constructor object carrying `init`
    pub(crate) fn new_constructor(init: Function, proto: Option<&ObjectRef>) -> Self {
        Self::from_object(JSObject::new(
            ClassData::Constructor { init },
            proto.cloned(),
        ))
    }

    /// Identity of the object, stable for its lifetime
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check if two handles refer to the same object
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    /// Get class ID
    pub fn class_id(&self) -> ClassId {
        match self.0.borrow().class {
            ClassData::Ordinary => ClassId::Object,
            ClassData::Root => ClassId::Root,
            ClassData::Constructor { .. } => ClassId::Constructor,
        }
    }

    /// Check if this is the root object
    #[inline]
    pub fn is_root(&self) -> bool {
        self.class_id() == ClassId::Root
    }

    /// Initializer of a constructor object
    pub fn constructor_init(&self) -> Option<Function> {
        match &self.0.borrow().class {
            ClassData::Constructor { init } => Some(init.clone()),
            _ => None,
        }
    }

    // Prototype link

    /// Get the prototype (one level up)
    pub fn get_prototype_of(&self) -> Option<ObjectRef> {
        self.0.borrow().proto.clone()
    }

    /// Relink this object to a new prototype
    ///
    /// Fails with `CyclicPrototype` if `proto` is this object or inherits
    /// from it, and with `ImmutablePrototype` on the root.
    pub fn set_prototype_of(&self, proto: Option<&ObjectRef>) -> RuntimeResult<()> {
        let current = self.get_prototype_of();
        let unchanged = match (&current, proto) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if self.is_root() {
            return Err(RuntimeError::ImmutablePrototype);
        }
        if !self.is_extensible() {
            return Err(RuntimeError::NotExtensible {
                name: "__proto__".to_string(),
            });
        }
        if let Some(proto) = proto {
            for node in Chain::default().walk(proto) {
                if node?.ptr_eq(self) {
                    trace!(object = self.id(), "refused cyclic prototype link");
                    return Err(RuntimeError::CyclicPrototype);
                }
            }
        }
        trace!(object = self.id(), proto = ?proto.map(ObjectRef::id), "prototype relinked");
        self.0.borrow_mut().proto = proto.cloned();
        Ok(())
    }

    /// Link a prototype without any checks
    #[cfg(test)]
    pub(crate) fn force_prototype(&self, proto: Option<&ObjectRef>) {
        self.0.borrow_mut().proto = proto.cloned();
    }

    // Own properties

    /// Check if `name` is an own property (no traversal)
    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().props.has(name)
    }

    /// Copy of an own property's descriptor
    pub fn get_own_property_descriptor(&self, name: &str) -> Option<PropertyDescriptor> {
        self.0.borrow().props.get(name).cloned()
    }

    /// Stored value of an own data property
    ///
    /// Accessors are not invoked; use `chain::get` for full read semantics.
    pub fn get_own_value(&self, name: &str) -> Option<Value> {
        self.0.borrow().props.get(name)?.value().cloned()
    }

    /// Define or redefine an own property
    pub fn define_property(&self, name: &str, descriptor: PropertyDescriptor) -> RuntimeResult<()> {
        let mut obj = self.0.borrow_mut();
        if !obj.extensible && !obj.props.has(name) {
            return Err(RuntimeError::NotExtensible { name: name.to_string() });
        }
        obj.props.define(name, descriptor)?;
        Ok(())
    }

    /// Assign to an own property
    ///
    /// Updates a data property in place, runs the setter of an accessor
    /// with this object as receiver, or adds a default data property when
    /// the name is missing.
    pub fn set_value(&self, name: &str, value: Value) -> RuntimeResult<()> {
        // The borrow ends before any setter runs, so setters may touch
        // this object again.
        let outcome = self.0.borrow_mut().props.set_value(name, value.clone())?;
        match outcome {
            SetOutcome::Stored => Ok(()),
            SetOutcome::CallSetter(setter) => {
                setter.call(self, &[value])?;
                Ok(())
            }
            SetOutcome::Missing => self.define_property(name, PropertyDescriptor::data(value)),
        }
    }

    /// Delete an own property
    ///
    /// Returns true if the property existed.
    pub fn delete(&self, name: &str) -> RuntimeResult<bool> {
        self.0.borrow_mut().props.delete(name)
    }

    /// All own property names in insertion order
    pub fn own_keys(&self) -> Vec<String> {
        self.0.borrow().props.own_keys().map(String::from).collect()
    }

    /// Enumerable own property names in insertion order
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        self.0
            .borrow()
            .props
            .own_enumerable_keys()
            .map(String::from)
            .collect()
    }

    /// Number of own properties
    pub fn own_len(&self) -> usize {
        self.0.borrow().props.len()
    }

    /// Run `f` against the own property table
    ///
    /// `f` must not call back into this object mutably.
    pub fn with_props<R>(&self, f: impl FnOnce(&PropertyTable) -> R) -> R {
        f(&self.0.borrow().props)
    }

    // Integrity levels

    /// Stop accepting new properties
    pub fn prevent_extensions(&self) {
        self.0.borrow_mut().extensible = false;
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.0.borrow().extensible
    }

    /// Make every own property non-configurable and stop extensions
    pub fn seal(&self) {
        let mut obj = self.0.borrow_mut();
        obj.extensible = false;
        for prop in obj.props.iter_mut() {
            prop.descriptor = prop.descriptor.clone().configurable(false);
        }
    }

    /// Seal, and additionally make every data property read-only
    pub fn freeze(&self) {
        let mut obj = self.0.borrow_mut();
        obj.extensible = false;
        for prop in obj.props.iter_mut() {
            prop.descriptor = prop.descriptor.clone().configurable(false).writable(false);
        }
    }

    pub fn is_sealed(&self) -> bool {
        let obj = self.0.borrow();
        !obj.extensible && obj.props.iter().all(|p| !p.descriptor.is_configurable())
    }

    pub fn is_frozen(&self) -> bool {
        let obj = self.0.borrow();
        !obj.extensible
            && obj
                .props
                .iter()
                .all(|p| !p.descriptor.is_configurable() && !p.descriptor.is_writable())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(obj) => {
                let class = match obj.class {
                    ClassData::Ordinary => "Object",
                    ClassData::Root => "Root",
                    ClassData::Constructor { .. } => "Constructor",
                };
                write!(f, "{}@{:#x} {{", class, self.id())?;
                for (i, key) in obj.props.own_keys().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}", key)?;
                }
                write!(f, " }}")
            }
            Err(_) => write!(f, "Object@{:#x} <borrowed>", self.id()),
        }
    }
}

impl WeakObjectRef {
    /// Recover a strong handle if the object is still alive
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Identity of the referenced object (valid even after it died)
    #[inline]
    pub fn id(&self) -> usize {
        self.0.as_ptr() as *const () as usize
    }

    /// Check if the object is still alive
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObjectRef({:#x}, alive: {})", self.id(), self.is_alive())
    }
}

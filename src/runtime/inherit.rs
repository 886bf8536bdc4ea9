//! Constructors and inheritance wiring
//!
//! A constructor is an object carrying an initializer and a `prototype`
//! property. Instances link to that prototype object, and the prototype
//! points back at its constructor through the identity property.
//!
//! `bind` rewires a child constructor to inherit from a parent by replacing
//! the child's prototype object wholesale. Replacing it would lose the
//! identity back-link, so `bind` restores it before the new prototype is
//! published.

use tracing::debug;

use crate::runtime::chain::Chain;
use crate::runtime::descriptor::PropertyDescriptor;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::function::Function;
use crate::runtime::object::{ClassId, ObjectRef, create_root};
use crate::value::Value;

/// Name of the identity property on prototype objects
pub const IDENTITY_KEY: &str = "constructor";

/// Name of the property holding a constructor's prototype object
pub const PROTOTYPE_KEY: &str = "prototype";

/// Handle to a constructor object
#[derive(Clone, Debug, PartialEq)]
pub struct Constructor(ObjectRef);

impl Constructor {
    /// Create a constructor whose instances inherit from a fresh prototype
    /// object, itself inheriting from the root
    ///
    /// `init` runs with the instance under construction as receiver. The
    /// constructor and its prototype hold each other; call
    /// [`detach`](Self::detach) once the constructor is no longer needed or
    /// build it through a `Context`, which detaches on drop.
    pub fn new<F>(name: &str, arity: u16, init: F) -> RuntimeResult<Self>
    where
        F: Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let root = create_root();
        let ctor = ObjectRef::new_constructor(Function::new(name, arity, init), Some(&root));
        ctor.define_property(
            "name",
            PropertyDescriptor::data(Value::from(name))
                .writable(false)
                .enumerable(false),
        )?;

        let prototype = ObjectRef::new(Some(&root));
        prototype.define_property(IDENTITY_KEY, identity_descriptor(&ctor))?;
        ctor.define_property(
            PROTOTYPE_KEY,
            PropertyDescriptor::data(Value::from(prototype))
                .enumerable(false)
                .configurable(false),
        )?;
        Ok(Constructor(ctor))
    }

    /// View an object as a constructor
    pub fn from_object(obj: &ObjectRef) -> RuntimeResult<Self> {
        if obj.class_id() != ClassId::Constructor {
            return Err(RuntimeError::NotAConstructor);
        }
        Ok(Constructor(obj.clone()))
    }

    /// The constructor as an object (static members live here)
    #[inline]
    pub fn as_object(&self) -> &ObjectRef {
        &self.0
    }

    /// Constructor name
    pub fn name(&self) -> String {
        self.initializer()
            .map(|f| f.name().to_string())
            .unwrap_or_default()
    }

    /// The initializer callable
    pub fn initializer(&self) -> RuntimeResult<Function> {
        self.0.constructor_init().ok_or(RuntimeError::NotAConstructor)
    }

    /// Current prototype object
    pub fn prototype(&self) -> RuntimeResult<ObjectRef> {
        match self.0.get_own_value(PROTOTYPE_KEY) {
            Some(Value::Object(proto)) => Ok(proto),
            _ => Err(RuntimeError::NotAConstructor),
        }
    }

    /// Define a method on the prototype, shared by every instance
    ///
    /// Methods are non-enumerable, like class methods.
    pub fn define_method<F>(&self, name: &str, arity: u16, method: F) -> RuntimeResult<Function>
    where
        F: Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let method = Function::new(name, arity, method);
        self.prototype()?.define_property(
            name,
            PropertyDescriptor::data(Value::from(method.clone())).enumerable(false),
        )?;
        Ok(method)
    }

    /// Define a static member on the constructor itself
    pub fn define_static<F>(&self, name: &str, arity: u16, method: F) -> RuntimeResult<Function>
    where
        F: Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        let method = Function::new(name, arity, method);
        self.0.define_property(
            name,
            PropertyDescriptor::data(Value::from(method.clone())).enumerable(false),
        )?;
        Ok(method)
    }

    /// Break the constructor/prototype back-link so both can be freed
    ///
    /// A constructor and its prototype reference each other through
    /// `prototype` and `constructor`, so neither is released until one side
    /// is cut. Only the prototype's `constructor` entry is removed, and only
    /// when it still points at this constructor: `prototype`, `name` and
    /// statics stay, and `construct` keeps working. Afterwards `constructor`
    /// read through an instance falls back to whatever the chain provides.
    ///
    /// Returns whether a back-link was removed.
    pub fn detach(&self) -> RuntimeResult<bool> {
        let proto = self.prototype()?;
        match proto.get_own_value(IDENTITY_KEY) {
            Some(Value::Object(owner)) if owner.ptr_eq(&self.0) => proto.delete(IDENTITY_KEY),
            _ => Ok(false),
        }
    }
}

impl From<Constructor> for Value {
    fn from(ctor: Constructor) -> Self {
        Value::Object(ctor.0)
    }
}

/// Identity property: non-enumerable, writable, configurable
fn identity_descriptor(ctor: &ObjectRef) -> PropertyDescriptor {
    PropertyDescriptor::data(Value::from(ctor.clone())).enumerable(false)
}

/// Make `child` inherit from `parent`
///
/// Creates a fresh empty prototype object linked to the parent's current
/// prototype, gives it the identity property pointing at `child`, and
/// installs it as `child`'s prototype. The fresh object is returned so the
/// caller can add child-specific methods; anything added to the old
/// prototype object before this call is discarded.
pub fn bind(child: &Constructor, parent: &Constructor) -> RuntimeResult<ObjectRef> {
    let parent_proto = parent.prototype()?;
    let fresh = ObjectRef::new(Some(&parent_proto));
    fresh.define_property(IDENTITY_KEY, identity_descriptor(child.as_object()))?;
    child
        .as_object()
        .set_value(PROTOTYPE_KEY, Value::from(fresh.clone()))?;
    debug!(
        child = %child.name(),
        parent = %parent.name(),
        "prototype rebound"
    );
    Ok(fresh)
}

/// Run the parent's initializer against the object under construction
///
/// The receiver must be the very object the child initializer is
/// populating, so the parent's properties land on it.
pub fn super_init(
    parent: &Constructor,
    receiver: Option<&ObjectRef>,
    args: &[Value],
) -> RuntimeResult<()> {
    let receiver = receiver.ok_or(RuntimeError::InvalidReceiver)?;
    parent.initializer()?.call(receiver, args)?;
    Ok(())
}

/// Allocate an instance of `ctor` and run its initializer on it
pub fn construct(ctor: &Constructor, args: &[Value]) -> RuntimeResult<ObjectRef> {
    let instance = ObjectRef::new(Some(&ctor.prototype()?));
    ctor.initializer()?.call(&instance, args)?;
    Ok(instance)
}

/// Call the parent prototype's version of a method on `receiver`
///
/// Used by overriding methods that extend rather than replace the
/// inherited behavior.
pub fn call_super_method(
    parent: &Constructor,
    name: &str,
    receiver: &ObjectRef,
    args: &[Value],
) -> RuntimeResult<Value> {
    match Chain::default().get(&parent.prototype()?, name)? {
        Value::Function(method) => method.call(receiver, args),
        _ => Err(RuntimeError::NotCallable { name: name.to_string() }),
    }
}

/// Whether `node` was built by `ctor` or one of its descendants
pub fn instance_of(node: &ObjectRef, ctor: &Constructor) -> RuntimeResult<bool> {
    Chain::default().is_prototype_of(&ctor.prototype()?, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::chain::{enumerate_all, get, invoke, resolve};

    fn shape() -> Constructor {
        Constructor::new("Shape", 1, |this, args| {
            this.set_value("color", args.first().cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        })
        .unwrap()
    }

    fn identity_of(proto: &ObjectRef) -> Option<ObjectRef> {
        proto
            .get_own_value(IDENTITY_KEY)
            .and_then(|v| v.as_object().cloned())
    }

    #[test]
    fn test_new_constructor_wiring() {
        let shape = shape();
        let proto = shape.prototype().unwrap();

        assert!(identity_of(&proto).unwrap().ptr_eq(shape.as_object()));
        assert!(proto.get_prototype_of().unwrap().ptr_eq(&create_root()));
        assert!(!proto.get_own_property_descriptor(IDENTITY_KEY).unwrap().is_enumerable());
        assert_eq!(shape.name(), "Shape");

        let desc = shape.as_object().get_own_property_descriptor(PROTOTYPE_KEY).unwrap();
        assert!(desc.is_writable());
        assert!(!desc.is_configurable());
    }

    #[test]
    fn test_construct() {
        let shape = shape();
        let s = construct(&shape, &[Value::from("red")]).unwrap();

        assert_eq!(s.get_own_value("color"), Some(Value::from("red")));
        assert!(s.get_prototype_of().unwrap().ptr_eq(&shape.prototype().unwrap()));
        assert!(instance_of(&s, &shape).unwrap());

        let ident = get(&s, IDENTITY_KEY).unwrap();
        assert_eq!(ident, Value::from(shape.clone()));
    }

    #[test]
    fn test_bind_restores_identity() {
        let shape = shape();
        let circle = Constructor::new("Circle", 1, |_, _| Ok(Value::Undefined)).unwrap();
        let old_proto = circle.prototype().unwrap();

        let fresh = bind(&circle, &shape).unwrap();

        assert!(!fresh.ptr_eq(&old_proto));
        assert!(circle.prototype().unwrap().ptr_eq(&fresh));
        assert!(fresh.get_prototype_of().unwrap().ptr_eq(&shape.prototype().unwrap()));
        assert!(identity_of(&fresh).unwrap().ptr_eq(circle.as_object()));

        let desc = fresh.get_own_property_descriptor(IDENTITY_KEY).unwrap();
        assert!(desc.is_writable() && desc.is_configurable() && !desc.is_enumerable());
        assert_eq!(fresh.own_keys(), [IDENTITY_KEY]);
    }

    #[test]
    fn test_bind_discards_earlier_methods() {
        let shape = shape();
        let circle = Constructor::new("Circle", 1, |_, _| Ok(Value::Undefined)).unwrap();
        circle
            .define_method("draw", 0, |_, _| Ok(Value::from("draw")))
            .unwrap();

        bind(&circle, &shape).unwrap();
        let c = construct(&circle, &[]).unwrap();
        assert!(resolve(&c, "draw").unwrap().is_none());

        // Methods added after binding are kept
        circle
            .define_method("draw", 0, |_, _| Ok(Value::from("draw")))
            .unwrap();
        assert_eq!(invoke(&c, "draw", &[]).unwrap(), Value::from("draw"));
    }

    #[test]
    fn test_super_init_populates_receiver() {
        let shape = shape();
        let parent = shape.clone();
        let circle = Constructor::new("Circle", 2, move |this, args| {
            super_init(&parent, Some(this), &args[..1.min(args.len())])?;
            this.set_value("radius", args.get(1).cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        })
        .unwrap();
        bind(&circle, &shape).unwrap();

        let c = construct(&circle, &[Value::from("red"), Value::from(1)]).unwrap();
        assert_eq!(c.own_keys(), ["color", "radius"]);
        assert!(instance_of(&c, &circle).unwrap());
        assert!(instance_of(&c, &shape).unwrap());
        assert_eq!(enumerate_all(&c).unwrap(), ["color", "radius"]);
    }

    #[test]
    fn test_super_init_without_receiver() {
        let shape = shape();
        assert_eq!(
            super_init(&shape, None, &[Value::from("red")]),
            Err(RuntimeError::InvalidReceiver)
        );
    }

    #[test]
    fn test_call_super_method() {
        let shape = shape();
        shape
            .define_method("duplicate", 0, |this, _| {
                let color = this.get_own_value("color").unwrap_or_default();
                Ok(Value::from(format!("duplicate {}", color)))
            })
            .unwrap();

        let circle = Constructor::new("Circle", 0, |_, _| Ok(Value::Undefined)).unwrap();
        bind(&circle, &shape).unwrap();
        let parent = shape.clone();
        circle
            .define_method("duplicate", 0, move |this, _| {
                let base = call_super_method(&parent, "duplicate", this, &[])?;
                Ok(Value::from(format!("{} circle", base)))
            })
            .unwrap();

        let c = construct(&circle, &[]).unwrap();
        c.set_value("color", Value::from("blue")).unwrap();
        assert_eq!(
            invoke(&c, "duplicate", &[]).unwrap(),
            Value::from("duplicate blue circle")
        );
    }

    #[test]
    fn test_static_member() {
        let circle = Constructor::new("Circle", 1, |this, args| {
            this.set_value("radius", args.first().cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        })
        .unwrap();
        circle
            .define_static("unit", 0, |ctor, _| {
                let ctor = Constructor::from_object(ctor)?;
                Ok(Value::from(construct(&ctor, &[Value::from(1)])?))
            })
            .unwrap();

        let unit = invoke(circle.as_object(), "unit", &[]).unwrap();
        let unit = unit.as_object().unwrap();
        assert_eq!(unit.get_own_value("radius"), Some(Value::from(1)));
        assert!(!circle.prototype().unwrap().has_own("unit"));
    }

    #[test]
    fn test_from_object_rejects_plain() {
        assert_eq!(
            Constructor::from_object(&ObjectRef::new(None)),
            Err(RuntimeError::NotAConstructor)
        );
    }

    #[test]
    fn test_detach_breaks_back_link() {
        let shape = shape();
        let proto = shape.prototype().unwrap();
        let weak = shape.as_object().downgrade();

        assert!(shape.detach().unwrap());
        drop(shape);
        assert!(!weak.is_alive());
        assert!(!proto.has_own(IDENTITY_KEY));
    }

    #[test]
    fn test_undetached_constructor_stays_alive() {
        let weak = shape().as_object().downgrade();
        assert!(weak.is_alive());

        let ctor = Constructor::from_object(&weak.upgrade().unwrap()).unwrap();
        assert!(ctor.detach().unwrap());
        drop(ctor);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_detached_constructor_still_constructs() {
        let shape = shape();
        shape
            .define_static("unit", 0, |_, _| Ok(Value::from(1)))
            .unwrap();
        assert!(shape.detach().unwrap());
        assert!(!shape.detach().unwrap());

        let s = construct(&shape, &[Value::from("red")]).unwrap();
        assert_eq!(s.get_own_value("color"), Some(Value::from("red")));
        assert!(instance_of(&s, &shape).unwrap());
        assert_eq!(shape.as_object().get_own_value("name"), Some(Value::from("Shape")));
        assert!(shape.as_object().has_own("unit"));
        assert_eq!(get(&s, IDENTITY_KEY).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_detach_skips_foreign_identity() {
        let shape = shape();
        let proto = shape.prototype().unwrap();
        proto.set_value(IDENTITY_KEY, Value::from("other")).unwrap();
        assert!(!shape.detach().unwrap());
        assert_eq!(proto.get_own_value(IDENTITY_KEY), Some(Value::from("other")));
    }
}

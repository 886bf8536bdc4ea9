//! Methods on the root object
//!
//! Every chain ends at the root, so these are reachable from any object
//! through ordinary resolution. All of them are non-enumerable.

use crate::runtime::chain::Chain;
use crate::runtime::descriptor::PropertyDescriptor;
use crate::runtime::error::RuntimeResult;
use crate::runtime::function::Function;
use crate::runtime::object::ObjectRef;
use crate::value::Value;

/// Text returned by the root `toString`
pub const OBJECT_TAG: &str = "[object Object]";

fn name_arg(args: &[Value]) -> String {
    match args.first() {
        Some(Value::String(s)) => s.to_string(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}

/// `hasOwnProperty(name)`
fn has_own_property(this: &ObjectRef, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Bool(this.has_own(&name_arg(args))))
}

/// `propertyIsEnumerable(name)`: own and enumerable
fn property_is_enumerable(this: &ObjectRef, args: &[Value]) -> RuntimeResult<Value> {
    let enumerable = this
        .get_own_property_descriptor(&name_arg(args))
        .is_some_and(|d| d.is_enumerable());
    Ok(Value::Bool(enumerable))
}

/// `isPrototypeOf(node)`
fn is_prototype_of(this: &ObjectRef, args: &[Value]) -> RuntimeResult<Value> {
    match args.first() {
        Some(Value::Object(node)) => Ok(Value::Bool(Chain::default().is_prototype_of(this, node)?)),
        _ => Ok(Value::Bool(false)),
    }
}

fn to_string(_this: &ObjectRef, _args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::from(OBJECT_TAG))
}

/// Install the root methods
///
/// Runs while the root is being created, so it must not call `create_root`.
pub(crate) fn install(root: &ObjectRef) -> RuntimeResult<()> {
    let methods: [(&str, u16, fn(&ObjectRef, &[Value]) -> RuntimeResult<Value>); 4] = [
        ("hasOwnProperty", 1, has_own_property),
        ("propertyIsEnumerable", 1, property_is_enumerable),
        ("isPrototypeOf", 1, is_prototype_of),
        ("toString", 0, to_string),
    ];
    for (name, arity, method) in methods {
        let f = Function::new(name, arity, method);
        root.define_property(name, PropertyDescriptor::data(Value::from(f)).enumerable(false))?;
    }
    Ok(())
}

/// Whether the nearest definition of `name` on `node`'s chain lives on the root
pub fn is_builtin(node: &ObjectRef, name: &str) -> RuntimeResult<bool> {
    let Some(found) = Chain::default().resolve_holder(node, name)? else {
        return Ok(false);
    };
    Ok(found.holder.is_root())
}

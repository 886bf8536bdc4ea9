//! Host callables
//!
//! The runtime never looks inside a method body. Methods, getters, setters
//! and initializers are opaque host closures that always receive the
//! receiver object explicitly, so there is no way to call one with a lost
//! or rebound `this`.

use std::fmt;
use std::rc::Rc;

use crate::runtime::error::RuntimeResult;
use crate::runtime::object::ObjectRef;
use crate::value::Value;

/// Native function signature: receiver and arguments in, value out
pub type NativeFn = dyn Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value>;

struct FunctionData {
    /// Function name (for debugging and display)
    name: Rc<str>,
    /// Declared number of arguments
    arity: u16,
    /// The host closure
    call: Box<NativeFn>,
}

/// Shared handle to a host callable
///
/// Cloning shares the same callable; identity is preserved, which is what
/// lets one method on a prototype serve every instance.
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

impl Function {
    /// Wrap a host closure
    pub fn new<F>(name: &str, arity: u16, call: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        Function(Rc::new(FunctionData {
            name: Rc::from(name),
            arity,
            call: Box::new(call),
        }))
    }

    /// Function name
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared number of arguments
    #[inline]
    pub fn arity(&self) -> u16 {
        self.0.arity
    }

    /// Invoke with an explicit receiver
    pub fn call(&self, this: &ObjectRef, args: &[Value]) -> RuntimeResult<Value> {
        (self.0.call)(this, args)
    }

    /// Check if two handles refer to the same callable
    #[inline]
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_with_receiver() {
        let get_radius = Function::new("getRadius", 0, |this, _args| {
            Ok(this.get_own_value("radius").unwrap_or_default())
        });
        let circle = ObjectRef::new(None);
        circle.set_value("radius", Value::from(3)).unwrap();

        assert_eq!(get_radius.name(), "getRadius");
        assert_eq!(get_radius.arity(), 0);
        assert_eq!(get_radius.call(&circle, &[]).unwrap(), Value::from(3));
    }

    #[test]
    fn test_identity() {
        let f = Function::new("draw", 0, |_, _| Ok(Value::Undefined));
        let g = Function::new("draw", 0, |_, _| Ok(Value::Undefined));
        assert!(f.ptr_eq(&f.clone()));
        assert!(!f.ptr_eq(&g));
        assert_eq!(format!("{:?}", f), "[Function: draw]");
    }
}

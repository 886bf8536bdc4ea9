//! Mixin composition
//!
//! `compose` copies the own enumerable descriptors of each source onto a
//! target, left to right, so a later source overwrites an earlier one. Each
//! copy goes through the same `define` rules as any other definition, so a
//! non-configurable property on the target cannot be clobbered.

use tracing::debug;

use crate::runtime::descriptor::PropertyDescriptor;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::ObjectRef;

/// Snapshot of a source's own enumerable descriptors, in insertion order
fn enumerable_descriptors(source: &ObjectRef) -> Vec<(String, PropertyDescriptor)> {
    source.with_props(|props| {
        props
            .iter()
            .filter(|p| p.descriptor.is_enumerable())
            .map(|p| (p.key.to_string(), p.descriptor.clone()))
            .collect()
    })
}

/// Copy every source's own enumerable descriptors onto `target`
///
/// Accessors are copied as accessors, not evaluated. Either every copy
/// succeeds or the target is left untouched. Returns the number of
/// descriptors copied.
pub fn compose(target: &ObjectRef, sources: &[&ObjectRef]) -> RuntimeResult<usize> {
    // Snapshot first: a source may be the target itself.
    let copies: Vec<_> = sources
        .iter()
        .flat_map(|source| enumerable_descriptors(source))
        .collect();

    // Dry run against a copy of the target's table
    let mut staged = target.with_props(|props| props.clone());
    let extensible = target.is_extensible();
    for (name, descriptor) in &copies {
        if !extensible && !staged.has(name) {
            return Err(RuntimeError::NotExtensible { name: name.clone() });
        }
        staged.define(name, descriptor.clone())?;
    }

    for (name, descriptor) in &copies {
        target.define_property(name, descriptor.clone())?;
    }
    debug!(
        object = target.id(),
        sources = sources.len(),
        copied = copies.len(),
        "composed mixins"
    );
    Ok(copies.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::chain::invoke;
    use crate::runtime::function::Function;
    use crate::runtime::object::create_root;
    use crate::value::Value;

    fn mixin(method: &'static str) -> ObjectRef {
        let obj = ObjectRef::new(Some(&create_root()));
        let f = Function::new(method, 0, move |_, _| Ok(Value::from(method)));
        obj.set_value(method, Value::from(f)).unwrap();
        obj
    }

    #[test]
    fn test_compose_copies_methods() {
        let can_eat = mixin("eat");
        let can_walk = mixin("walk");
        let person = ObjectRef::new(Some(&create_root()));

        assert_eq!(compose(&person, &[&can_eat, &can_walk]).unwrap(), 2);
        assert_eq!(person.own_keys(), ["eat", "walk"]);
        assert_eq!(invoke(&person, "eat", &[]).unwrap(), Value::from("eat"));
        assert_eq!(invoke(&person, "walk", &[]).unwrap(), Value::from("walk"));
    }

    #[test]
    fn test_later_source_wins() {
        let a = ObjectRef::with_properties(None, [("kind", Value::from("a"))]).unwrap();
        let b = ObjectRef::with_properties(None, [("kind", Value::from("b"))]).unwrap();
        let target = ObjectRef::new(None);

        compose(&target, &[&a, &b]).unwrap();
        assert_eq!(target.get_own_value("kind"), Some(Value::from("b")));
    }

    #[test]
    fn test_skips_non_enumerable() {
        let source = ObjectRef::with_properties(None, [("shown", Value::from(1))]).unwrap();
        source
            .define_property("hidden", PropertyDescriptor::data(Value::from(2)).enumerable(false))
            .unwrap();
        let target = ObjectRef::new(None);

        compose(&target, &[&source]).unwrap();
        assert_eq!(target.own_keys(), ["shown"]);
    }

    #[test]
    fn test_accessor_copied_not_evaluated() {
        let getter = Function::new("get", 0, |this, _| {
            Ok(this.get_own_value("radius").unwrap_or_default())
        });
        let source = ObjectRef::new(None);
        source
            .define_property("size", PropertyDescriptor::getter(getter))
            .unwrap();
        let target = ObjectRef::with_properties(None, [("radius", Value::from(3))]).unwrap();

        compose(&target, &[&source]).unwrap();
        let desc = target.get_own_property_descriptor("size").unwrap();
        assert!(desc.is_accessor());
        assert_eq!(
            crate::runtime::chain::get(&target, "size").unwrap(),
            Value::from(3)
        );
    }

    #[test]
    fn test_collision_leaves_target_untouched() {
        let target = ObjectRef::new(None);
        target
            .define_property("id", PropertyDescriptor::data(Value::from(1)).configurable(false))
            .unwrap();
        let a = ObjectRef::with_properties(None, [("name", Value::from("x"))]).unwrap();
        let b = ObjectRef::with_properties(None, [("id", Value::from(2))]).unwrap();

        let err = compose(&target, &[&a, &b]).unwrap_err();
        assert_eq!(err, RuntimeError::NotConfigurable { name: "id".into() });
        assert_eq!(target.own_keys(), ["id"]);
        assert_eq!(target.get_own_value("id"), Some(Value::from(1)));
    }

    #[test]
    fn test_non_extensible_target() {
        let target = ObjectRef::new(None);
        target.prevent_extensions();
        let source = mixin("eat");
        assert!(matches!(
            compose(&target, &[&source]),
            Err(RuntimeError::NotExtensible { .. })
        ));
    }

    #[test]
    fn test_compose_into_self() {
        let obj = ObjectRef::with_properties(None, [("a", Value::from(1))]).unwrap();
        assert_eq!(compose(&obj, &[&obj]).unwrap(), 1);
        assert_eq!(obj.own_keys(), ["a"]);
    }
}

//! Prototype chain resolution
//!
//! Property reads and method dispatch look at the object's own table first
//! and then walk up the prototype links until a hit or the end of the
//! chain. Walks are O(depth) and detect loops with Brent's algorithm, so a
//! corrupted chain fails with `CyclicPrototype` instead of spinning.

use ahash::AHashSet;
use tracing::debug;

use crate::runtime::descriptor::{PropertyDescriptor, PropertyValue};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::ObjectRef;
use crate::value::Value;

/// Default limit on the number of objects a single walk may visit
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10_000;

/// Chain walking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chain {
    max_depth: usize,
}

impl Default for Chain {
    fn default() -> Self {
        Chain {
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

/// A property found on the chain together with the object that owns it
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Object whose own table holds the property
    pub holder: ObjectRef,
    /// The property's descriptor
    pub descriptor: PropertyDescriptor,
}

/// Iterator over an object and its ancestors, nearest first
///
/// Yields `Err` once and then stops if the chain loops or exceeds the depth
/// limit.
pub struct ChainWalk {
    next: Option<ObjectRef>,
    /// Brent's cycle detection: saved node, current power and step count
    saved: Option<ObjectRef>,
    power: usize,
    lam: usize,
    visited: usize,
    max_depth: usize,
    done: bool,
}

impl Iterator for ChainWalk {
    type Item = RuntimeResult<ObjectRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(current) = self.next.take() else {
            self.done = true;
            return None;
        };

        if self.saved.as_ref().is_some_and(|s| s.ptr_eq(&current)) {
            debug!(object = current.id(), "cycle detected in prototype chain");
            self.done = true;
            return Some(Err(RuntimeError::CyclicPrototype));
        }

        self.visited += 1;
        if self.visited > self.max_depth {
            self.done = true;
            return Some(Err(RuntimeError::ChainTooDeep {
                limit: self.max_depth,
            }));
        }

        self.lam += 1;
        if self.lam == self.power {
            self.saved = Some(current.clone());
            self.power *= 2;
            self.lam = 0;
        }

        self.next = current.get_prototype_of();
        Some(Ok(current))
    }
}

impl Chain {
    /// Chain policy with a custom depth limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Chain {
            max_depth: max_depth.max(1),
        }
    }

    /// Depth limit of this policy
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Walk `node` and its ancestors
    pub fn walk(&self, node: &ObjectRef) -> ChainWalk {
        ChainWalk {
            next: Some(node.clone()),
            saved: None,
            power: 1,
            lam: 0,
            visited: 0,
            max_depth: self.max_depth,
            done: false,
        }
    }

    /// Find the nearest definition of `name`, with its holder
    pub fn resolve_holder(&self, node: &ObjectRef, name: &str) -> RuntimeResult<Option<Resolved>> {
        for current in self.walk(node) {
            let current = current?;
            if let Some(descriptor) = current.get_own_property_descriptor(name) {
                return Ok(Some(Resolved {
                    holder: current,
                    descriptor,
                }));
            }
        }
        Ok(None)
    }

    /// Find the nearest definition of `name`
    pub fn resolve(&self, node: &ObjectRef, name: &str) -> RuntimeResult<Option<PropertyDescriptor>> {
        Ok(self.resolve_holder(node, name)?.map(|r| r.descriptor))
    }

    /// Every enumerable name visible from `node`, for-in order
    ///
    /// Own keys first in insertion order, then each ancestor's keys in
    /// chain order. A name is decided by its nearest definition: if that
    /// one is non-enumerable the name is skipped even when an ancestor's
    /// copy is enumerable.
    pub fn enumerate_all(&self, node: &ObjectRef) -> RuntimeResult<Vec<String>> {
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut keys = Vec::new();

        for current in self.walk(node) {
            let current = current?;
            current.with_props(|props| {
                for prop in props.iter() {
                    if seen.contains(&*prop.key) {
                        continue;
                    }
                    seen.insert(prop.key.to_string());
                    if prop.descriptor.is_enumerable() {
                        keys.push(prop.key.to_string());
                    }
                }
            });
        }

        Ok(keys)
    }

    /// Whether `name` is visible anywhere on the chain (the `in` check)
    pub fn has_property(&self, node: &ObjectRef, name: &str) -> RuntimeResult<bool> {
        Ok(self.resolve_holder(node, name)?.is_some())
    }

    /// Read `name` through the chain
    ///
    /// Getters run with `node` (not the holder) as receiver. Missing
    /// properties and getter-less accessors read as undefined.
    pub fn get(&self, node: &ObjectRef, name: &str) -> RuntimeResult<Value> {
        let Some(found) = self.resolve_holder(node, name)? else {
            return Ok(Value::Undefined);
        };
        match found.descriptor.payload() {
            PropertyValue::Data { value, .. } => Ok(value.clone()),
            PropertyValue::GetSet { getter: Some(getter), .. } => getter.call(node, &[]),
            PropertyValue::GetSet { getter: None, .. } => Ok(Value::Undefined),
        }
    }

    /// Assign `name` on `node` with chain-aware semantics
    ///
    /// - own property: updated in place (or its setter runs)
    /// - inherited accessor: its setter runs with `node` as receiver
    /// - inherited read-only data: `NotWritable`
    /// - otherwise: a new own data property shadows any inherited one
    pub fn put(&self, node: &ObjectRef, name: &str, value: Value) -> RuntimeResult<()> {
        let Some(found) = self.resolve_holder(node, name)? else {
            return node.define_property(name, PropertyDescriptor::data(value));
        };
        if found.holder.ptr_eq(node) {
            return node.set_value(name, value);
        }
        match found.descriptor.payload() {
            PropertyValue::GetSet { setter: Some(setter), .. } => {
                setter.call(node, &[value])?;
                Ok(())
            }
            PropertyValue::GetSet { setter: None, .. } => {
                Err(RuntimeError::NoSetter { name: name.to_string() })
            }
            PropertyValue::Data { writable: false, .. } => {
                Err(RuntimeError::NotWritable { name: name.to_string() })
            }
            PropertyValue::Data { .. } => {
                node.define_property(name, PropertyDescriptor::data(value))
            }
        }
    }

    /// Resolve `name` and call it with `node` as receiver
    pub fn invoke(&self, node: &ObjectRef, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        match self.get(node, name)? {
            Value::Function(method) => method.call(node, args),
            _ => Err(RuntimeError::NotCallable { name: name.to_string() }),
        }
    }

    /// Whether `proto` appears on `node`'s chain (excluding `node` itself)
    pub fn is_prototype_of(&self, proto: &ObjectRef, node: &ObjectRef) -> RuntimeResult<bool> {
        let mut walk = self.walk(node);
        // Skip `node` itself
        if let Some(first) = walk.next() {
            first?;
        }
        for current in walk {
            if current?.ptr_eq(proto) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of objects on the chain, `node` included
    pub fn depth(&self, node: &ObjectRef) -> RuntimeResult<usize> {
        let mut depth = 0;
        for current in self.walk(node) {
            current?;
            depth += 1;
        }
        Ok(depth)
    }
}

/// Find the nearest definition of `name` on `node`'s chain
pub fn resolve(node: &ObjectRef, name: &str) -> RuntimeResult<Option<PropertyDescriptor>> {
    Chain::default().resolve(node, name)
}

/// Every enumerable name visible from `node`, for-in order
pub fn enumerate_all(node: &ObjectRef) -> RuntimeResult<Vec<String>> {
    Chain::default().enumerate_all(node)
}

/// Check if `name` is an own property of `node` (no traversal)
pub fn has_own(node: &ObjectRef, name: &str) -> bool {
    node.has_own(name)
}

/// Whether `name` is visible anywhere on `node`'s chain
pub fn has_property(node: &ObjectRef, name: &str) -> RuntimeResult<bool> {
    Chain::default().has_property(node, name)
}

/// Read `name` through the chain
pub fn get(node: &ObjectRef, name: &str) -> RuntimeResult<Value> {
    Chain::default().get(node, name)
}

/// Assign `name` on `node` with chain-aware semantics
pub fn put(node: &ObjectRef, name: &str, value: Value) -> RuntimeResult<()> {
    Chain::default().put(node, name, value)
}

/// Resolve `name` and call it with `node` as receiver
pub fn invoke(node: &ObjectRef, name: &str, args: &[Value]) -> RuntimeResult<Value> {
    Chain::default().invoke(node, name, args)
}

/// Whether `proto` appears on `node`'s chain
pub fn is_prototype_of(proto: &ObjectRef, node: &ObjectRef) -> RuntimeResult<bool> {
    Chain::default().is_prototype_of(proto, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::function::Function;
    use crate::runtime::object::create_root;

    fn obj(proto: Option<&ObjectRef>, props: &[(&str, i32)]) -> ObjectRef {
        ObjectRef::with_properties(proto, props.iter().map(|(k, v)| (*k, Value::from(*v)))).unwrap()
    }

    #[test]
    fn test_resolve_own_and_inherited() {
        let root = create_root();
        let shape = obj(Some(&root), &[("color", 1)]);
        let circle = obj(Some(&shape), &[("radius", 2)]);

        let radius = resolve(&circle, "radius").unwrap().unwrap();
        assert_eq!(radius.value(), Some(&Value::from(2)));
        let color = resolve(&circle, "color").unwrap().unwrap();
        assert_eq!(color.value(), Some(&Value::from(1)));
        assert!(resolve(&circle, "missing").unwrap().is_none());
    }

    #[test]
    fn test_own_shadows_inherited() {
        let base = obj(None, &[("x", 1)]);
        let derived = obj(Some(&base), &[("x", 2)]);

        let found = resolve(&derived, "x").unwrap().unwrap();
        let own = derived.get_own_property_descriptor("x").unwrap();
        assert_eq!(found.value(), own.value());

        let holder = Chain::default().resolve_holder(&derived, "x").unwrap().unwrap();
        assert!(holder.holder.ptr_eq(&derived));
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let a = ObjectRef::new(None);
        let b = ObjectRef::new(Some(&a));
        let c = ObjectRef::new(Some(&b));
        a.force_prototype(Some(&c));

        assert!(matches!(resolve(&c, "nothing"), Err(RuntimeError::CyclicPrototype)));
        assert_eq!(enumerate_all(&a), Err(RuntimeError::CyclicPrototype));

        // Self loop
        let d = ObjectRef::new(None);
        d.force_prototype(Some(&d));
        assert!(matches!(resolve(&d, "x"), Err(RuntimeError::CyclicPrototype)));

        // Break the cycles so the nodes can be freed
        a.force_prototype(None);
        d.force_prototype(None);
    }

    #[test]
    fn test_cycle_with_tail() {
        let mut nodes: Vec<ObjectRef> = vec![ObjectRef::new(None)];
        for _ in 0..20 {
            let next = ObjectRef::new(Some(nodes.last().unwrap()));
            nodes.push(next);
        }
        // Loop the first five back onto node 4
        nodes[0].force_prototype(Some(&nodes[4]));

        let result = resolve(nodes.last().unwrap(), "x");
        assert!(matches!(result, Err(RuntimeError::CyclicPrototype)));
        nodes[0].force_prototype(None);
    }

    #[test]
    fn test_depth_limit() {
        let mut node = ObjectRef::new(None);
        for _ in 0..10 {
            node = ObjectRef::new(Some(&node));
        }
        let chain = Chain::with_max_depth(5);
        assert_eq!(
            chain.resolve(&node, "x").unwrap_err(),
            RuntimeError::ChainTooDeep { limit: 5 }
        );
        assert_eq!(Chain::default().depth(&node).unwrap(), 11);
    }

    #[test]
    fn test_enumerate_all_order() {
        let root = create_root();
        let proto = obj(Some(&root), &[("draw", 0), ("radius", 9)]);
        let circle = obj(Some(&proto), &[("radius", 1), ("location", 2)]);

        // Nearest definition first, inherited names after, no duplicates
        assert_eq!(enumerate_all(&circle).unwrap(), ["radius", "location", "draw"]);
    }

    #[test]
    fn test_enumerate_all_nearest_flag_wins() {
        let base = obj(None, &[("name", 1), ("age", 2)]);
        let derived = ObjectRef::new(Some(&base));
        derived
            .define_property("name", PropertyDescriptor::data(Value::from(3)).enumerable(false))
            .unwrap();

        assert_eq!(enumerate_all(&derived).unwrap(), ["age"]);

        // And the reverse: hidden in the base, visible when redefined
        let hidden_base = ObjectRef::new(None);
        hidden_base
            .define_property("id", PropertyDescriptor::data(Value::from(1)).enumerable(false))
            .unwrap();
        let visible = obj(Some(&hidden_base), &[("id", 2)]);
        assert_eq!(enumerate_all(&visible).unwrap(), ["id"]);
    }

    #[test]
    fn test_has_own_vs_has_property() {
        let base = obj(None, &[("draw", 0)]);
        let circle = obj(Some(&base), &[("radius", 1)]);

        assert!(has_own(&circle, "radius"));
        assert!(!has_own(&circle, "draw"));
        assert!(has_property(&circle, "draw").unwrap());
        assert!(!has_property(&circle, "missing").unwrap());
    }

    #[test]
    fn test_get_runs_getter_with_receiver() {
        let base = ObjectRef::new(None);
        let getter = Function::new("area", 0, |this, _| {
            let r = this.get_own_value("radius").and_then(|v| v.to_number()).unwrap_or(0.0);
            Ok(Value::from(r * r))
        });
        base.define_property("area", PropertyDescriptor::getter(getter))
            .unwrap();
        let circle = obj(Some(&base), &[("radius", 3)]);

        assert_eq!(get(&circle, "area").unwrap(), Value::from(9));
        assert_eq!(get(&circle, "missing").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_put_shadows_writable_inherited() {
        let base = obj(None, &[("color", 1)]);
        let child = ObjectRef::new(Some(&base));

        put(&child, "color", Value::from(2)).unwrap();
        assert_eq!(child.get_own_value("color"), Some(Value::from(2)));
        assert_eq!(base.get_own_value("color"), Some(Value::from(1)));
    }

    #[test]
    fn test_put_respects_inherited_read_only() {
        let base = ObjectRef::new(None);
        base.define_property("kind", PropertyDescriptor::data(Value::from(1)).writable(false))
            .unwrap();
        let child = ObjectRef::new(Some(&base));

        assert_eq!(
            put(&child, "kind", Value::from(2)),
            Err(RuntimeError::NotWritable { name: "kind".into() })
        );
        assert!(!child.has_own("kind"));
    }

    #[test]
    fn test_put_runs_inherited_setter() {
        let base = ObjectRef::new(None);
        let setter = Function::new("location", 1, |this, args| {
            let v = args.first().cloned().unwrap_or_default();
            if !v.is_object() {
                return Err(RuntimeError::host("Invalid Location Object"));
            }
            this.define_property("_loc", PropertyDescriptor::data(v).enumerable(false))?;
            Ok(Value::Undefined)
        });
        base.define_property("location", PropertyDescriptor::accessor(None, Some(setter)))
            .unwrap();
        let child = ObjectRef::new(Some(&base));

        let loc = ObjectRef::new(None);
        put(&child, "location", Value::from(loc.clone())).unwrap();
        assert_eq!(child.get_own_value("_loc"), Some(Value::from(loc)));
        assert!(!base.has_own("_loc"));

        assert_eq!(
            put(&child, "location", Value::from(1)),
            Err(RuntimeError::host("Invalid Location Object"))
        );

        let getter_only = ObjectRef::new(None);
        getter_only
            .define_property(
                "ro",
                PropertyDescriptor::getter(Function::new("ro", 0, |_, _| Ok(Value::Null))),
            )
            .unwrap();
        let grandchild = ObjectRef::new(Some(&getter_only));
        assert!(matches!(
            put(&grandchild, "ro", Value::Null),
            Err(RuntimeError::NoSetter { .. })
        ));
    }

    #[test]
    fn test_invoke_dispatches_to_prototype() {
        let proto = ObjectRef::new(None);
        let describe = Function::new("describe", 0, |this, _| {
            let r = this.get_own_value("radius").unwrap_or_default();
            Ok(Value::from(format!("A Circle with radius {}", r)))
        });
        proto
            .define_property("describe", PropertyDescriptor::data(describe.into()).enumerable(false))
            .unwrap();
        let circle = obj(Some(&proto), &[("radius", 4)]);

        assert_eq!(
            invoke(&circle, "describe", &[]).unwrap(),
            Value::from("A Circle with radius 4")
        );
        assert_eq!(
            invoke(&circle, "radius", &[]),
            Err(RuntimeError::NotCallable { name: "radius".into() })
        );
    }

    #[test]
    fn test_is_prototype_of() {
        let root = create_root();
        let shape = ObjectRef::new(Some(&root));
        let circle = ObjectRef::new(Some(&shape));

        assert!(is_prototype_of(&shape, &circle).unwrap());
        assert!(is_prototype_of(&root, &circle).unwrap());
        assert!(!is_prototype_of(&circle, &circle).unwrap());
        assert!(!is_prototype_of(&circle, &shape).unwrap());
    }
}

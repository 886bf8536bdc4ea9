//! Property table and operations
//!
//! Each object stores its own properties in a table keyed by name. The
//! table preserves insertion order, which is the order `own_keys` reports
//! and the order for-in style enumeration starts from.

use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;

use crate::runtime::descriptor::{PropertyDescriptor, PropertyValue};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::function::Function;
use crate::value::Value;

/// A named entry in a property table
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name
    pub key: Rc<str>,
    /// Behavior and payload
    pub descriptor: PropertyDescriptor,
}

/// Result of a table-level assignment
#[derive(Debug)]
pub enum SetOutcome {
    /// Data property updated in place
    Stored,
    /// Accessor property; the caller must invoke this setter
    CallSetter(Function),
    /// No such property in this table
    Missing,
}

/// Property table structure
///
/// Layout:
/// - properties[]: slots in insertion order, `None` for deleted entries
/// - index: name -> slot
///
/// Deleted slots are never reused, so a name defined again after a delete
/// lands at the end of the order. Slots are compacted once tombstones
/// outnumber live entries.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    /// Number of live properties
    prop_count: usize,
    /// Properties, with tombstones
    properties: Vec<Option<Property>>,
    /// Name -> index into properties
    index: AHashMap<Rc<str>, usize>,
}

impl PropertyTable {
    /// Tombstone count below which compaction never runs
    const MIN_COMPACT: usize = 8;

    /// Create a new empty property table
    pub fn new() -> Self {
        PropertyTable::default()
    }

    /// Create a property table with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        PropertyTable {
            prop_count: 0,
            properties: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
        }
    }

    /// Get the number of properties
    #[inline]
    pub fn len(&self) -> usize {
        self.prop_count
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prop_count == 0
    }

    /// Find a property slot by name
    fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Property> {
        let idx = self.find(name)?;
        self.properties[idx].as_mut()
    }

    /// Get a property descriptor by name (this table only)
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        let idx = self.find(name)?;
        self.properties[idx].as_ref().map(|p| &p.descriptor)
    }

    /// Check if a property exists
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Insert or replace a property
    ///
    /// Replacing keeps the entry's position. A non-configurable entry can
    /// only be replaced by a compatible descriptor; anything else fails with
    /// `NotConfigurable` and leaves the table untouched.
    ///
    /// Returns true if this was a new property.
    pub fn define(&mut self, name: &str, descriptor: PropertyDescriptor) -> RuntimeResult<bool> {
        if let Some(prop) = self.slot_mut(name) {
            if !prop.descriptor.is_configurable()
                && !prop.descriptor.is_compatible_redefinition(&descriptor)
            {
                debug!(name, "rejected redefinition of non-configurable property");
                return Err(RuntimeError::NotConfigurable { name: name.to_string() });
            }
            prop.descriptor = descriptor;
            return Ok(false);
        }

        let key: Rc<str> = Rc::from(name);
        self.index.insert(key.clone(), self.properties.len());
        self.properties.push(Some(Property { key, descriptor }));
        self.prop_count += 1;
        Ok(true)
    }

    /// Assign to an existing property
    ///
    /// Data properties are updated in place (flags and position unchanged).
    /// For accessors the setter is handed back to the caller, which owns
    /// the receiver needed to invoke it.
    pub fn set_value(&mut self, name: &str, value: Value) -> RuntimeResult<SetOutcome> {
        let Some(prop) = self.slot_mut(name) else {
            return Ok(SetOutcome::Missing);
        };

        let setter = match prop.descriptor.payload() {
            PropertyValue::Data { writable, .. } => {
                if !*writable {
                    debug!(name, "rejected write to non-writable property");
                    return Err(RuntimeError::NotWritable { name: name.to_string() });
                }
                None
            }
            PropertyValue::GetSet { setter: Some(f), .. } => Some(f.clone()),
            PropertyValue::GetSet { setter: None, .. } => {
                return Err(RuntimeError::NoSetter { name: name.to_string() });
            }
        };

        match setter {
            Some(f) => Ok(SetOutcome::CallSetter(f)),
            None => {
                prop.descriptor.store(value);
                Ok(SetOutcome::Stored)
            }
        }
    }

    /// Delete a property by name
    ///
    /// Returns true if the property existed. Later entries keep their
    /// relative order.
    pub fn delete(&mut self, name: &str) -> RuntimeResult<bool> {
        let Some(idx) = self.find(name) else {
            return Ok(false);
        };

        if let Some(prop) = &self.properties[idx] {
            if !prop.descriptor.is_configurable() {
                debug!(name, "rejected delete of non-configurable property");
                return Err(RuntimeError::NotConfigurable { name: name.to_string() });
            }
        }

        self.properties[idx] = None;
        self.index.remove(name);
        self.prop_count -= 1;

        let tombstones = self.properties.len() - self.prop_count;
        if tombstones >= Self::MIN_COMPACT && tombstones > self.prop_count {
            self.compact();
        }
        Ok(true)
    }

    /// Drop tombstones and rebuild the index
    fn compact(&mut self) {
        self.properties.retain(Option::is_some);
        self.index.clear();
        for (i, prop) in self.properties.iter().enumerate() {
            if let Some(prop) = prop {
                self.index.insert(prop.key.clone(), i);
            }
        }
    }

    /// Iterate over all properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().flatten()
    }

    /// Mutable iteration, used by freeze/seal
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut().flatten()
    }

    /// All property names in insertion order, enumerable or not
    pub fn own_keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|p| &*p.key)
    }

    /// Enumerable property names in insertion order
    pub fn own_enumerable_keys(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|p| p.descriptor.is_enumerable())
            .map(|p| &*p.key)
    }
}

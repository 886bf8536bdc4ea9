//! Property descriptors
//!
//! A descriptor is either a data descriptor (a stored value plus a
//! `writable` flag) or an accessor descriptor (an optional getter/setter
//! pair). The two shapes are separate enum variants, so a descriptor can
//! never carry both a value and an accessor.

use crate::runtime::function::Function;
use crate::value::Value;

/// Property type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Data property with a stored value
    Normal,
    /// Getter/setter property
    GetSet,
}

/// Payload of a descriptor
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Stored value
    Data { value: Value, writable: bool },
    /// Accessor pair; either half may be absent
    GetSet {
        getter: Option<Function>,
        setter: Option<Function>,
    },
}

/// Metadata and payload governing one property
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    value: PropertyValue,
    enumerable: bool,
    configurable: bool,
}

impl PropertyDescriptor {
    /// Data descriptor with the defaults of a plain assignment:
    /// writable, enumerable and configurable
    pub fn data(value: Value) -> Self {
        PropertyDescriptor {
            value: PropertyValue::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Accessor descriptor, enumerable and configurable
    pub fn accessor(getter: Option<Function>, setter: Option<Function>) -> Self {
        PropertyDescriptor {
            value: PropertyValue::GetSet { getter, setter },
            enumerable: true,
            configurable: true,
        }
    }

    /// Read-only accessor (getter only)
    pub fn getter(getter: Function) -> Self {
        Self::accessor(Some(getter), None)
    }

    /// Set the `writable` flag. Has no effect on accessor descriptors.
    pub fn writable(mut self, writable: bool) -> Self {
        if let PropertyValue::Data { writable: w, .. } = &mut self.value {
            *w = writable;
        }
        self
    }

    /// Set the `enumerable` flag
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    /// Set the `configurable` flag
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// Get the property type
    #[inline]
    pub fn prop_type(&self) -> PropertyType {
        match self.value {
            PropertyValue::Data { .. } => PropertyType::Normal,
            PropertyValue::GetSet { .. } => PropertyType::GetSet,
        }
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.prop_type() == PropertyType::Normal
    }

    #[inline]
    pub fn is_accessor(&self) -> bool {
        self.prop_type() == PropertyType::GetSet
    }

    /// Writable flag; always false for accessors
    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self.value, PropertyValue::Data { writable: true, .. })
    }

    #[inline]
    pub fn is_enumerable(&self) -> bool {
        self.enumerable
    }

    #[inline]
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// Payload
    #[inline]
    pub fn payload(&self) -> &PropertyValue {
        &self.value
    }

    /// Stored value of a data descriptor
    pub fn value(&self) -> Option<&Value> {
        match &self.value {
            PropertyValue::Data { value, .. } => Some(value),
            PropertyValue::GetSet { .. } => None,
        }
    }

    /// Getter of an accessor descriptor
    pub fn get_fn(&self) -> Option<&Function> {
        match &self.value {
            PropertyValue::GetSet { getter, .. } => getter.as_ref(),
            PropertyValue::Data { .. } => None,
        }
    }

    /// Setter of an accessor descriptor
    pub fn set_fn(&self) -> Option<&Function> {
        match &self.value {
            PropertyValue::GetSet { setter, .. } => setter.as_ref(),
            PropertyValue::Data { .. } => None,
        }
    }

    /// Overwrite the stored value in place, leaving flags untouched.
    /// Callers check `writable` first.
    pub(crate) fn store(&mut self, new_value: Value) {
        if let PropertyValue::Data { value, .. } = &mut self.value {
            *value = new_value;
        }
    }

    /// Whether `next` may replace `self` when `self` is non-configurable.
    ///
    /// Requires the same kind and the same enumerable/configurable flags.
    /// Data descriptors must agree on `writable`, and a non-writable value
    /// must stay the same. Accessors must keep the same getter and setter.
    pub fn is_compatible_redefinition(&self, next: &PropertyDescriptor) -> bool {
        if self.enumerable != next.enumerable || self.configurable != next.configurable {
            return false;
        }
        match (&self.value, &next.value) {
            (
                PropertyValue::Data { value: a, writable: wa },
                PropertyValue::Data { value: b, writable: wb },
            ) => wa == wb && (*wa || a.same_value(b)),
            (
                PropertyValue::GetSet { getter: ga, setter: sa },
                PropertyValue::GetSet { getter: gb, setter: sb },
            ) => same_fn(ga, gb) && same_fn(sa, sb),
            _ => false,
        }
    }
}

fn same_fn(a: &Option<Function>, b: &Option<Function>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_defaults() {
        let desc = PropertyDescriptor::data(Value::from(1));
        assert!(desc.is_data());
        assert!(desc.is_writable());
        assert!(desc.is_enumerable());
        assert!(desc.is_configurable());
        assert_eq!(desc.value(), Some(&Value::from(1)));
        assert!(desc.get_fn().is_none());
    }

    #[test]
    fn test_builder_flags() {
        let desc = PropertyDescriptor::data(Value::from("Kartik"))
            .writable(false)
            .enumerable(false);
        assert!(!desc.is_writable());
        assert!(!desc.is_enumerable());
        assert!(desc.is_configurable());
    }

    #[test]
    fn test_accessor_has_no_value() {
        let get = Function::new("get", 0, |_, _| Ok(Value::Null));
        let desc = PropertyDescriptor::getter(get).writable(true);
        assert_eq!(desc.prop_type(), PropertyType::GetSet);
        assert!(desc.value().is_none());
        assert!(desc.get_fn().is_some());
        assert!(desc.set_fn().is_none());
        assert!(!desc.is_writable());
    }

    #[test]
    fn test_compatible_redefinition() {
        let fixed = PropertyDescriptor::data(Value::from(1))
            .writable(false)
            .configurable(false);
        assert!(fixed.is_compatible_redefinition(&fixed.clone()));

        let changed_value = PropertyDescriptor::data(Value::from(2))
            .writable(false)
            .configurable(false);
        assert!(!fixed.is_compatible_redefinition(&changed_value));

        let writable = PropertyDescriptor::data(Value::from(1)).configurable(false);
        let writable_new_value = PropertyDescriptor::data(Value::from(5)).configurable(false);
        assert!(writable.is_compatible_redefinition(&writable_new_value));
        assert!(!writable.is_compatible_redefinition(&fixed));

        let get = Function::new("get", 0, |_, _| Ok(Value::Null));
        let accessor = PropertyDescriptor::getter(get.clone()).configurable(false);
        assert!(accessor.is_compatible_redefinition(&PropertyDescriptor::getter(get).configurable(false)));
        assert!(!accessor.is_compatible_redefinition(&writable));
    }
}

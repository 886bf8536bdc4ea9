//! JSON snapshots of objects
//!
//! Serializes the own enumerable data of an object (and of nested objects),
//! and builds fresh objects back from JSON text. Methods and accessors are
//! never part of a snapshot. Key order follows insertion order both ways.

use serde_json::{Map, Number};

use crate::runtime::descriptor::PropertyValue;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{ObjectRef, create_root};
use crate::value::Value;

/// Deepest object nesting a snapshot may have, matching the parser's limit
pub const MAX_DEPTH: usize = 128;

fn json_error(err: serde_json::Error) -> RuntimeError {
    RuntimeError::Json(err.to_string())
}

/// Convert a number the way `JSON.stringify` does: integers without a
/// fraction, non-finite values as null
fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Convert a value; `None` means the value is left out of the snapshot
fn value_to_json(value: &Value, path: &mut Vec<usize>) -> RuntimeResult<Option<serde_json::Value>> {
    let json = match value {
        Value::Undefined | Value::Function(_) => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Object(obj) => object_to_json(obj, path)?,
    };
    Ok(Some(json))
}

fn object_to_json(node: &ObjectRef, path: &mut Vec<usize>) -> RuntimeResult<serde_json::Value> {
    if path.contains(&node.id()) {
        return Err(RuntimeError::Json("converting circular structure".to_string()));
    }
    if path.len() >= MAX_DEPTH {
        return Err(RuntimeError::Json(format!(
            "nesting deeper than {} objects",
            MAX_DEPTH
        )));
    }
    path.push(node.id());

    // Snapshot the data first so no borrow is held while recursing
    let entries: Vec<(String, Value)> = node.with_props(|props| {
        props
            .iter()
            .filter(|p| p.descriptor.is_enumerable())
            .filter_map(|p| match p.descriptor.payload() {
                PropertyValue::Data { value, .. } => Some((p.key.to_string(), value.clone())),
                PropertyValue::GetSet { .. } => None,
            })
            .collect()
    });

    let mut map = Map::new();
    for (key, value) in &entries {
        if let Some(json) = value_to_json(value, path)? {
            map.insert(key.clone(), json);
        }
    }
    path.pop();
    Ok(serde_json::Value::Object(map))
}

/// Snapshot `node` as a JSON value
pub fn to_json(node: &ObjectRef) -> RuntimeResult<serde_json::Value> {
    object_to_json(node, &mut Vec::new())
}

/// Serialize `node`'s own enumerable data to compact JSON text
pub fn stringify(node: &ObjectRef) -> RuntimeResult<String> {
    serde_json::to_string(&to_json(node)?).map_err(json_error)
}

/// Serialize with indentation
pub fn stringify_pretty(node: &ObjectRef) -> RuntimeResult<String> {
    serde_json::to_string_pretty(&to_json(node)?).map_err(json_error)
}

/// Build a value from JSON
///
/// Objects become fresh nodes with default descriptors. The outermost
/// object links to `proto`; nested objects link to the root.
pub fn from_json(json: &serde_json::Value, proto: &ObjectRef) -> RuntimeResult<Value> {
    let value = match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(_) => {
            return Err(RuntimeError::Json("arrays are not supported".to_string()));
        }
        serde_json::Value::Object(map) => {
            let node = ObjectRef::new(Some(proto));
            let root = create_root();
            for (key, item) in map {
                node.set_value(key, from_json(item, &root)?)?;
            }
            Value::Object(node)
        }
    };
    Ok(value)
}

/// Parse JSON text into any value, objects linking to the root
pub fn parse_value(text: &str) -> RuntimeResult<Value> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(json_error)?;
    from_json(&json, &create_root())
}

/// Parse JSON text that must describe an object, linking it to `proto`
pub fn parse(text: &str, proto: &ObjectRef) -> RuntimeResult<ObjectRef> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(json_error)?;
    if !json.is_object() {
        return Err(RuntimeError::Json("expected a JSON object".to_string()));
    }
    match from_json(&json, proto)? {
        Value::Object(node) => Ok(node),
        _ => Err(RuntimeError::Json("expected a JSON object".to_string())),
    }
}

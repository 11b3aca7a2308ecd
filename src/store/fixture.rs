//! YAML content fixtures
//!
//! A fixture is a mapping of node names to node bodies. Inside a body, keys
//! starting with `_` are directives (`_type`, `_mixins`, `_uuid`, `_children`),
//! nested mappings are child nodes and everything else is a property:
//!
//! ```yaml
//! test:
//!   docs:
//!     doc:
//!       _type: hippo:handle
//!       doc:
//!         _type: hippo:document
//!         state: published
//!         tags: [a, b]
//!         created: { date: "2024-01-01T00:00:00Z" }
//! ```
//!
//! Same-name siblings are declared through `_children`, a list of bodies that
//! each carry a `_name`.

use crate::error::{ApiError, StorageError};
use crate::nodetype::NT_UNSTRUCTURED;
use crate::session::Session;
use crate::store::{Property, PropertyValue};
use crate::types::NodeId;
use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

const TYPED_KEYS: &[&str] = &["string", "long", "double", "boolean", "date", "reference"];

/// Load a fixture below `parent` in the session's working copy.
///
/// Returns the ids of the top-level nodes created. Nothing is saved.
pub fn load_str(session: &mut Session, parent: NodeId, yaml: &str) -> Result<Vec<NodeId>, ApiError> {
    let root: Value = serde_yaml::from_str(yaml).map_err(StorageError::from)?;
    let mapping = match root {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(Vec::new()),
        _ => return Err(malformed("fixture root must be a mapping").into()),
    };
    let mut created = Vec::new();
    for (key, body) in mapping {
        let name = key_name(&key)?;
        created.push(load_node(session, parent, &name, &body)?);
    }
    debug!(nodes = created.len(), "Fixture loaded");
    Ok(created)
}

pub fn load_file(session: &mut Session, parent: NodeId, path: impl AsRef<Path>) -> Result<Vec<NodeId>, ApiError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(StorageError::from)?;
    load_str(session, parent, &text)
}

fn load_node(session: &mut Session, parent: NodeId, name: &str, body: &Value) -> Result<NodeId, ApiError> {
    let empty = Mapping::new();
    let body = match body {
        Value::Mapping(mapping) => mapping,
        Value::Null => &empty,
        _ => return Err(malformed(format!("body of node '{}' must be a mapping", name)).into()),
    };

    let primary_type = match body.get("_type") {
        Some(Value::String(t)) => t.clone(),
        Some(_) => return Err(malformed(format!("_type of '{}' must be a string", name)).into()),
        None => NT_UNSTRUCTURED.to_string(),
    };
    let mixins = match body.get("_mixins") {
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|v| scalar_string(v).ok_or_else(|| malformed("_mixins must be strings")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(malformed("_mixins must be a list").into()),
        None => Vec::new(),
    };
    let id = match body.get("_uuid") {
        Some(v) => scalar_string(v)
            .and_then(|s| s.parse::<NodeId>().ok())
            .ok_or_else(|| malformed(format!("_uuid of '{}' is not a uuid", name)))?,
        None => NodeId::new_random(),
    };

    let id = session.add_node_with_id(parent, id, name, &primary_type, mixins)?;

    for (key, value) in body {
        let key = key_name(key)?;
        match key.as_str() {
            "_type" | "_mixins" | "_uuid" | "_name" => {}
            "_children" => {
                let items = match value {
                    Value::Sequence(items) => items,
                    _ => return Err(malformed("_children must be a list").into()),
                };
                for item in items {
                    let child_name = item
                        .get("_name")
                        .and_then(scalar_string)
                        .ok_or_else(|| malformed("entries of _children need a _name"))?;
                    load_node(session, id, &child_name, item)?;
                }
            }
            _ if is_child(value) => {
                load_node(session, id, &key, value)?;
            }
            _ => {
                session.set_property(id, property(&key, value)?)?;
            }
        }
    }
    Ok(id)
}

fn is_child(value: &Value) -> bool {
    match value {
        Value::Mapping(mapping) => typed_entry(mapping).is_none(),
        _ => false,
    }
}

fn typed_entry(mapping: &Mapping) -> Option<(&str, &Value)> {
    if mapping.len() != 1 {
        return None;
    }
    let (key, value) = mapping.iter().next()?;
    let key = key.as_str()?;
    TYPED_KEYS.iter().find(|k| **k == key).map(|k| (*k, value))
}

fn property(name: &str, value: &Value) -> Result<Property, StorageError> {
    match value {
        Value::Null => Ok(Property::multi(name, Vec::new())),
        Value::Sequence(items) => {
            let values = items.iter().map(scalar_value).collect::<Result<Vec<_>, _>>()?;
            Ok(Property::multi(name, values))
        }
        Value::Mapping(mapping) => match typed_entry(mapping) {
            Some((kind, Value::Sequence(items))) => {
                let values = items
                    .iter()
                    .map(|v| typed_value(kind, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Property::multi(name, values))
            }
            Some((kind, v)) => Ok(Property::single(name, typed_value(kind, v)?)),
            None => Err(malformed(format!("property '{}' has an unsupported value", name))),
        },
        other => Ok(Property::single(name, scalar_value(other)?)),
    }
}

fn scalar_value(value: &Value) -> Result<PropertyValue, StorageError> {
    match value {
        Value::String(s) => Ok(PropertyValue::String(s.clone())),
        Value::Bool(b) => Ok(PropertyValue::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(PropertyValue::Long(i)),
            None => n
                .as_f64()
                .map(PropertyValue::Double)
                .ok_or_else(|| malformed(format!("unsupported number {}", n))),
        },
        Value::Mapping(mapping) => match typed_entry(mapping) {
            Some((kind, v)) => typed_value(kind, v),
            None => Err(malformed("nested mappings are not property values")),
        },
        _ => Err(malformed("unsupported property value")),
    }
}

fn typed_value(kind: &str, value: &Value) -> Result<PropertyValue, StorageError> {
    let text = scalar_string(value).ok_or_else(|| malformed(format!("{} value must be a scalar", kind)))?;
    let parsed = match kind {
        "string" => Some(PropertyValue::String(text.clone())),
        "long" => text.parse().ok().map(PropertyValue::Long),
        "double" => text.parse().ok().map(PropertyValue::Double),
        "boolean" => text.parse().ok().map(PropertyValue::Boolean),
        "date" => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|d| PropertyValue::Date(d.with_timezone(&Utc))),
        "reference" => text.parse().ok().map(PropertyValue::Reference),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(format!("'{}' is not a valid {}", text, kind)))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn key_name(key: &Value) -> Result<String, StorageError> {
    scalar_string(key).ok_or_else(|| malformed("fixture keys must be scalars"))
}

fn malformed(reason: impl Into<String>) -> StorageError {
    StorageError::Serialization(format!("fixture: {}", reason.into()))
}

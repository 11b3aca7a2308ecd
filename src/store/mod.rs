//! Physical node store
//!
//! The hierarchical store that virtual views are computed from. Nodes carry a
//! name, a primary type, mixins, typed properties and an ordered child list
//! (same-name siblings allowed). The engine only reads through [`NodeStore`];
//! the in-memory [`Tree`] and the sled-backed [`persistence::SledStore`] both
//! implement it.

pub mod events;
pub mod fixture;
pub mod persistence;
pub mod repository;
pub mod tree;

pub use events::ChangeEvent;
pub use repository::Repository;
pub use tree::{Mutation, Tree};

use crate::error::StorageError;
use crate::types::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Reference(NodeId),
}

impl PropertyValue {
    /// String form used for facet values, conditions and matching.
    pub fn as_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Long(v) => v.to_string(),
            PropertyValue::Double(v) => v.to_string(),
            PropertyValue::Boolean(v) => v.to_string(),
            PropertyValue::Date(d) => d.to_rfc3339(),
            PropertyValue::Reference(id) => id.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Long(v) => Some(*v as f64),
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::Date(d) => Some(*d),
            PropertyValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Long(_) => "Long",
            PropertyValue::Double(_) => "Double",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Date(_) => "Date",
            PropertyValue::Reference(_) => "Reference",
        }
    }

    /// Type-aware ordering: numbers numerically, dates chronologically,
    /// everything else by string form.
    pub fn compare(&self, other: &PropertyValue) -> Ordering {
        match (self, other) {
            (PropertyValue::Date(a), PropertyValue::Date(b)) => a.cmp(b),
            (PropertyValue::Long(a), PropertyValue::Long(b)) => a.cmp(b),
            (PropertyValue::Long(_) | PropertyValue::Double(_), PropertyValue::Long(_) | PropertyValue::Double(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            _ => self.as_string().cmp(&other.as_string()),
        }
    }
}

/// Named property, single or multi valued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub values: Vec<PropertyValue>,
    pub multiple: bool,
}

impl Property {
    pub fn single(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            values: vec![value],
            multiple: false,
        }
    }

    pub fn multi(name: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            values,
            multiple: true,
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::single(name, PropertyValue::String(value.into()))
    }

    pub fn strings<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::multi(
            name,
            values
                .into_iter()
                .map(|v| PropertyValue::String(v.into()))
                .collect(),
        )
    }

    pub fn first(&self) -> Option<&PropertyValue> {
        self.values.first()
    }

    pub fn string_values(&self) -> Vec<String> {
        self.values.iter().map(PropertyValue::as_string).collect()
    }
}

/// Entry in a node's ordered child list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub name: String,
    pub id: NodeId,
}

/// PhysicalNode: a stored node and its relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalNode {
    pub id: NodeId,
    pub name: String,
    pub primary_type: String,
    pub mixins: Vec<String>,
    pub parent: Option<NodeId>,
    pub properties: Vec<Property>,
    pub children: Vec<ChildEntry>,
}

impl PhysicalNode {
    pub fn new(id: NodeId, name: impl Into<String>, primary_type: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            primary_type: primary_type.into(),
            mixins: Vec::new(),
            parent,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// First value of a property in string form.
    pub fn string(&self, name: &str) -> Option<String> {
        self.property(name)
            .and_then(Property::first)
            .map(PropertyValue::as_string)
    }

    /// All values of a property in string form; absent properties read as empty.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.property(name)
            .map(Property::string_values)
            .unwrap_or_default()
    }

    pub fn is_node_type(&self, node_type: &str) -> bool {
        self.primary_type == node_type || self.mixins.iter().any(|m| m == node_type)
    }

    pub(crate) fn set_property(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub(crate) fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name != name);
        before != self.properties.len()
    }
}

/// Read interface of the physical store
pub trait NodeStore {
    fn get(&self, id: &NodeId) -> Result<Option<Arc<PhysicalNode>>, StorageError>;

    fn root_id(&self) -> NodeId {
        NodeId::root()
    }

    /// Resolve an absolute path of plain names with optional `[n]` indexes.
    fn lookup_path(&self, path: &str) -> Result<Option<NodeId>, StorageError> {
        if !path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let mut current = self.root_id();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (name, index) = split_index(segment)
                .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
            let node = match self.get(&current)? {
                Some(node) => node,
                None => return Ok(None),
            };
            match node
                .children
                .iter()
                .filter(|c| c.name == name)
                .nth(index - 1)
            {
                Some(child) => current = child.id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Absolute path of a node, with `[n]` on same-name siblings past the first.
    fn path_of(&self, id: &NodeId) -> Result<Option<String>, StorageError> {
        let mut segments = Vec::new();
        let mut current = match self.get(id)? {
            Some(node) => node,
            None => return Ok(None),
        };
        while let Some(parent_id) = current.parent {
            let parent = match self.get(&parent_id)? {
                Some(parent) => parent,
                None => return Ok(None),
            };
            let index = sibling_index(&parent, &current.id);
            if index > 1 {
                segments.push(format!("{}[{}]", current.name, index));
            } else {
                segments.push(current.name.clone());
            }
            current = parent;
        }
        segments.reverse();
        Ok(Some(format!("/{}", segments.join("/"))))
    }
}

/// 1-based position of `id` among the same-named children of `parent`.
pub fn sibling_index(parent: &PhysicalNode, id: &NodeId) -> usize {
    let name = match parent.children.iter().find(|c| &c.id == id) {
        Some(entry) => &entry.name,
        None => return 1,
    };
    parent
        .children
        .iter()
        .filter(|c| &c.name == name)
        .position(|c| &c.id == id)
        .map(|p| p + 1)
        .unwrap_or(1)
}

fn split_index(segment: &str) -> Option<(&str, usize)> {
    match segment.strip_suffix(']').and_then(|s| s.rsplit_once('[')) {
        Some((name, index)) => {
            let index: usize = index.parse().ok()?;
            (index > 0).then_some((name, index))
        }
        None => Some((segment, 1)),
    }
}

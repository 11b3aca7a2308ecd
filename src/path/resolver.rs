//! Path resolution against a node reader
//!
//! Resolution walks one segment at a time from the context node (or the root
//! for absolute paths). Computed names and condition values are always taken
//! from the context node, never from the node reached so far.

use crate::error::{ApiError, PathError, StorageError};
use crate::nodetype::HIPPO_DISCRIMINATOR;
use crate::path::{parse, Condition, ConditionValue, NamePart, Segment};
use crate::read::NodeRead;
use crate::store::Property;
use crate::types::{ItemRef, NodeId};
use std::collections::BTreeMap;
use tracing::debug;

/// Deepest point reached by a resolution and the name that could not be found
/// there. Lets callers create missing items from a partial match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub node: Option<ItemRef>,
    pub rel_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Node(ItemRef),
    Property { node: ItemRef, property: Property },
}

pub struct PathResolver<'a> {
    read: &'a dyn NodeRead,
}

/// Outcome of the per-segment walk
enum Walk {
    At(ItemRef),
    NotFound,
}

impl<'a> PathResolver<'a> {
    pub fn new(read: &'a dyn NodeRead) -> Self {
        Self { read }
    }

    pub fn get_node(&self, ancestor: ItemRef, path: &str) -> Result<Option<ItemRef>, ApiError> {
        match self.get_item(ancestor, path, false, None)? {
            Some(Resolved::Node(item)) => Ok(Some(item)),
            _ => Ok(None),
        }
    }

    pub fn get_property(
        &self,
        ancestor: ItemRef,
        path: &str,
        last: Option<&mut ResolutionEntry>,
    ) -> Result<Option<Property>, ApiError> {
        match self.get_item(ancestor, path, true, last)? {
            Some(Resolved::Property { property, .. }) => Ok(Some(property)),
            _ => Ok(None),
        }
    }

    /// Resolve `path` from `ancestor`. With `is_property` the final segment
    /// names a property of the node reached by the others.
    pub fn get_item(
        &self,
        ancestor: ItemRef,
        path: &str,
        is_property: bool,
        mut last: Option<&mut ResolutionEntry>,
    ) -> Result<Option<Resolved>, ApiError> {
        let parsed = parse(path)?;
        if let Some(entry) = last.as_deref_mut() {
            *entry = ResolutionEntry::default();
        }

        let (node_segments, property_segment) = if is_property {
            match parsed.segments.split_last() {
                Some((last_segment, rest)) => (rest, Some(last_segment)),
                None => return Err(PathError::malformed(path, "property name expected").into()),
            }
        } else {
            (parsed.segments.as_slice(), None)
        };

        let mut current = if parsed.absolute { self.read.root() } else { ancestor };
        for segment in node_segments {
            match self.step(ancestor, current, segment, path, last.as_deref_mut())? {
                Walk::At(next) => current = next,
                Walk::NotFound => return Ok(None),
            }
        }

        let segment = match property_segment {
            Some(segment) => segment,
            None => return Ok(Some(Resolved::Node(current))),
        };
        let name = match segment {
            Segment::Step {
                name,
                index: None,
                conditions,
            } if conditions.is_empty() => match self.expand(ancestor, name)? {
                Some(name) => name,
                None => return Ok(None),
            },
            _ => return Err(PathError::malformed(path, "last segment must be a property name").into()),
        };
        match self.read.property(current, &name)? {
            Some(property) => Ok(Some(Resolved::Property { node: current, property })),
            None => {
                if let Some(entry) = last {
                    entry.node = Some(current);
                    entry.rel_path = Some(name);
                }
                Ok(None)
            }
        }
    }

    fn step(
        &self,
        ancestor: ItemRef,
        current: ItemRef,
        segment: &Segment,
        path: &str,
        last: Option<&mut ResolutionEntry>,
    ) -> Result<Walk, ApiError> {
        match segment {
            Segment::Current => Ok(Walk::At(current)),
            Segment::Parent => Ok(match self.read.parent(current)? {
                Some(parent) => Walk::At(parent),
                None => Walk::NotFound,
            }),
            Segment::Identifier { property } => {
                let target = self.teleport(ancestor, property)?;
                if let Some(entry) = last {
                    entry.node = Some(target);
                    entry.rel_path = None;
                }
                Ok(Walk::At(target))
            }
            Segment::Step {
                name,
                index,
                conditions,
            } => {
                let name = match self.expand(ancestor, name)? {
                    Some(name) => name,
                    None => return Ok(Walk::NotFound),
                };
                let conditions = match self.conditions(ancestor, conditions, path)? {
                    Some(conditions) => conditions,
                    None => return Ok(Walk::NotFound),
                };
                if let Some(entry) = last {
                    entry.node = Some(current);
                    entry.rel_path = Some(name.clone());
                }

                let candidates = self.read.children_named(current, &name)?;
                if conditions.is_empty() {
                    let position = index.unwrap_or(1) - 1;
                    return Ok(candidates.get(position).copied().map_or(Walk::NotFound, Walk::At));
                }
                for candidate in candidates {
                    if self.satisfies(candidate, &conditions)? {
                        return Ok(Walk::At(candidate));
                    }
                }
                Ok(Walk::NotFound)
            }
        }
    }

    fn teleport(&self, ancestor: ItemRef, property: &str) -> Result<ItemRef, ApiError> {
        let value = self
            .read
            .property(ancestor, property)?
            .and_then(|p| p.first().map(|v| v.as_string()))
            .ok_or_else(|| StorageError::ItemNotFound(format!("property '{}' on {}", property, ancestor)))?;
        let id: NodeId = value
            .parse()
            .map_err(|_| StorageError::ItemNotFound(format!("'{}' is not a node identifier", value)))?;
        self.read
            .node_by_id(&id)?
            .ok_or_else(|| StorageError::ItemNotFound(format!("node {}", id)).into())
    }

    fn expand(&self, ancestor: ItemRef, name: &NamePart) -> Result<Option<String>, ApiError> {
        Ok(match name {
            NamePart::Literal(name) => Some(name.clone()),
            NamePart::SelfName(suffix) => Some(format!("{}{}", self.read.name(ancestor)?, suffix)),
            NamePart::ParentName(suffix) => match self.read.parent(ancestor)? {
                Some(parent) => Some(format!("{}{}", self.read.name(parent)?, suffix)),
                None => None,
            },
        })
    }

    /// Evaluate condition values against the context node. `None` when a
    /// referenced property is missing, which makes the segment unresolvable.
    fn conditions(
        &self,
        ancestor: ItemRef,
        conditions: &[Condition],
        path: &str,
    ) -> Result<Option<BTreeMap<String, Option<String>>>, ApiError> {
        let mut resolved = BTreeMap::new();
        for condition in conditions {
            match condition {
                Condition::Exists { key } => {
                    resolved.insert(key.clone(), None);
                }
                Condition::Equals { key, value } => {
                    let value = match value {
                        ConditionValue::Plain(v) | ConditionValue::Literal(v) => v.clone(),
                        ConditionValue::PropertyRef(property) => match self.string_property(ancestor, property)? {
                            Some(v) => v,
                            None => {
                                debug!(path, property = %property, "Condition refers to a missing property");
                                return Ok(None);
                            }
                        },
                    };
                    resolved.insert(key.clone(), Some(value));
                }
                Condition::Similar => {
                    let parent = match self.read.parent(ancestor)? {
                        Some(parent) => parent,
                        None => continue,
                    };
                    let discriminators = match self.read.property(parent, HIPPO_DISCRIMINATOR)? {
                        Some(p) => p.string_values(),
                        None => continue,
                    };
                    for discriminator in discriminators {
                        match self.string_property(ancestor, &discriminator)? {
                            Some(v) => {
                                resolved.insert(discriminator, Some(v));
                            }
                            None => {
                                debug!(path, discriminator = %discriminator, "Context node lacks discriminator");
                                return Ok(None);
                            }
                        }
                    }
                }
            }
        }
        Ok(Some(resolved))
    }

    fn string_property(&self, item: ItemRef, name: &str) -> Result<Option<String>, ApiError> {
        Ok(self
            .read
            .property(item, name)?
            .and_then(|p| p.first().map(|v| v.as_string())))
    }

    /// Existence conditions need the property; equality needs a single value
    /// with the same string form.
    fn satisfies(&self, candidate: ItemRef, conditions: &BTreeMap<String, Option<String>>) -> Result<bool, ApiError> {
        for (key, expected) in conditions {
            let property = match self.read.property(candidate, key)? {
                Some(p) => p,
                None => return Ok(false),
            };
            if let Some(expected) = expected {
                if property.multiple || property.values.len() != 1 {
                    return Ok(false);
                }
                if property.values[0].as_string() != *expected {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

//! In-memory node tree
//!
//! Nodes are shared behind `Arc` so that snapshots are cheap to clone; a
//! mutation copies only the nodes it touches.

use crate::error::StorageError;
use crate::nodetype::NT_ROOT;
use crate::store::events::ChangeEvent;
use crate::store::{ChildEntry, NodeStore, PhysicalNode, Property};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Recorded write operation, replayed against the committed tree on save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    AddNode {
        parent: NodeId,
        id: NodeId,
        name: String,
        primary_type: String,
        mixins: Vec<String>,
    },
    SetProperty {
        id: NodeId,
        property: Property,
    },
    RemoveProperty {
        id: NodeId,
        name: String,
    },
    RemoveNode {
        id: NodeId,
    },
}

/// Snapshot of the physical hierarchy
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Arc<PhysicalNode>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Empty tree holding only the root.
    pub fn new() -> Self {
        let root = PhysicalNode::new(NodeId::root(), "", NT_ROOT, None);
        let mut nodes = HashMap::new();
        nodes.insert(root.id, Arc::new(root));
        Self { nodes }
    }

    /// Rebuild from stored records. The root is created if missing.
    pub fn from_nodes(records: impl IntoIterator<Item = PhysicalNode>) -> Self {
        let mut tree = Self::new();
        for record in records {
            tree.nodes.insert(record.id, Arc::new(record));
        }
        tree
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<PhysicalNode>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PhysicalNode>> {
        self.nodes.values()
    }

    /// Depth-first pre-order ids below (and excluding) `id`.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(id) {
            Some(node) => node.children.iter().rev().map(|c| c.id).collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().rev().map(|c| c.id));
            }
        }
        out
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut PhysicalNode, StorageError> {
        self.nodes
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| StorageError::ItemNotFound(id.to_string()))
    }

    /// Apply one mutation, returning the change events it produces.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<Vec<ChangeEvent>, StorageError> {
        match mutation {
            Mutation::AddNode {
                parent,
                id,
                name,
                primary_type,
                mixins,
            } => {
                if name.is_empty() || name.contains('/') {
                    return Err(StorageError::InvalidPath(format!("illegal node name '{}'", name)));
                }
                if self.nodes.contains_key(id) {
                    return Err(StorageError::InvalidItemState(format!("node {} already exists", id)));
                }
                self.node_mut(parent)?.children.push(ChildEntry {
                    name: name.clone(),
                    id: *id,
                });
                let mut node = PhysicalNode::new(*id, name.clone(), primary_type.clone(), Some(*parent));
                node.mixins = mixins.clone();
                self.nodes.insert(*id, Arc::new(node));
                Ok(vec![ChangeEvent::NodeAdded {
                    id: *id,
                    parent: *parent,
                }])
            }
            Mutation::SetProperty { id, property } => {
                self.node_mut(id)?.set_property(property.clone());
                Ok(vec![ChangeEvent::PropertyChanged {
                    id: *id,
                    name: property.name.clone(),
                }])
            }
            Mutation::RemoveProperty { id, name } => {
                if self.node_mut(id)?.remove_property(name) {
                    Ok(vec![ChangeEvent::PropertyChanged {
                        id: *id,
                        name: name.clone(),
                    }])
                } else {
                    Ok(Vec::new())
                }
            }
            Mutation::RemoveNode { id } => {
                if *id == NodeId::root() {
                    return Err(StorageError::InvalidItemState("the root cannot be removed".to_string()));
                }
                let parent = self
                    .nodes
                    .get(id)
                    .ok_or_else(|| StorageError::ItemNotFound(id.to_string()))?
                    .parent
                    .ok_or_else(|| StorageError::InvalidItemState(format!("node {} has no parent", id)))?;

                let mut events = Vec::new();
                // children first, deepest last in pre-order, so reverse
                let descendants = self.descendants(id);
                for descendant in descendants.iter().rev() {
                    if let Some(node) = self.nodes.remove(descendant) {
                        if let Some(p) = node.parent {
                            events.push(ChangeEvent::NodeRemoved { id: *descendant, parent: p });
                        }
                    }
                }
                self.nodes.remove(id);
                self.node_mut(&parent)?.children.retain(|c| c.id != *id);
                events.push(ChangeEvent::NodeRemoved { id: *id, parent });
                Ok(events)
            }
        }
    }
}

impl NodeStore for Tree {
    fn get(&self, id: &NodeId) -> Result<Option<Arc<PhysicalNode>>, StorageError> {
        Ok(self.nodes.get(id).cloned())
    }
}

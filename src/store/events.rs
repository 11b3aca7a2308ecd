//! Change events published on save.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Physical store change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeEvent {
    NodeAdded { id: NodeId, parent: NodeId },
    NodeRemoved { id: NodeId, parent: NodeId },
    PropertyChanged { id: NodeId, name: String },
}

impl ChangeEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            ChangeEvent::NodeAdded { id, .. }
            | ChangeEvent::NodeRemoved { id, .. }
            | ChangeEvent::PropertyChanged { id, .. } => *id,
        }
    }

    /// Parent whose child list changed, if any.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            ChangeEvent::NodeAdded { parent, .. } | ChangeEvent::NodeRemoved { parent, .. } => Some(*parent),
            ChangeEvent::PropertyChanged { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::NodeAdded { .. } => "node_added",
            ChangeEvent::NodeRemoved { .. } => "node_removed",
            ChangeEvent::PropertyChanged { .. } => "property_changed",
        }
    }
}

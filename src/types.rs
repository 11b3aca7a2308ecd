//! Core types for the virtual content view engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Hash: Generic 256-bit hash value
pub type Hash = [u8; 32];

/// Identifier of the repository root. Also the well-known null reference:
/// any docbase ending in [`SYSTEM_AREA_SUFFIX`] names a fixed system area.
pub const ROOT_ID: &str = "cafebabe-cafe-babe-cafe-babecafebabe";

/// Suffix shared by all fixed system area identifiers.
pub const SYSTEM_AREA_SUFFIX: &str = "babecafebabe";

/// NodeId: stable identity of a physical node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random identifier
    pub fn new_random() -> Self {
        NodeId(Uuid::new_v4())
    }

    /// The repository root
    pub fn root() -> Self {
        // ROOT_ID is a valid hyphenated UUID literal
        NodeId(Uuid::from_u128(0xcafebabe_cafe_babe_cafe_babecafebabe))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True for identifiers of fixed system areas (including the root).
    pub fn is_system_area(&self) -> bool {
        self.to_string().ends_with(SYSTEM_AREA_SUFFIX)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        NodeId(uuid)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// VirtualId: deterministic hash of (parent virtual identity, anchor, filter state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtualId(pub Hash);

impl VirtualId {
    /// First eight bytes in hex, for log lines and tables
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for VirtualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Handle on any item reachable through the read API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRef {
    Physical(NodeId),
    Virtual(VirtualId),
}

impl ItemRef {
    pub fn is_virtual(&self) -> bool {
        matches!(self, ItemRef::Virtual(_))
    }

    pub fn physical(&self) -> Option<NodeId> {
        match self {
            ItemRef::Physical(id) => Some(*id),
            ItemRef::Virtual(_) => None,
        }
    }
}

impl From<NodeId> for ItemRef {
    fn from(id: NodeId) -> Self {
        ItemRef::Physical(id)
    }
}

impl From<VirtualId> for ItemRef {
    fn from(id: VirtualId) -> Self {
        ItemRef::Virtual(id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Physical(id) => write!(f, "{}", id),
            ItemRef::Virtual(id) => write!(f, "virtual:{}", id.short()),
        }
    }
}

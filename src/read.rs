//! Uniform read API over physical and virtual items
//!
//! Callers browse mirrors and navigation trees exactly like stored content;
//! [`crate::session::Session`] implements this trait for both kinds of item.

use crate::error::ApiError;
use crate::path::PathResolver;
use crate::store::Property;
use crate::types::{ItemRef, NodeId};

pub trait NodeRead {
    fn root(&self) -> ItemRef {
        ItemRef::Physical(NodeId::root())
    }

    fn node_by_id(&self, id: &NodeId) -> Result<Option<ItemRef>, ApiError>;

    fn name(&self, item: ItemRef) -> Result<String, ApiError>;

    /// 1-based position among same-named siblings.
    fn index(&self, item: ItemRef) -> Result<usize, ApiError>;

    fn parent(&self, item: ItemRef) -> Result<Option<ItemRef>, ApiError>;

    fn primary_type(&self, item: ItemRef) -> Result<String, ApiError>;

    fn is_node_type(&self, item: ItemRef, node_type: &str) -> Result<bool, ApiError>;

    fn is_handle(&self, item: ItemRef) -> Result<bool, ApiError>;

    fn children(&self, item: ItemRef) -> Result<Vec<ItemRef>, ApiError>;

    fn property(&self, item: ItemRef, name: &str) -> Result<Option<Property>, ApiError>;

    fn properties(&self, item: ItemRef) -> Result<Vec<Property>, ApiError>;

    /// Physical node a virtual item projects, or the item itself when physical.
    /// `None` for purely computed items and for projections whose upstream is gone.
    fn canonical(&self, item: ItemRef) -> Result<Option<NodeId>, ApiError>;

    fn children_named(&self, item: ItemRef, name: &str) -> Result<Vec<ItemRef>, ApiError> {
        let mut out = Vec::new();
        for child in self.children(item)? {
            if self.name(child)? == name {
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Resolve an extended path from the root.
    fn node_by_path(&self, path: &str) -> Result<Option<ItemRef>, ApiError>
    where
        Self: Sized,
    {
        PathResolver::new(self).get_node(self.root(), path)
    }

    /// Absolute path through the (possibly virtual) hierarchy.
    fn path(&self, item: ItemRef) -> Result<String, ApiError> {
        let mut segments = Vec::new();
        let mut current = item;
        while let Some(parent) = self.parent(current)? {
            let name = self.name(current)?;
            match self.index(current)? {
                1 => segments.push(name),
                n => segments.push(format!("{}[{}]", name, n)),
            }
            current = parent;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }
}

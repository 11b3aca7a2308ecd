//! Sessions
//!
//! A session reads one committed snapshot of the repository, overlaid with its
//! own unsaved mutations, and exposes physical and virtual items through
//! [`NodeRead`]. Virtual children are computed lazily and cached until the
//! next refresh or mutation.

use crate::error::{ApiError, StorageError};
use crate::facetnav::LevelRole;
use crate::nodetype::{NodeKind, HIPPO_COUNT, NT_FACETRESULT, NT_FACETSAVAILABLE, NT_FACETSUBNAVIGATION};
use crate::filter::FilterState;
use crate::read::NodeRead;
use crate::store::events::ChangeEvent;
use crate::store::repository::Repository;
use crate::store::tree::{Mutation, Tree};
use crate::store::{sibling_index, PhysicalNode, Property, PropertyValue};
use crate::types::{ItemRef, NodeId, VirtualId};
use crate::virtual_tree::{Engine, Provider, VirtualKind, VirtualNode, VirtualTree};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Session {
    repository: Arc<Repository>,
    engine: Arc<Engine>,
    base: Arc<Tree>,
    working: Option<Tree>,
    pending: Vec<Mutation>,
    revision: u64,
    virtuals: VirtualTree,
}

impl Session {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        let (base, revision) = repository.snapshot();
        let engine = repository.engine().clone();
        debug!(revision, "Session opened");
        Self {
            repository,
            engine,
            base,
            working: None,
            pending: Vec::new(),
            revision,
            virtuals: VirtualTree::new(),
        }
    }

    /// Physical content as this session sees it.
    pub fn tree(&self) -> &Tree {
        self.working.as_ref().unwrap_or(self.base.as_ref())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Committed revision this session is based on.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn virtual_node(&self, id: &VirtualId) -> Option<Arc<VirtualNode>> {
        self.virtuals.get(id)
    }

    fn mutate(&mut self, mutation: Mutation) -> Result<Vec<ChangeEvent>, ApiError> {
        let working = self.working.get_or_insert_with(|| self.base.as_ref().clone());
        let events = working.apply(&mutation)?;
        self.pending.push(mutation);
        self.virtuals.invalidate();
        Ok(events)
    }

    pub fn add_node(&mut self, parent: NodeId, name: &str, primary_type: &str) -> Result<NodeId, ApiError> {
        self.add_node_with_id(parent, NodeId::new_random(), name, primary_type, Vec::new())
    }

    pub fn add_node_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        name: &str,
        primary_type: &str,
        mixins: Vec<String>,
    ) -> Result<NodeId, ApiError> {
        self.mutate(Mutation::AddNode {
            parent,
            id,
            name: name.to_string(),
            primary_type: primary_type.to_string(),
            mixins,
        })?;
        Ok(id)
    }

    pub fn set_property(&mut self, id: NodeId, property: Property) -> Result<(), ApiError> {
        self.mutate(Mutation::SetProperty { id, property })?;
        Ok(())
    }

    pub fn remove_property(&mut self, id: NodeId, name: &str) -> Result<(), ApiError> {
        self.mutate(Mutation::RemoveProperty {
            id,
            name: name.to_string(),
        })?;
        Ok(())
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<(), ApiError> {
        self.mutate(Mutation::RemoveNode { id })?;
        Ok(())
    }

    /// Commit pending mutations and move onto the new revision.
    ///
    /// A mutation whose target vanished in the meantime fails the whole save
    /// with `InvalidItemState`; pending changes are kept for a retry.
    pub fn save(&mut self) -> Result<Vec<ChangeEvent>, ApiError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let (tree, revision, events) = self.repository.commit(&self.pending).map_err(|e| match e {
            StorageError::ItemNotFound(what) => {
                StorageError::InvalidItemState(format!("save conflicts with a concurrent change: {}", what))
            }
            other => other,
        })?;
        info!(revision, mutations = self.pending.len(), events = events.len(), "Session saved");
        self.base = tree;
        self.revision = revision;
        self.working = None;
        self.pending.clear();
        self.virtuals.advance();
        Ok(events)
    }

    /// Move onto the latest committed revision.
    ///
    /// With `keep_changes` the pending mutations are replayed on top of it;
    /// if they no longer apply, the session is left untouched.
    pub fn refresh(&mut self, keep_changes: bool) -> Result<(), ApiError> {
        let (base, revision) = self.repository.snapshot();
        let working = if keep_changes && !self.pending.is_empty() {
            let mut working = base.as_ref().clone();
            for mutation in &self.pending {
                working.apply(mutation).map_err(|e| {
                    StorageError::InvalidItemState(format!("pending change no longer applies: {}", e))
                })?;
            }
            Some(working)
        } else {
            self.pending.clear();
            None
        };
        debug!(from = self.revision, to = revision, keep_changes, "Session refreshed");
        self.base = base;
        self.revision = revision;
        self.working = working;
        self.virtuals.advance();
        Ok(())
    }

    pub fn logout(self) {
        if self.has_pending_changes() {
            warn!(pending = self.pending.len(), "Session closed with unsaved changes");
        }
    }

    fn physical(&self, id: &NodeId) -> Result<Arc<PhysicalNode>, ApiError> {
        self.tree()
            .node(id)
            .cloned()
            .ok_or_else(|| StorageError::ItemNotFound(id.to_string()).into())
    }

    /// Record of a virtual item, recomputed through its parent when content
    /// changed since it was built.
    ///
    /// An item its parent no longer produces keeps its last record, so held
    /// references still answer name and parent queries.
    fn record(&self, id: &VirtualId) -> Result<Arc<VirtualNode>, ApiError> {
        let record = self
            .virtuals
            .get(id)
            .ok_or_else(|| ApiError::from(StorageError::ItemNotFound(format!("virtual node {}", id.short()))))?;
        if self.virtuals.is_current(id) {
            return Ok(record);
        }
        if let Err(e) = self.children(record.parent) {
            debug!(item = %id.short(), error = %e, "Could not recompute virtual parent");
        }
        if self.virtuals.is_current(id) {
            if let Some(fresh) = self.virtuals.get(id) {
                return Ok(fresh);
            }
        }
        Ok(record)
    }

    /// Physical node projected by a virtual mirror, if still present.
    fn upstream(&self, node: &VirtualNode) -> Option<Arc<PhysicalNode>> {
        node.upstream().and_then(|id| self.tree().node(&id).cloned())
    }

    fn stale(node: &VirtualNode) -> ApiError {
        StorageError::ItemNotFound(format!("projected node of '{}' no longer exists", node.name)).into()
    }

    fn compute_children(&self, item: ItemRef) -> Result<Vec<ItemRef>, ApiError> {
        let store = self.tree();
        let specs = match item {
            ItemRef::Physical(id) => {
                let node = self.physical(&id)?;
                let kind = self.engine.kind_of(&node);
                if kind == NodeKind::Plain {
                    return Ok(node.children.iter().map(|c| ItemRef::Physical(c.id)).collect());
                }
                self.engine
                    .expand(store, Provider::for_node(kind, &node), &FilterState::default())?
            }
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                match Provider::for_virtual(&record.kind) {
                    Some(provider) => self.engine.expand(store, provider, &record.filter)?,
                    None => match self.upstream(&record) {
                        Some(upstream) => {
                            let kind = self.engine.kind_of(&upstream);
                            self.engine
                                .expand(store, Provider::for_node(kind, &upstream), &record.filter)?
                        }
                        None => Vec::new(),
                    },
                }
            }
        };
        let ids = self.virtuals.materialize(item, specs);
        Ok(ids.iter().map(|id| ItemRef::Virtual(*id)).collect())
    }
}

impl NodeRead for Session {
    fn node_by_id(&self, id: &NodeId) -> Result<Option<ItemRef>, ApiError> {
        Ok(self.tree().node(id).map(|n| ItemRef::Physical(n.id)))
    }

    fn name(&self, item: ItemRef) -> Result<String, ApiError> {
        match item {
            ItemRef::Physical(id) => Ok(self.physical(&id)?.name.clone()),
            ItemRef::Virtual(id) => Ok(self.record(&id)?.name.clone()),
        }
    }

    fn index(&self, item: ItemRef) -> Result<usize, ApiError> {
        match item {
            ItemRef::Physical(id) => {
                let node = self.physical(&id)?;
                match node.parent {
                    Some(parent) => {
                        let parent = self.physical(&parent)?;
                        Ok(sibling_index(&parent, &id))
                    }
                    None => Ok(1),
                }
            }
            ItemRef::Virtual(id) => Ok(self.record(&id)?.index),
        }
    }

    fn parent(&self, item: ItemRef) -> Result<Option<ItemRef>, ApiError> {
        match item {
            ItemRef::Physical(id) => Ok(self.physical(&id)?.parent.map(ItemRef::Physical)),
            ItemRef::Virtual(id) => Ok(Some(self.record(&id)?.parent)),
        }
    }

    fn primary_type(&self, item: ItemRef) -> Result<String, ApiError> {
        match item {
            ItemRef::Physical(id) => Ok(self.physical(&id)?.primary_type.clone()),
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                match &record.kind {
                    VirtualKind::Mirror { .. } => self
                        .upstream(&record)
                        .map(|n| n.primary_type.clone())
                        .ok_or_else(|| Self::stale(&record)),
                    VirtualKind::Navigation(level) => Ok(match level.role {
                        LevelRole::FacetsAvailable => NT_FACETSAVAILABLE,
                        LevelRole::SubNavigation => NT_FACETSUBNAVIGATION,
                    }
                    .to_string()),
                    VirtualKind::ResultSet(_) => Ok(NT_FACETRESULT.to_string()),
                }
            }
        }
    }

    fn is_node_type(&self, item: ItemRef, node_type: &str) -> Result<bool, ApiError> {
        let physical = match item {
            ItemRef::Physical(id) => Some(self.physical(&id)?),
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                match record.kind {
                    VirtualKind::Mirror { .. } => Some(self.upstream(&record).ok_or_else(|| Self::stale(&record))?),
                    _ => None,
                }
            }
        };
        match physical {
            Some(node) => Ok(node.is_node_type(node_type) || self.engine.types.resolve(&node.primary_type) == node_type),
            None => Ok(self.primary_type(item)? == node_type),
        }
    }

    fn is_handle(&self, item: ItemRef) -> Result<bool, ApiError> {
        match item {
            ItemRef::Physical(id) => {
                let node = self.physical(&id)?;
                Ok(self.engine.types.is_handle(&node))
            }
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                Ok(self
                    .upstream(&record)
                    .map(|n| self.engine.types.is_handle(&n))
                    .unwrap_or(false))
            }
        }
    }

    fn children(&self, item: ItemRef) -> Result<Vec<ItemRef>, ApiError> {
        if let Some(ids) = self.virtuals.cached_children(&item) {
            return Ok(ids.iter().map(|id| ItemRef::Virtual(*id)).collect());
        }
        self.compute_children(item)
    }

    fn property(&self, item: ItemRef, name: &str) -> Result<Option<Property>, ApiError> {
        Ok(self.properties(item)?.into_iter().find(|p| p.name == name))
    }

    fn properties(&self, item: ItemRef) -> Result<Vec<Property>, ApiError> {
        let node = match item {
            ItemRef::Physical(id) => self.physical(&id)?,
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                if let Some(count) = record.count() {
                    return Ok(vec![Property::single(HIPPO_COUNT, PropertyValue::Long(count as i64))]);
                }
                self.upstream(&record).ok_or_else(|| Self::stale(&record))?
            }
        };
        Ok(node.properties.clone())
    }

    fn canonical(&self, item: ItemRef) -> Result<Option<NodeId>, ApiError> {
        match item {
            ItemRef::Physical(id) => Ok(self.tree().node(&id).map(|n| n.id)),
            ItemRef::Virtual(id) => {
                let record = self.record(&id)?;
                Ok(self.upstream(&record).map(|n| n.id))
            }
        }
    }
}

//! Virtual node arena and provider dispatch
//!
//! Virtual nodes are computed on first access and kept in a per-session arena
//! keyed by their deterministic [`VirtualId`]. Child lists are cached until
//! the session is refreshed or mutated; node records survive invalidation so
//! that ids held by callers stay resolvable and recompute to the same ids.

use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::facetnav::range::Clock;
use crate::facetnav::search::{FacetedSearch, StoreSearch};
use crate::facetnav::{FacetNavigator, LevelRole, NavLevel, ResultSetSpec};
use crate::filter::{Criteria, FilterState};
use crate::identity::{virtual_id, Anchor};
use crate::nodetype::{NodeKind, TypeRegistry};
use crate::store::{NodeStore, PhysicalNode};
use crate::types::{ItemRef, NodeId, VirtualId};
use crate::view::ViewProjector;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// What a virtual node is
#[derive(Debug, Clone)]
pub enum VirtualKind {
    /// Projection of a physical node
    Mirror { upstream: NodeId },
    Navigation(Box<NavLevel>),
    ResultSet(Box<ResultSetSpec>),
}

/// A child produced by a provider, before it gets an identity
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub name: String,
    pub kind: VirtualKind,
    pub filter: FilterState,
}

impl ChildSpec {
    pub fn mirror(name: impl Into<String>, upstream: NodeId, filter: FilterState) -> Self {
        Self {
            name: name.into(),
            kind: VirtualKind::Mirror { upstream },
            filter,
        }
    }

    pub fn upstream(&self) -> Option<NodeId> {
        match self.kind {
            VirtualKind::Mirror { upstream } => Some(upstream),
            _ => None,
        }
    }

    fn anchor(&self) -> Anchor<'_> {
        match &self.kind {
            VirtualKind::Mirror { upstream } => Anchor::Node(*upstream),
            VirtualKind::Navigation(level) => Anchor::Facet {
                facet: &level.current.facet,
                value: level.chosen_value(),
            },
            VirtualKind::ResultSet(_) => Anchor::ResultSet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualNode {
    pub id: VirtualId,
    pub parent: ItemRef,
    pub name: String,
    /// 1-based position among same-named siblings
    pub index: usize,
    pub kind: VirtualKind,
    pub filter: FilterState,
}

impl VirtualNode {
    pub fn upstream(&self) -> Option<NodeId> {
        match self.kind {
            VirtualKind::Mirror { upstream } => Some(upstream),
            _ => None,
        }
    }

    /// `hippo:count` of navigation nodes
    pub fn count(&self) -> Option<usize> {
        match &self.kind {
            VirtualKind::Mirror { .. } => None,
            VirtualKind::Navigation(level) => Some(level.count),
            VirtualKind::ResultSet(spec) => Some(spec.count),
        }
    }
}

struct Slot {
    node: Arc<VirtualNode>,
    stamp: u64,
    epoch: u64,
}

#[derive(Default)]
struct Records {
    slots: HashMap<VirtualId, Slot>,
    /// Bumped on every invalidation; a slot is current when its stamp matches.
    stamp: u64,
    /// Bumped per revision change; slots untouched for a whole epoch are pruned.
    epoch: u64,
}

/// Session arena of virtual records and cached child lists.
#[derive(Default)]
pub struct VirtualTree {
    records: RwLock<Records>,
    children: RwLock<HashMap<ItemRef, Arc<Vec<VirtualId>>>>,
}

impl VirtualTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &VirtualId) -> Option<Arc<VirtualNode>> {
        self.records.read().slots.get(id).map(|slot| slot.node.clone())
    }

    /// Whether the record was computed since the last invalidation.
    pub fn is_current(&self, id: &VirtualId) -> bool {
        let records = self.records.read();
        records.slots.get(id).is_some_and(|slot| slot.stamp == records.stamp)
    }

    pub fn cached_children(&self, parent: &ItemRef) -> Option<Arc<Vec<VirtualId>>> {
        self.children.read().get(parent).cloned()
    }

    /// Assign identities to freshly computed children and cache the list.
    pub fn materialize(&self, parent: ItemRef, specs: Vec<ChildSpec>) -> Arc<Vec<VirtualId>> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut ids = Vec::with_capacity(specs.len());
        {
            let mut records = self.records.write();
            let (stamp, epoch) = (records.stamp, records.epoch);
            for spec in specs {
                let index = {
                    let n = seen.entry(spec.name.clone()).or_insert(0);
                    *n += 1;
                    *n
                };
                let id = virtual_id(&parent, &spec.anchor(), &spec.filter, &spec.name);
                ids.push(id);
                let node = Arc::new(VirtualNode {
                    id,
                    parent,
                    name: spec.name,
                    index,
                    kind: spec.kind,
                    filter: spec.filter,
                });
                records.slots.insert(id, Slot { node, stamp, epoch });
            }
        }
        let ids = Arc::new(ids);
        self.children.write().insert(parent, ids.clone());
        trace!(parent = %parent, children = ids.len(), "Materialized virtual children");
        ids
    }

    /// Drop cached child lists and mark every record as needing recomputation.
    pub fn invalidate(&self) {
        self.children.write().clear();
        self.records.write().stamp += 1;
    }

    /// Invalidate for a new revision and prune records not seen during the
    /// previous one.
    pub fn advance(&self) {
        self.children.write().clear();
        let mut records = self.records.write();
        records.stamp += 1;
        records.epoch += 1;
        let keep_from = records.epoch - 1;
        let before = records.slots.len();
        records.slots.retain(|_, slot| slot.epoch >= keep_from);
        let pruned = before - records.slots.len();
        if pruned > 0 {
            trace!(pruned, remaining = records.slots.len(), "Pruned virtual records");
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().slots.is_empty()
    }
}

/// Source of a node's virtual children
pub enum Provider<'a> {
    /// Projected plain node: its children, filtered when it is a handle
    Plain(&'a PhysicalNode),
    Mirror(&'a PhysicalNode),
    FacetSelect(&'a PhysicalNode),
    FacetNavigation(&'a PhysicalNode),
    Navigation(&'a NavLevel),
    ResultSet(&'a ResultSetSpec),
}

impl<'a> Provider<'a> {
    pub fn for_node(kind: NodeKind, node: &'a PhysicalNode) -> Self {
        match kind {
            NodeKind::Plain => Provider::Plain(node),
            NodeKind::Mirror => Provider::Mirror(node),
            NodeKind::FacetSelect => Provider::FacetSelect(node),
            NodeKind::FacetNavigation => Provider::FacetNavigation(node),
        }
    }

    pub fn for_virtual(kind: &'a VirtualKind) -> Option<Self> {
        match kind {
            VirtualKind::Mirror { .. } => None,
            VirtualKind::Navigation(level) => Some(Provider::Navigation(level)),
            VirtualKind::ResultSet(spec) => Some(Provider::ResultSet(spec)),
        }
    }
}

/// Shared, immutable engine configuration of a repository
pub struct Engine {
    pub types: TypeRegistry,
    pub projector: ViewProjector,
    pub navigator: FacetNavigator,
    pub search: Arc<dyn FacetedSearch>,
    pub observer_capacity: usize,
}

impl Engine {
    pub fn from_config(config: &EngineConfig) -> Self {
        let types = TypeRegistry::new(
            config.alias_map(),
            config.handle_type.clone(),
            config.request_type.clone(),
        );
        let projector = ViewProjector::new(types.clone());
        Self {
            navigator: FacetNavigator::new(Clock::System, config.default_result_limit),
            search: Arc::new(StoreSearch::new(projector.clone())),
            projector,
            types,
            observer_capacity: config.observer_capacity,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn FacetedSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_clock(mut self, clock: Clock, default_result_limit: Option<usize>) -> Self {
        self.navigator = FacetNavigator::new(clock, default_result_limit);
        self
    }

    pub fn kind_of(&self, node: &PhysicalNode) -> NodeKind {
        self.types.kind_of(&node.primary_type)
    }

    /// Compute children for a provider under `filter`.
    pub fn expand(
        &self,
        store: &dyn NodeStore,
        provider: Provider<'_>,
        filter: &FilterState,
    ) -> Result<Vec<ChildSpec>, StorageError> {
        match provider {
            Provider::Plain(upstream) => self.projector.populate_children(store, upstream, filter),
            Provider::Mirror(config) => self
                .projector
                .populate(
                    store,
                    filter,
                    &ViewProjector::docbase_of(config),
                    &Criteria::default(),
                    false,
                )
                .map(|state| state.children),
            Provider::FacetSelect(config) => self
                .projector
                .populate(
                    store,
                    filter,
                    &ViewProjector::docbase_of(config),
                    &ViewProjector::criteria_of(config),
                    true,
                )
                .map(|state| state.children),
            Provider::FacetNavigation(config) => {
                self.navigator
                    .populate_root(store, self.search.as_ref(), &self.projector, config, filter)
            }
            Provider::Navigation(level) => match level.role {
                LevelRole::FacetsAvailable => {
                    self.navigator
                        .populate_available(store, self.search.as_ref(), level, filter)
                }
                LevelRole::SubNavigation => Ok(self.navigator.populate_sub_navigation(level, filter)),
            },
            Provider::ResultSet(spec) => {
                self.navigator
                    .populate_result_set(store, self.search.as_ref(), spec, filter)
            }
        }
    }
}

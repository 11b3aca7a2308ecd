//! View projection
//!
//! Mirrors and facet selects project the subtree under their docbase. Below a
//! handle the variants are filtered by the view, ranked by the order and, in a
//! singled view, reduced to the best one. Other nodes are copied as they are.

use crate::error::StorageError;
use crate::filter::{Criteria, FacetMap, FilterState};
use crate::nodetype::{TypeRegistry, HIPPO_DOCBASE, HIPPO_FACETS, HIPPO_MODES, HIPPO_VALUES};
use crate::store::{ChildEntry, NodeStore, PhysicalNode};
use crate::types::NodeId;
use crate::virtual_tree::ChildSpec;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of projecting a docbase
#[derive(Debug, Clone, Default)]
pub struct ProjectionState {
    pub filter: FilterState,
    pub children: Vec<ChildSpec>,
    /// False when the docbase was rejected and the node stays empty.
    pub populated: bool,
}

impl ProjectionState {
    fn unpopulated(filter: &FilterState) -> Self {
        Self {
            filter: filter.clone(),
            children: Vec::new(),
            populated: false,
        }
    }
}

/// A child considered for projection
pub struct Variant {
    pub position: usize,
    pub entry: ChildEntry,
    pub node: Arc<PhysicalNode>,
    pub is_request: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ViewProjector {
    types: TypeRegistry,
}

impl ViewProjector {
    pub fn new(types: TypeRegistry) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Criteria declared on a facet select node. Absent lists read as empty.
    pub fn criteria_of(node: &PhysicalNode) -> Criteria {
        Criteria::new(
            node.strings(HIPPO_FACETS),
            node.strings(HIPPO_VALUES),
            node.strings(HIPPO_MODES),
        )
    }

    pub fn docbase_of(node: &PhysicalNode) -> String {
        node.string(HIPPO_DOCBASE).unwrap_or_default()
    }

    /// Dereference a docbase given as identifier or absolute path.
    ///
    /// Empty values and system areas (the root included) never resolve; they
    /// are checked before the store is consulted.
    pub fn resolve_docbase(&self, store: &dyn NodeStore, docbase: &str) -> Result<Option<Arc<PhysicalNode>>, StorageError> {
        let docbase = docbase.trim();
        if docbase.is_empty() {
            return Ok(None);
        }
        let id = if docbase.starts_with('/') {
            match store.lookup_path(docbase) {
                Ok(Some(id)) => id,
                Ok(None) | Err(StorageError::InvalidPath(_)) => {
                    warn!(docbase, "Invalid docbase: path does not resolve");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        } else {
            match docbase.parse::<NodeId>() {
                Ok(id) => id,
                Err(_) => {
                    warn!(docbase, "Invalid docbase: not a valid identifier");
                    return Ok(None);
                }
            }
        };
        if id.is_system_area() {
            debug!(docbase, "Docbase names a system area, not projected");
            return Ok(None);
        }
        let node = store.get(&id)?;
        if node.is_none() {
            warn!(docbase, "Invalid docbase: node does not exist");
        }
        Ok(node)
    }

    /// Project `docbase` under the inherited filter state.
    ///
    /// With `new_criteria` the facet select's criteria are composed onto the
    /// inherited state first. The state comes back unpopulated when the
    /// docbase is unusable, the criteria are malformed or the docbase is
    /// itself a mirror or facet select.
    pub fn populate(
        &self,
        store: &dyn NodeStore,
        inherited: &FilterState,
        docbase: &str,
        criteria: &Criteria,
        new_criteria: bool,
    ) -> Result<ProjectionState, StorageError> {
        let upstream = match self.resolve_docbase(store, docbase)? {
            Some(node) => node,
            None => return Ok(ProjectionState::unpopulated(inherited)),
        };

        if new_criteria && !criteria.is_well_formed() {
            warn!(
                facets = criteria.facets.len(),
                values = criteria.values.len(),
                modes = criteria.modes.len(),
                "Malformed facet selection: facets, values and modes must have the same length"
            );
            return Ok(ProjectionState::unpopulated(inherited));
        }

        if self.types.kind_of(&upstream.primary_type).is_projection() {
            warn!(
                docbase,
                "A mirror or facet select may not use another mirror or facet select as docbase"
            );
            return Ok(ProjectionState::unpopulated(inherited));
        }

        let filter = if new_criteria {
            inherited.compose(criteria)
        } else {
            inherited.clone()
        };
        let children = self.populate_children(store, &upstream, &filter)?;
        debug!(
            docbase,
            children = children.len(),
            view = filter.view().len(),
            singled = filter.is_singled_view(),
            "Projected docbase"
        );
        Ok(ProjectionState {
            filter,
            children,
            populated: true,
        })
    }

    /// Children of a projected node, each carrying `filter`.
    pub fn populate_children(
        &self,
        store: &dyn NodeStore,
        upstream: &PhysicalNode,
        filter: &FilterState,
    ) -> Result<Vec<ChildSpec>, StorageError> {
        let variants = if self.types.is_handle(upstream) {
            self.select_variants(store, upstream, filter)?
        } else {
            let mut all = self.variants(store, upstream)?;
            if filter.is_singled_view() {
                all.retain(|v| !v.is_request);
            }
            all
        };
        Ok(variants
            .into_iter()
            .map(|v| ChildSpec::mirror(v.entry.name, v.entry.id, filter.clone()))
            .collect())
    }

    /// Variants of a handle that survive `filter`, best first.
    pub fn select_variants(
        &self,
        store: &dyn NodeStore,
        handle: &PhysicalNode,
        filter: &FilterState,
    ) -> Result<Vec<Variant>, StorageError> {
        let mut variants = self.variants(store, handle)?;
        variants.retain(|v| !(filter.is_singled_view() && v.is_request) && filter.matches(&v.node));
        variants.sort_by(|a, b| compare_variants(a, b, filter.order()));
        if filter.is_singled_view() {
            variants.truncate(1);
        }
        Ok(variants)
    }

    fn variants(&self, store: &dyn NodeStore, parent: &PhysicalNode) -> Result<Vec<Variant>, StorageError> {
        let mut out = Vec::with_capacity(parent.children.len());
        for (position, entry) in parent.children.iter().enumerate() {
            let node = match store.get(&entry.id)? {
                Some(node) => node,
                None => {
                    debug!(child = %entry.id, name = %entry.name, "Skipping dangling child entry");
                    continue;
                }
            };
            let is_request = self.types.is_request(&entry.name, &node);
            out.push(Variant {
                position,
                entry: entry.clone(),
                node,
                is_request,
            });
        }
        Ok(out)
    }
}

/// Total order on variants of one handle.
///
/// For each order facet in turn, a variant carrying the preferred value comes
/// first; a wildcard preference ranks variants having the property, then by
/// value. Requests go last and physical position breaks remaining ties.
pub fn compare_variants(a: &Variant, b: &Variant, order: &FacetMap) -> Ordering {
    for (facet, preferred) in order.iter() {
        let ordering = if preferred.is_empty() || preferred == "*" {
            match (a.node.string(facet), b.node.string(facet)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        } else {
            let a_has = a.node.strings(facet).iter().any(|v| v == preferred);
            let b_has = b.node.strings(facet).iter().any(|v| v == preferred);
            b_has.cmp(&a_has)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.is_request
        .cmp(&b.is_request)
        .then(a.position.cmp(&b.position))
}

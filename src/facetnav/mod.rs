//! Faceted navigation
//!
//! A `hippo:facetnavigation` node expands into alternating levels:
//!
//! - the navigation root lists one facets-available node per configured facet
//! - a facets-available node lists one sub-navigation node per facet value
//!   (or range bucket) found under the current search
//! - a sub-navigation node lists the facets-available nodes again, narrowed by
//!   the values chosen so far
//!
//! Every level also has a `hippo:resultset` child mirroring the matching
//! documents. Re-selecting an already used facet/value combination stops the
//! recursion, which keeps the virtual tree finite.

pub mod display;
pub mod range;
pub mod search;
pub(crate) mod syntax;

use crate::codec::encode_name;
use crate::error::StorageError;
use crate::filter::FilterState;
use crate::nodetype::{HIPPO_DOCBASE, HIPPO_FACETNODENAMES, HIPPO_FACETS, HIPPO_LIMIT, HIPPO_ORDERBY, HIPPO_SORTORDER};
use crate::store::{NodeStore, PhysicalNode};
use crate::types::NodeId;
use crate::view::ViewProjector;
use crate::virtual_tree::{ChildSpec, VirtualKind};
use display::{FacetNodeView, SortBy, SortOrder};
use range::{Clock, FacetRange, ParsedFacet};
use search::{FacetCondition, FacetedQuery, FacetedSearch, OrderBy};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// A facet offered by a navigation node, with its display options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableFacet {
    pub facet: String,
    pub view: FacetNodeView,
}

/// Result set options shared by a whole navigation tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSettings {
    pub limit: Option<usize>,
    pub order_by: Vec<OrderBy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRole {
    FacetsAvailable,
    SubNavigation,
}

/// State of one navigation level
#[derive(Debug, Clone)]
pub struct NavLevel {
    pub role: LevelRole,
    pub docbase: NodeId,
    pub available: Arc<Vec<AvailableFacet>>,
    /// Facet listed by a facets-available level, or chosen by a sub-navigation level
    pub current: AvailableFacet,
    pub search: Vec<FacetCondition>,
    pub ranges: Vec<FacetRange>,
    pub used_combinations: Vec<(String, String)>,
    pub ancestor_and_self_used: Vec<String>,
    pub stop_sub_navigation: bool,
    pub count: usize,
    pub settings: Arc<ResultSettings>,
}

impl NavLevel {
    /// Value chosen at this level, for sub-navigation levels.
    pub fn chosen_value(&self) -> Option<&str> {
        match self.role {
            LevelRole::SubNavigation => self.ancestor_and_self_used.last().map(String::as_str),
            LevelRole::FacetsAvailable => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultSetSpec {
    pub docbase: NodeId,
    pub search: Vec<FacetCondition>,
    pub ranges: Vec<FacetRange>,
    pub count: usize,
    pub settings: Arc<ResultSettings>,
}

#[derive(Debug, Clone, Default)]
pub struct FacetNavigator {
    clock: Clock,
    default_result_limit: Option<usize>,
}

impl FacetNavigator {
    pub fn new(clock: Clock, default_result_limit: Option<usize>) -> Self {
        Self {
            clock,
            default_result_limit,
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn query(&self, docbase: NodeId, search: &[FacetCondition], ranges: &[FacetRange], filter: &FilterState) -> FacetedQuery {
        FacetedQuery {
            docbase,
            search: search.to_vec(),
            ranges: ranges.to_vec(),
            filter: filter.clone(),
            now: self.clock.now(),
        }
    }

    /// Facets declared on a navigation node, paired with their display names.
    pub fn available_facets(config: &PhysicalNode) -> Vec<AvailableFacet> {
        let facets = config.strings(HIPPO_FACETS);
        let mut names = config.strings(HIPPO_FACETNODENAMES);
        if !names.is_empty() && names.len() != facets.len() {
            warn!(
                facets = facets.len(),
                names = names.len(),
                "hippo:facetnodenames does not match hippo:facets, using facet names"
            );
            names.clear();
        }
        facets
            .into_iter()
            .enumerate()
            .map(|(i, facet)| {
                let fallback = facet.split('$').next().unwrap_or(&facet).trim().to_string();
                let view = match names.get(i) {
                    Some(name) => FacetNodeView::parse(name).unwrap_or_else(|e| {
                        warn!(error = %e, "Malformed facet node name, using defaults");
                        FacetNodeView::named(name.split('$').next().unwrap_or(name).trim())
                    }),
                    None => FacetNodeView::named(fallback),
                };
                AvailableFacet { facet, view }
            })
            .collect()
    }

    fn settings(&self, config: &PhysicalNode) -> ResultSettings {
        let limit = config
            .property(HIPPO_LIMIT)
            .and_then(|p| p.first())
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
            .map(|v| v as usize)
            .or(self.default_result_limit);
        let sort_orders = config.strings(HIPPO_SORTORDER);
        let order_by = config
            .strings(HIPPO_ORDERBY)
            .into_iter()
            .enumerate()
            .map(|(i, property)| OrderBy {
                property,
                descending: sort_orders
                    .get(i)
                    .map(|o| o.eq_ignore_ascii_case("descending"))
                    .unwrap_or(false),
            })
            .collect();
        ResultSettings { limit, order_by }
    }

    /// Children of a physical navigation node.
    pub fn populate_root(
        &self,
        store: &dyn NodeStore,
        search: &dyn FacetedSearch,
        projector: &ViewProjector,
        config: &PhysicalNode,
        filter: &FilterState,
    ) -> Result<Vec<ChildSpec>, StorageError> {
        let docbase = config.string(HIPPO_DOCBASE).unwrap_or_default();
        let docbase = match projector.resolve_docbase(store, &docbase)? {
            Some(node) => node.id,
            None => return Ok(Vec::new()),
        };
        let available = Arc::new(Self::available_facets(config));
        let settings = Arc::new(self.settings(config));
        let total = search.count(store, &self.query(docbase, &[], &[], filter), None)?.total;

        let mut children: Vec<ChildSpec> = available
            .iter()
            .map(|facet| {
                let level = NavLevel {
                    role: LevelRole::FacetsAvailable,
                    docbase,
                    available: available.clone(),
                    current: facet.clone(),
                    search: Vec::new(),
                    ranges: Vec::new(),
                    used_combinations: Vec::new(),
                    ancestor_and_self_used: Vec::new(),
                    stop_sub_navigation: false,
                    count: total,
                    settings: settings.clone(),
                };
                ChildSpec::navigation(encode_name(&facet.view.display_name), level, filter.clone())
            })
            .collect();
        children.push(ChildSpec::result_set(
            ResultSetSpec {
                docbase,
                search: Vec::new(),
                ranges: Vec::new(),
                count: total,
                settings,
            },
            filter.clone(),
        ));
        debug!(docbase = %docbase, facets = available.len(), total, "Populated navigation root");
        Ok(children)
    }

    /// Children of a facets-available level: one node per value of the current facet.
    pub fn populate_available(
        &self,
        store: &dyn NodeStore,
        search: &dyn FacetedSearch,
        level: &NavLevel,
        filter: &FilterState,
    ) -> Result<Vec<ChildSpec>, StorageError> {
        let parsed = match ParsedFacet::parse(&level.current.facet) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    facet = %level.current.facet,
                    error = %e,
                    "Malformed facet range configuration, expected prop$[{{name:'x', resolution:'double', begin:0, end:10}}]"
                );
                return Ok(Vec::new());
            }
        };

        let query = self.query(level.docbase, &level.search, &level.ranges, filter);
        let counts = search.count(store, &query, Some(&parsed))?;
        let mut entries: Vec<(String, usize)> = counts.buckets.into_iter().collect();
        let preferred = filter
            .order()
            .get(&parsed.property)
            .filter(|p| !p.is_empty() && *p != "*");
        entries.sort_by(|a, b| compare_entries(a, b, &parsed, &level.current.view, preferred));

        let mut children = Vec::new();
        for (value, count) in entries {
            if value.is_empty() {
                continue;
            }
            if let Some(limit) = level.current.view.limit {
                if children.len() >= limit {
                    debug!(limit, "Reached configured limit of facet values");
                    break;
                }
            }

            let mut search = level.search.clone();
            let mut ranges = level.ranges.clone();
            match parsed.range(&value) {
                Some(range) if parsed.is_range() => ranges.push(range.clone()),
                _ => search.push(FacetCondition::equals(parsed.property.clone(), value.clone())),
            }

            let combination = (level.current.facet.clone(), value.clone());
            let mut used_combinations = level.used_combinations.clone();
            let mut stop_sub_navigation = level.stop_sub_navigation;
            if !used_combinations.contains(&combination) {
                used_combinations.push(combination);
                stop_sub_navigation = false;
            }
            let mut ancestor_and_self_used = level.ancestor_and_self_used.clone();
            ancestor_and_self_used.push(value.clone());

            let child = NavLevel {
                role: LevelRole::SubNavigation,
                docbase: level.docbase,
                available: level.available.clone(),
                current: level.current.clone(),
                search,
                ranges,
                used_combinations,
                ancestor_and_self_used,
                stop_sub_navigation,
                count,
                settings: level.settings.clone(),
            };
            children.push(ChildSpec::navigation(encode_name(&value), child, filter.clone()));
        }

        let mut result_search = level.search.clone();
        result_search.push(FacetCondition::exists(parsed.property.clone()));
        let result_query = self.query(level.docbase, &result_search, &level.ranges, filter);
        let result_count = search.count(store, &result_query, None)?.total;
        children.push(ChildSpec::result_set(
            ResultSetSpec {
                docbase: level.docbase,
                search: result_search,
                ranges: level.ranges.clone(),
                count: result_count,
                settings: level.settings.clone(),
            },
            filter.clone(),
        ));
        Ok(children)
    }

    /// Children of a sub-navigation level: the available facets again, unless stopped.
    pub fn populate_sub_navigation(&self, level: &NavLevel, filter: &FilterState) -> Vec<ChildSpec> {
        let mut children = Vec::new();
        if !level.stop_sub_navigation {
            for facet in level.available.iter() {
                let stop = level
                    .used_combinations
                    .iter()
                    .any(|(used, _)| *used == facet.facet);
                let child = NavLevel {
                    role: LevelRole::FacetsAvailable,
                    docbase: level.docbase,
                    available: level.available.clone(),
                    current: facet.clone(),
                    search: level.search.clone(),
                    ranges: level.ranges.clone(),
                    used_combinations: level.used_combinations.clone(),
                    ancestor_and_self_used: level.ancestor_and_self_used.clone(),
                    stop_sub_navigation: stop,
                    count: level.count,
                    settings: level.settings.clone(),
                };
                children.push(ChildSpec::navigation(
                    encode_name(&facet.view.display_name),
                    child,
                    filter.clone(),
                ));
            }
        }
        children.push(ChildSpec::result_set(
            ResultSetSpec {
                docbase: level.docbase,
                search: level.search.clone(),
                ranges: level.ranges.clone(),
                count: level.count,
                settings: level.settings.clone(),
            },
            filter.clone(),
        ));
        children
    }

    /// Mirrors of the documents in a result set.
    pub fn populate_result_set(
        &self,
        store: &dyn NodeStore,
        search: &dyn FacetedSearch,
        spec: &ResultSetSpec,
        filter: &FilterState,
    ) -> Result<Vec<ChildSpec>, StorageError> {
        let query = self.query(spec.docbase, &spec.search, &spec.ranges, filter);
        let ids = search.documents(store, &query, &spec.settings.order_by, spec.settings.limit)?;
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = store.get(&id)? {
                children.push(ChildSpec::mirror(node.name.clone(), id, filter.clone()));
            }
        }
        Ok(children)
    }
}

impl ChildSpec {
    fn navigation(name: String, level: NavLevel, filter: FilterState) -> Self {
        ChildSpec {
            name,
            kind: VirtualKind::Navigation(Box::new(level)),
            filter,
        }
    }

    fn result_set(spec: ResultSetSpec, filter: FilterState) -> Self {
        ChildSpec {
            name: crate::nodetype::HIPPO_RESULTSET.to_string(),
            kind: VirtualKind::ResultSet(Box::new(spec)),
            filter,
        }
    }
}

/// Ordering of facet values within a level.
///
/// A value preferred by the inherited order comes first. Otherwise the level's
/// display options decide, with the value itself as tie-breaker.
fn compare_entries(
    a: &(String, usize),
    b: &(String, usize),
    facet: &ParsedFacet,
    view: &FacetNodeView,
    preferred: Option<&str>,
) -> Ordering {
    if let Some(preferred) = preferred {
        let ordering = (b.0 == preferred).cmp(&(a.0 == preferred));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let natural = match view.sort_by {
        SortBy::Count => a.1.cmp(&b.1),
        SortBy::FacetValue => a.0.cmp(&b.0),
        SortBy::Config if facet.is_range() => {
            let position = |name: &str| facet.ranges.iter().position(|r| r.name == name);
            position(&a.0).cmp(&position(&b.0))
        }
        SortBy::Config => a.0.cmp(&b.0),
    };
    let directed = match view.sort_order {
        SortOrder::Ascending => natural,
        SortOrder::Descending => natural.reverse(),
    };
    directed.then_with(|| a.0.cmp(&b.0))
}

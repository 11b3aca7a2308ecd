//! Faceted search over the document store
//!
//! [`FacetedSearch`] is the boundary to whatever answers facet queries. The
//! bundled [`StoreSearch`] walks the docbase subtree directly: every variant
//! below a handle is a candidate document, selected with the same view,
//! order and single-view rules that mirrors use, so that navigation counts
//! agree with what a mirror of the same docbase shows.

use crate::error::StorageError;
use crate::facetnav::range::{FacetRange, ParsedFacet};
use crate::filter::FilterState;
use crate::store::{NodeStore, PhysicalNode, PropertyValue};
use crate::types::NodeId;
use crate::view::ViewProjector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// One search term: `value == None` only requires the property to exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetCondition {
    pub facet: String,
    pub value: Option<String>,
}

impl FacetCondition {
    pub fn equals(facet: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            facet: facet.into(),
            value: Some(value.into()),
        }
    }

    pub fn exists(facet: impl Into<String>) -> Self {
        Self {
            facet: facet.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub property: String,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct FacetedQuery {
    pub docbase: NodeId,
    pub search: Vec<FacetCondition>,
    pub ranges: Vec<FacetRange>,
    pub filter: FilterState,
    pub now: DateTime<Utc>,
}

/// Documents matching a query, and per-value counts of the requested facet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCounts {
    pub total: usize,
    pub buckets: BTreeMap<String, usize>,
}

pub trait FacetedSearch: Send + Sync {
    fn count(
        &self,
        store: &dyn NodeStore,
        query: &FacetedQuery,
        facet: Option<&ParsedFacet>,
    ) -> Result<FacetCounts, StorageError>;

    /// Matching documents in result order, at most `limit` of them.
    fn documents(
        &self,
        store: &dyn NodeStore,
        query: &FacetedQuery,
        order_by: &[OrderBy],
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>, StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct StoreSearch {
    projector: ViewProjector,
}

impl StoreSearch {
    pub fn new(projector: ViewProjector) -> Self {
        Self { projector }
    }

    /// Candidate documents in depth-first document order.
    fn matching(&self, store: &dyn NodeStore, query: &FacetedQuery) -> Result<Vec<Arc<PhysicalNode>>, StorageError> {
        let mut out = Vec::new();
        let root = match store.get(&query.docbase)? {
            Some(root) => root,
            None => return Ok(out),
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.projector.types().is_handle(&node) {
                for variant in self.projector.select_variants(store, &node, &query.filter)? {
                    if !variant.is_request && satisfies(&variant.node, query) {
                        out.push(variant.node);
                    }
                }
                continue;
            }
            for entry in node.children.iter().rev() {
                if let Some(child) = store.get(&entry.id)? {
                    stack.push(child);
                }
            }
        }
        Ok(out)
    }
}

fn satisfies(node: &PhysicalNode, query: &FacetedQuery) -> bool {
    let terms = query.search.iter().all(|condition| match node.property(&condition.facet) {
        None => false,
        Some(property) => match &condition.value {
            None => !property.values.is_empty(),
            Some(expected) => property.values.iter().any(|v| &v.as_string() == expected),
        },
    });
    terms
        && query.ranges.iter().all(|range| match node.property(&range.property) {
            Some(property) => range.matches(&property.values, query.now),
            None => false,
        })
}

fn compare_documents(a: &PhysicalNode, b: &PhysicalNode, order_by: &[OrderBy]) -> Ordering {
    for key in order_by {
        let ordering = match (
            a.property(&key.property).and_then(|p| p.first()),
            b.property(&key.property).and_then(|p| p.first()),
        ) {
            (Some(x), Some(y)) => {
                let natural = x.compare(y);
                if key.descending {
                    natural.reverse()
                } else {
                    natural
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl FacetedSearch for StoreSearch {
    fn count(
        &self,
        store: &dyn NodeStore,
        query: &FacetedQuery,
        facet: Option<&ParsedFacet>,
    ) -> Result<FacetCounts, StorageError> {
        let documents = self.matching(store, query)?;
        let mut counts = FacetCounts {
            total: documents.len(),
            buckets: BTreeMap::new(),
        };
        let facet = match facet {
            Some(facet) => facet,
            None => return Ok(counts),
        };
        for document in &documents {
            let values: &[PropertyValue] = match document.property(&facet.property) {
                Some(property) => &property.values,
                None => continue,
            };
            if facet.is_range() {
                for range in &facet.ranges {
                    if range.matches(values, query.now) {
                        *counts.buckets.entry(range.name.clone()).or_insert(0) += 1;
                    }
                }
            } else {
                let distinct: BTreeSet<String> = values.iter().map(PropertyValue::as_string).collect();
                for value in distinct {
                    *counts.buckets.entry(value).or_insert(0) += 1;
                }
            }
        }
        debug!(
            facet = %facet.property,
            total = counts.total,
            buckets = counts.buckets.len(),
            "Counted facet values"
        );
        Ok(counts)
    }

    fn documents(
        &self,
        store: &dyn NodeStore,
        query: &FacetedQuery,
        order_by: &[OrderBy],
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>, StorageError> {
        let mut documents = self.matching(store, query)?;
        if !order_by.is_empty() {
            documents.sort_by(|a, b| compare_documents(a, b, order_by));
        }
        if let Some(limit) = limit {
            documents.truncate(limit);
        }
        Ok(documents.iter().map(|d| d.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tree::{Mutation, Tree};
    use crate::store::Property;

    fn add(tree: &mut Tree, parent: NodeId, name: &str, primary_type: &str, props: Vec<Property>) -> NodeId {
        let id = NodeId::new_random();
        tree.apply(&Mutation::AddNode {
            parent,
            id,
            name: name.to_string(),
            primary_type: primary_type.to_string(),
            mixins: Vec::new(),
        })
        .unwrap();
        for property in props {
            tree.apply(&Mutation::SetProperty { id, property }).unwrap();
        }
        id
    }

    fn car(tree: &mut Tree, parent: NodeId, name: &str, brand: &str, price: f64) {
        let handle = add(tree, parent, name, "hippo:handle", Vec::new());
        add(
            tree,
            handle,
            name,
            "hippo:document",
            vec![
                Property::string("brand", brand),
                Property::single("price", PropertyValue::Double(price)),
            ],
        );
    }

    fn fixture() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let cars = add(&mut tree, NodeId::root(), "cars", "nt:unstructured", Vec::new());
        car(&mut tree, cars, "a", "bmw", 30000.0);
        car(&mut tree, cars, "b", "audi", 20000.0);
        car(&mut tree, cars, "c", "bmw", 10000.0);
        (tree, cars)
    }

    fn query(docbase: NodeId, search: Vec<FacetCondition>) -> FacetedQuery {
        FacetedQuery {
            docbase,
            search,
            ranges: Vec::new(),
            filter: FilterState::default(),
            now: Utc::now(),
        }
    }

    #[test]
    fn test_counts_per_value() {
        let (tree, cars) = fixture();
        let search = StoreSearch::default();
        let facet = ParsedFacet::parse("brand").unwrap();
        let counts = search.count(&tree, &query(cars, Vec::new()), Some(&facet)).unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.buckets.get("bmw"), Some(&2));
        assert_eq!(counts.buckets.get("audi"), Some(&1));
    }

    #[test]
    fn test_search_narrows() {
        let (tree, cars) = fixture();
        let search = StoreSearch::default();
        let q = query(cars, vec![FacetCondition::equals("brand", "bmw")]);
        assert_eq!(search.count(&tree, &q, None).unwrap().total, 2);
    }

    #[test]
    fn test_range_buckets() {
        let (tree, cars) = fixture();
        let search = StoreSearch::default();
        let facet = ParsedFacet::parse(
            "price$[{name:'cheap', resolution:'double', end:15000}, {name:'pricey', resolution:'double', begin:15000}]",
        )
        .unwrap();
        let counts = search.count(&tree, &query(cars, Vec::new()), Some(&facet)).unwrap();
        assert_eq!(counts.buckets.get("cheap"), Some(&1));
        assert_eq!(counts.buckets.get("pricey"), Some(&2));
    }

    #[test]
    fn test_documents_ordered_and_limited() {
        let (tree, cars) = fixture();
        let search = StoreSearch::default();
        let order = vec![OrderBy {
            property: "price".to_string(),
            descending: false,
        }];
        let docs = search.documents(&tree, &query(cars, Vec::new()), &order, Some(2)).unwrap();
        let prices: Vec<String> = docs
            .iter()
            .map(|id| tree.node(id).unwrap().string("price").unwrap())
            .collect();
        assert_eq!(prices, vec!["10000", "20000"]);
    }
}

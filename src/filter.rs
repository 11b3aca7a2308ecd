//! Filter state carried through virtual trees
//!
//! A filter state is an immutable value: every composition step returns a new
//! state, so sibling branches of a virtual tree never observe each other's
//! criteria. The `view` pins facet values, the `order` ranks variants by
//! preference and `singled_view` collapses a handle to its best variant.

use crate::store::PhysicalNode;
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered facet to value map with value semantics
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetMap {
    entries: Vec<(String, String)>,
}

impl FacetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, facet: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| f == facet)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, facet: &str) -> bool {
        self.get(facet).is_some()
    }

    /// Copy with `facet` set to `value`. An existing facet keeps its position.
    pub fn with(&self, facet: &str, value: &str) -> Self {
        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|(f, _)| f == facet) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((facet.to_string(), value.to_string())),
        }
        Self { entries }
    }

    /// Copy without `facet`.
    pub fn without(&self, facet: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(f, _)| f != facet)
                .cloned()
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FacetMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter().fold(FacetMap::new(), |map, (f, v)| map.with(f, v))
    }
}

/// How a criterion composes into a filter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetMode {
    /// Pin the facet in the view
    Stick,
    Select,
    /// Pin and collapse handles to a single variant
    Single,
    /// Rank variants with this value first
    Prefer,
    PreferSingle,
    /// Remove the facet from the view
    Clear,
}

impl FacetMode {
    /// Case-insensitive; unknown modes yield `None`.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "stick" => Some(FacetMode::Stick),
            "select" => Some(FacetMode::Select),
            "single" => Some(FacetMode::Single),
            "prefer" => Some(FacetMode::Prefer),
            "prefer-single" => Some(FacetMode::PreferSingle),
            "clear" => Some(FacetMode::Clear),
            _ => None,
        }
    }
}

/// Criteria declared on a facet select node: parallel facet, value and mode lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub facets: Vec<String>,
    pub values: Vec<String>,
    pub modes: Vec<String>,
}

impl Criteria {
    pub fn new(facets: Vec<String>, values: Vec<String>, modes: Vec<String>) -> Self {
        Self { facets, values, modes }
    }

    /// The three lists must have equal length.
    pub fn is_well_formed(&self) -> bool {
        self.facets.len() == self.values.len() && self.values.len() == self.modes.len()
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

/// Immutable filter state
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    view: FacetMap,
    order: FacetMap,
    singled_view: bool,
}

impl FilterState {
    pub fn new(view: FacetMap, order: FacetMap, singled_view: bool) -> Self {
        Self {
            view,
            order,
            singled_view,
        }
    }

    pub fn view(&self) -> &FacetMap {
        &self.view
    }

    pub fn order(&self) -> &FacetMap {
        &self.order
    }

    pub fn has_order(&self) -> bool {
        !self.order.is_empty()
    }

    pub fn is_singled_view(&self) -> bool {
        self.singled_view
    }

    /// Compose one criterion. Unrecognised modes leave the state unchanged.
    pub fn apply(&self, facet: &str, value: &str, mode: &str) -> FilterState {
        let mode = match FacetMode::parse(mode) {
            Some(mode) => mode,
            None => {
                debug!(facet, mode, "Ignoring unrecognised facet mode");
                return self.clone();
            }
        };
        let mut next = self.clone();
        match mode {
            FacetMode::Stick | FacetMode::Select => next.view = self.view.with(facet, value),
            FacetMode::Single => {
                next.view = self.view.with(facet, value);
                next.singled_view = true;
            }
            FacetMode::Prefer => next.order = self.order.with(facet, value),
            FacetMode::PreferSingle => {
                next.order = self.order.with(facet, value);
                next.singled_view = true;
            }
            FacetMode::Clear => next.view = self.view.without(facet),
        }
        next
    }

    /// Fold criteria in declaration order.
    pub fn compose(&self, criteria: &Criteria) -> FilterState {
        criteria
            .facets
            .iter()
            .zip(&criteria.values)
            .zip(&criteria.modes)
            .fold(self.clone(), |state, ((facet, value), mode)| state.apply(facet, value, mode))
    }

    /// Whether a variant satisfies every pinned facet of the view.
    ///
    /// A missing property never matches. An empty or `*` value only requires
    /// the property to exist; otherwise one of its values must equal the pin.
    pub fn matches(&self, node: &PhysicalNode) -> bool {
        self.view.iter().all(|(facet, pinned)| match node.property(facet) {
            None => false,
            Some(property) => {
                if pinned.is_empty() || pinned == "*" {
                    true
                } else {
                    property.values.iter().any(|v| v.as_string() == pinned)
                }
            }
        })
    }

    /// Stable digest over view, order and singled flag.
    pub fn fingerprint(&self) -> Hash {
        match bincode::serialize(self) {
            Ok(bytes) => *blake3::hash(&bytes).as_bytes(),
            // Only strings and a bool are serialized; fall back to the debug form.
            Err(_) => *blake3::hash(format!("{:?}", self).as_bytes()).as_bytes(),
        }
    }
}

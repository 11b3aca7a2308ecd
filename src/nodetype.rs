//! Node types and provider selection
//!
//! Behaviour of a node is chosen from its primary type. Custom types map onto
//! the built-in kinds through configured aliases; everything else is plain.

use crate::store::PhysicalNode;
use std::collections::HashMap;

pub const NT_ROOT: &str = "rep:root";
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
pub const NT_HANDLE: &str = "hippo:handle";
pub const NT_DOCUMENT: &str = "hippo:document";
pub const NT_REQUEST: &str = "hippo:request";
pub const NT_MIRROR: &str = "hippo:mirror";
pub const NT_FACETSELECT: &str = "hippo:facetselect";
pub const NT_FACETNAVIGATION: &str = "hippo:facetnavigation";
pub const NT_FACETSAVAILABLE: &str = "hippo:facetsavailablenavigation";
pub const NT_FACETSUBNAVIGATION: &str = "hippo:facetsubnavigation";
pub const NT_FACETRESULT: &str = "hippo:facetresult";

pub const HIPPO_DOCBASE: &str = "hippo:docbase";
pub const HIPPO_FACETS: &str = "hippo:facets";
pub const HIPPO_VALUES: &str = "hippo:values";
pub const HIPPO_MODES: &str = "hippo:modes";
pub const HIPPO_DISCRIMINATOR: &str = "hippo:discriminator";
pub const HIPPO_COUNT: &str = "hippo:count";
pub const HIPPO_FACETNODENAMES: &str = "hippo:facetnodenames";
pub const HIPPO_LIMIT: &str = "hippo:limit";
pub const HIPPO_ORDERBY: &str = "hippo:orderby";
pub const HIPPO_SORTORDER: &str = "hippo:sortorder";
pub const HIPPO_RESULTSET: &str = "hippo:resultset";

/// Provider capability of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Plain,
    Mirror,
    FacetSelect,
    FacetNavigation,
}

impl NodeKind {
    /// Mirrors and facet selects project a docbase.
    pub fn is_projection(&self) -> bool {
        matches!(self, NodeKind::Mirror | NodeKind::FacetSelect)
    }
}

/// Resolves primary types, following configured aliases.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    aliases: HashMap<String, String>,
    handle_type: String,
    request_type: String,
}

const MAX_ALIAS_DEPTH: usize = 8;

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(HashMap::new(), NT_HANDLE.to_string(), NT_REQUEST.to_string())
    }
}

impl TypeRegistry {
    pub fn new(aliases: HashMap<String, String>, handle_type: String, request_type: String) -> Self {
        Self {
            aliases,
            handle_type,
            request_type,
        }
    }

    /// Follow aliases until a type without alias is reached.
    pub fn resolve<'a>(&'a self, primary_type: &'a str) -> &'a str {
        let mut current = primary_type;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.aliases.get(current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    pub fn kind_of(&self, primary_type: &str) -> NodeKind {
        match self.resolve(primary_type) {
            NT_MIRROR => NodeKind::Mirror,
            NT_FACETSELECT => NodeKind::FacetSelect,
            NT_FACETNAVIGATION => NodeKind::FacetNavigation,
            _ => NodeKind::Plain,
        }
    }

    pub fn is_handle(&self, node: &PhysicalNode) -> bool {
        self.resolve(&node.primary_type) == self.handle_type
    }

    /// Pending workflow requests: excluded from single views, sorted last otherwise.
    pub fn is_request(&self, name: &str, node: &PhysicalNode) -> bool {
        name == self.request_type || self.resolve(&node.primary_type) == self.request_type
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }
}

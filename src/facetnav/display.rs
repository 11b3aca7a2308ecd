//! Display options of a facet level
//!
//! Entries of `hippo:facetnodenames` name the facets-available nodes and may
//! carry sorting options: `Brand${sortby:'facetvalue', sortorder:'ascending', limit:10}`.

use crate::error::FacetConfigError;
use crate::facetnav::syntax::{lookup, parse_object};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    Count,
    FacetValue,
    /// Declaration order of range buckets; plain facets fall back to value order
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetNodeView {
    pub display_name: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

impl FacetNodeView {
    /// Defaults: count, descending, unlimited.
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            limit: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, FacetConfigError> {
        let malformed = |reason: String| FacetConfigError::Malformed {
            facet: text.to_string(),
            reason,
        };
        let (name, options) = match text.split_once('$') {
            Some((name, options)) => (name.trim(), Some(options.trim())),
            None => (text.trim(), None),
        };
        if name.is_empty() {
            return Err(malformed("display name is empty".to_string()));
        }
        let mut view = Self::named(name);
        let options = match options {
            Some(options) => parse_object(options).map_err(malformed)?,
            None => return Ok(view),
        };
        if let Some(sort_by) = lookup(&options, "sortby") {
            view.sort_by = match sort_by.to_ascii_lowercase().as_str() {
                "count" => SortBy::Count,
                "facetvalue" => SortBy::FacetValue,
                "config" => SortBy::Config,
                other => return Err(malformed(format!("unknown sortby '{}'", other))),
            };
        }
        if let Some(order) = lookup(&options, "sortorder") {
            view.sort_order = match order.to_ascii_lowercase().as_str() {
                "ascending" => SortOrder::Ascending,
                "descending" => SortOrder::Descending,
                other => return Err(malformed(format!("unknown sortorder '{}'", other))),
            };
        }
        if let Some(limit) = lookup(&options, "limit") {
            let limit: i64 = limit
                .parse()
                .map_err(|_| malformed(format!("limit '{}' is not a number", limit)))?;
            view.limit = usize::try_from(limit).ok();
        }
        Ok(view)
    }
}

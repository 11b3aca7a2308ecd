//! Integration tests for facetview

mod cli;
mod facet_navigation;
mod facet_select;
mod observation;
mod path_resolution;
mod persistence;
mod properties;
mod support;

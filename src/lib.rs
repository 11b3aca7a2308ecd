//! facetview: virtual content views over a hierarchical document store
//!
//! Certain node types in the store do not hold their children themselves.
//! Their children are computed on demand from other content:
//!
//! - a mirror re-exposes the subtree under its docbase
//! - a facet select does the same with a view filter, an order and optional
//!   single-variant selection applied below document handles
//! - a facet navigation node expands into a browsable tree of facet values
//!   with document counts and result sets
//!
//! Virtual items get stable, deterministic identifiers and are read through
//! the same [`NodeRead`] API as stored ones. An extended path language
//! resolves through both kinds of item, and [`ModelObserver`] maps change
//! events on physical nodes back to the virtual items a consumer is showing.

pub mod codec;
pub mod config;
pub mod error;
pub mod facetnav;
pub mod filter;
pub mod identity;
pub mod logging;
pub mod nodetype;
pub mod observation;
pub mod path;
pub mod read;
pub mod session;
pub mod store;
pub mod tooling;
pub mod types;
pub mod view;
pub mod virtual_tree;

pub use config::{ConfigLoader, EngineConfig, ViewConfig};
pub use error::{ApiError, FacetConfigError, PathError, StorageError};
pub use filter::{FacetMode, FilterState};
pub use observation::{ModelObserver, ObservationBridge, ReferenceState};
pub use path::PathResolver;
pub use read::NodeRead;
pub use session::Session;
pub use store::{ChangeEvent, PhysicalNode, Property, PropertyValue, Repository};
pub use types::{ItemRef, NodeId, VirtualId};
pub use virtual_tree::{Engine, VirtualNode};

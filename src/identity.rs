//! Virtual node identity
//!
//! A virtual node's id is a blake3 digest over its parent's identity, the
//! anchor it was produced from, its filter fingerprint and its name. The same
//! upstream node projected under two different parents or filter states
//! therefore gets two distinct ids, while recomputing a tree after a refresh
//! reproduces the same ids.

use crate::filter::FilterState;
use crate::types::{ItemRef, NodeId, VirtualId};
use serde::Serialize;

const DOMAIN: &[u8] = b"facetview.virtual.v1";

/// What a virtual node stands for within its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Anchor<'a> {
    /// Projection of a physical node
    Node(NodeId),
    /// Facet level (`value == None`) or facet value below it
    Facet { facet: &'a str, value: Option<&'a str> },
    ResultSet,
}

#[derive(Serialize)]
struct IdentityKey<'a> {
    parent: &'a ItemRef,
    anchor: &'a Anchor<'a>,
    name: &'a str,
}

/// Compute the id of a virtual child.
pub fn virtual_id(parent: &ItemRef, anchor: &Anchor<'_>, filter: &FilterState, name: &str) -> VirtualId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN);
    let key = IdentityKey { parent, anchor, name };
    match bincode::serialize(&key) {
        Ok(bytes) => {
            hasher.update(&bytes);
        }
        Err(_) => {
            hasher.update(format!("{:?}/{:?}/{}", parent, anchor, name).as_bytes());
        }
    }
    hasher.update(&filter.fingerprint());
    VirtualId(*hasher.finalize().as_bytes())
}

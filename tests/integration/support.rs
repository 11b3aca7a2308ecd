use std::path::PathBuf;
use std::sync::Arc;

use facetview::nodetype::HIPPO_COUNT;
use facetview::store::fixture;
use facetview::{EngineConfig, ItemRef, NodeId, NodeRead, PropertyValue, Repository, Session};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Load fixtures into a fresh session and commit them.
pub fn load(repository: &Arc<Repository>, fixtures: &[&str]) {
    let mut session = repository.login();
    for name in fixtures {
        fixture::load_file(&mut session, NodeId::root(), fixture_path(name)).unwrap();
    }
    session.save().unwrap();
}

pub fn repository(config: &EngineConfig, fixtures: &[&str]) -> Arc<Repository> {
    let repository = Repository::in_memory(config);
    load(&repository, fixtures);
    repository
}

/// Follow child names from the root, taking the first same-name sibling.
pub fn walk(session: &Session, names: &[&str]) -> ItemRef {
    let mut current = session.root();
    for name in names {
        current = *session
            .children_named(current, name)
            .unwrap()
            .first()
            .unwrap_or_else(|| panic!("no child {:?} below {}", name, session.path(current).unwrap()));
    }
    current
}

pub fn names(session: &Session, item: ItemRef) -> Vec<String> {
    session
        .children(item)
        .unwrap()
        .into_iter()
        .map(|child| session.name(child).unwrap())
        .collect()
}

pub fn string(session: &Session, item: ItemRef, property: &str) -> Option<String> {
    session
        .property(item, property)
        .unwrap()
        .and_then(|p| p.first().map(PropertyValue::as_string))
}

pub fn count(session: &Session, item: ItemRef) -> i64 {
    match session.property(item, HIPPO_COUNT).unwrap().and_then(|p| p.first().cloned()) {
        Some(PropertyValue::Long(count)) => count,
        other => panic!("expected a hippo:count, got {:?}", other),
    }
}

/// Facet values below a facets-available node with their counts.
pub fn value_counts(session: &Session, item: ItemRef) -> Vec<(String, i64)> {
    session
        .children(item)
        .unwrap()
        .into_iter()
        .filter(|child| session.name(*child).unwrap() != "hippo:resultset")
        .map(|child| (session.name(child).unwrap(), count(session, child)))
        .collect()
}

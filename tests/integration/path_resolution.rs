use facetview::path::{PathResolver, Resolved, ResolutionEntry};
use facetview::{ApiError, EngineConfig, ItemRef, NodeRead, Property, PropertyValue};

use crate::support::{repository, string};

#[test]
fn absolute_path_through_mirror() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let resolver = PathResolver::new(&session);

    let second = resolver
        .get_node(session.root(), "/test/mirror/article/article[2]")
        .unwrap()
        .unwrap();
    assert!(second.is_virtual());
    assert_eq!(string(&session, second, "state").as_deref(), Some("published"));
    assert_eq!(string(&session, second, "language").as_deref(), Some("en"));

    assert_eq!(resolver.get_node(session.root(), "/test/docs/nothing").unwrap(), None);
    assert_eq!(
        resolver.get_node(session.root(), "/test/mirror/article/article[9]").unwrap(),
        None
    );
}

#[test]
fn conditions_select_among_same_name_siblings() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let resolver = PathResolver::new(&session);

    let physical = resolver
        .get_node(session.root(), "/test/docs/article/article[state='published', language='nl']")
        .unwrap()
        .unwrap();
    assert!(!physical.is_virtual());

    let projected = resolver
        .get_node(session.root(), "/test/mirror/article/article[@language=nl]")
        .unwrap()
        .unwrap();
    assert!(projected.is_virtual());
    assert_eq!(session.canonical(projected).unwrap(), physical.physical());

    let existing = resolver
        .get_node(session.root(), "/test/docs/doc/doc[state]")
        .unwrap();
    assert!(existing.is_some());
    let missing = resolver
        .get_node(session.root(), "/test/docs/doc/doc[language]")
        .unwrap();
    assert_eq!(missing, None);
}

#[test]
fn computed_names_come_from_the_context_node() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let resolver = PathResolver::new(&session);

    let handle = session.node_by_path("/test/docs/article").unwrap().unwrap();
    let first = resolver.get_node(handle, "{.}").unwrap().unwrap();
    assert_eq!(session.name(first).unwrap(), "article");
    assert_eq!(session.parent(first).unwrap(), Some(handle));

    let variant = session.node_by_path("/test/docs/article/article[3]").unwrap().unwrap();
    let first_sibling = resolver.get_node(variant, "../{.}").unwrap().unwrap();
    assert_eq!(first_sibling, first);
    let second = resolver.get_node(variant, "../article[2]").unwrap().unwrap();
    assert_eq!(session.index(second).unwrap(), 2);
}

#[test]
fn property_paths_and_partial_matches() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let resolver = PathResolver::new(&session);

    let state = resolver
        .get_property(session.root(), "/test/mirror/doc/doc/state", None)
        .unwrap()
        .unwrap();
    assert_eq!(state.first(), Some(&PropertyValue::String("published".to_string())));

    let mut entry = ResolutionEntry::default();
    let absent = resolver
        .get_property(session.root(), "/test/docs/doc/doc/title", Some(&mut entry))
        .unwrap();
    assert_eq!(absent, None);
    assert_eq!(entry.node, session.node_by_path("/test/docs/doc/doc").unwrap());
    assert_eq!(entry.rel_path.as_deref(), Some("title"));

    let mut entry = ResolutionEntry::default();
    let resolved = resolver
        .get_item(session.root(), "/test/docs/doc/missing/deeper", false, Some(&mut entry))
        .unwrap();
    assert_eq!(resolved, None);
    assert_eq!(entry.node, session.node_by_path("/test/docs/doc").unwrap());
    assert_eq!(entry.rel_path.as_deref(), Some("missing"));
}

#[test]
fn identifier_segment_jumps_to_referenced_node() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let mut session = repo.login();
    let handle = session.node_by_path("/test/docs/doc").unwrap().unwrap();
    let test = session.node_by_path("/test").unwrap().unwrap();
    let link = session
        .add_node(test.physical().unwrap(), "link", "nt:unstructured")
        .unwrap();
    session
        .set_property(
            link,
            Property::single("target", PropertyValue::Reference(handle.physical().unwrap())),
        )
        .unwrap();

    let resolver = PathResolver::new(&session);
    let document = resolver
        .get_node(ItemRef::Physical(link), "{target}/doc")
        .unwrap()
        .unwrap();
    assert_eq!(session.parent(document).unwrap(), Some(handle));

    let err = resolver
        .get_node(ItemRef::Physical(link), "{nowhere}/doc")
        .unwrap_err();
    assert!(matches!(err, ApiError::StorageError(_)));
}

#[test]
fn similar_condition_matches_discriminators() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let mut session = repo.login();
    let handle = session.node_by_path("/test/docs/article").unwrap().unwrap();
    session
        .set_property(handle.physical().unwrap(), Property::strings("hippo:discriminator", ["language"]))
        .unwrap();

    let dutch = session.node_by_path("/test/docs/article/article[3]").unwrap().unwrap();
    let resolver = PathResolver::new(&session);
    let similar = resolver.get_node(dutch, "../article[{_similar}]").unwrap().unwrap();
    assert_eq!(similar, dutch);

    let english = session.node_by_path("/test/docs/article/article[2]").unwrap().unwrap();
    let similar = resolver.get_node(english, "../article[{_similar}]").unwrap().unwrap();
    assert_eq!(session.index(similar).unwrap(), 1);
}

#[test]
fn malformed_paths_are_rejected_before_resolution() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let resolver = PathResolver::new(&session);
    for bad in ["/test/docs[", "/test//docs", "/test/do*cs"] {
        let err = resolver.get_node(session.root(), bad).unwrap_err();
        assert!(err.is_malformed(), "{:?}", bad);
        assert!(matches!(err, ApiError::MalformedPath(_)));
    }

    let err = resolver
        .get_item(session.root(), "/test/docs/doc[2]", true, None)
        .unwrap_err();
    assert!(err.is_malformed());
    assert!(matches!(
        resolver.get_item(session.root(), "/test/mirror", false, None).unwrap(),
        Some(Resolved::Node(_))
    ));
}

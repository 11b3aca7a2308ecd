use facetview::{EngineConfig, ItemRef, NodeRead};

use crate::support::{names, repository, string, walk};

fn config() -> EngineConfig {
    EngineConfig::default().with_alias("hippo:testmirror", "hippo:facetselect")
}

#[test]
fn facetselect_exposes_document_below_docbase() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();

    let mirror = walk(&session, &["test", "mirror"]);
    assert_eq!(names(&session, mirror), vec!["doc", "article"]);

    let doc = session.node_by_path("/test/mirror/doc/doc").unwrap().unwrap();
    assert!(doc.is_virtual());
    assert_eq!(string(&session, doc, "state").as_deref(), Some("published"));
    assert_eq!(session.primary_type(doc).unwrap(), "hippo:document");

    let physical = session.node_by_path("/test/docs/doc/doc").unwrap().unwrap();
    assert_eq!(session.canonical(doc).unwrap(), physical.physical());
    assert_eq!(session.path(doc).unwrap(), "/test/mirror/doc/doc");
}

#[test]
fn root_docbase_is_not_projected() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let notallowed = walk(&session, &["test", "notallowed"]);
    assert!(session.children(notallowed).unwrap().is_empty());
}

#[test]
fn facetselect_over_facetselect_is_rejected() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let chained = walk(&session, &["test", "chained"]);
    assert!(session.children(chained).unwrap().is_empty());
}

#[test]
fn malformed_criteria_leave_view_empty() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let malformed = walk(&session, &["test", "malformed"]);
    assert!(session.children(malformed).unwrap().is_empty());
}

#[test]
fn unfiltered_mirror_keeps_all_variants_with_requests_last() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let article = walk(&session, &["test", "mirror", "article"]);
    let children = session.children(article).unwrap();
    assert_eq!(
        names(&session, article),
        vec!["article", "article", "article", "hippo:request"]
    );
    let indexes: Vec<usize> = children.iter().map(|c| session.index(*c).unwrap()).collect();
    assert_eq!(indexes, vec![1, 2, 3, 1]);
}

#[test]
fn select_keeps_every_matching_variant() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let article = walk(&session, &["test", "published", "article"]);
    let languages: Vec<Option<String>> = session
        .children(article)
        .unwrap()
        .into_iter()
        .map(|c| string(&session, c, "language"))
        .collect();
    assert_eq!(languages, vec![Some("en".to_string()), Some("nl".to_string())]);
}

#[test]
fn single_view_exposes_at_most_one_variant() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();

    let article = walk(&session, &["test", "single", "article"]);
    let children = session.children(article).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(string(&session, children[0], "state").as_deref(), Some("published"));

    let doc = walk(&session, &["test", "single", "doc"]);
    assert_eq!(session.children(doc).unwrap().len(), 1);
}

#[test]
fn prefer_single_picks_preferred_variant() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let article = walk(&session, &["test", "dutch", "article"]);
    let children = session.children(article).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(string(&session, children[0], "language").as_deref(), Some("nl"));
}

#[test]
fn aliased_type_behaves_as_facetselect() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let aliased = walk(&session, &["test", "aliased"]);
    assert_eq!(names(&session, aliased), vec!["doc", "article"]);

    let doc = walk(&session, &["test", "aliased", "doc"]);
    assert!(session.children(doc).unwrap().is_empty());

    let article = walk(&session, &["test", "aliased", "article"]);
    let children = session.children(article).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(string(&session, children[0], "state").as_deref(), Some("unpublished"));
}

#[test]
fn unaliased_custom_type_is_plain() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let aliased = walk(&session, &["test", "aliased"]);
    assert!(session.children(aliased).unwrap().is_empty());
}

#[test]
fn indirect_chain_combines_both_filters() {
    let repo = repository(&config(), &["vehicles.yaml"]);
    let session = repo.login();

    let cars = walk(&session, &["vehicles", "filters", "cars"]);
    assert_eq!(names(&session, cars), vec!["redcar", "bluecar", "redbike"]);
    let bike = walk(&session, &["vehicles", "filters", "cars", "redbike"]);
    assert!(session.children(bike).unwrap().is_empty());

    let red = walk(&session, &["vehicles", "red"]);
    assert_eq!(names(&session, red), vec!["cars"]);

    let red_cars = walk(&session, &["vehicles", "red", "cars"]);
    assert!(red_cars.is_virtual());
    assert_eq!(names(&session, red_cars), vec!["redcar", "bluecar", "redbike"]);

    let through_both = walk(&session, &["vehicles", "red", "cars", "redcar"]);
    let documents = session.children(through_both).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(string(&session, documents[0], "color").as_deref(), Some("red"));
    assert_eq!(string(&session, documents[0], "vehicle").as_deref(), Some("car"));

    for excluded in ["bluecar", "redbike"] {
        let handle = walk(&session, &["vehicles", "red", "cars", excluded]);
        assert!(session.children(handle).unwrap().is_empty(), "{} should be filtered", excluded);
    }
}

#[test]
fn projection_is_deterministic_across_sessions() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let first = repo.login();
    let second = repo.login();

    let left = walk(&first, &["test", "mirror", "article"]);
    let right = walk(&second, &["test", "mirror", "article"]);
    assert_eq!(left, right);
    assert_eq!(first.children(left).unwrap(), second.children(right).unwrap());
}

#[test]
fn same_document_under_different_views_has_distinct_ids() {
    let repo = repository(&config(), &["facetselect.yaml"]);
    let session = repo.login();
    let mirrored = walk(&session, &["test", "mirror", "doc"]);
    let published = walk(&session, &["test", "published", "doc"]);
    assert_ne!(mirrored, published);
    assert_eq!(session.canonical(mirrored).unwrap(), session.canonical(published).unwrap());
    assert!(matches!(mirrored, ItemRef::Virtual(_)));
}

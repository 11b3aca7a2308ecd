use std::sync::Arc;

use chrono::{DateTime, Utc};
use facetview::facetnav::range::{Clock, ParsedFacet};
use facetview::facetnav::search::{FacetCondition, FacetedQuery, FacetedSearch, StoreSearch};
use facetview::store::NodeStore;
use facetview::view::ViewProjector;
use facetview::{EngineConfig, FilterState, NodeRead, Property, PropertyValue, Repository, Session};
use facetview::virtual_tree::Engine;

use crate::support::{count, load, names, value_counts, walk};

const PRICE: &str = "price$[{name:'cheap', resolution:'double', end:20000}, {name:'mid', resolution:'double', begin:20000, end:50000}, {name:'premium', resolution:'double', begin:50000}]";

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-14T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn repository() -> Arc<Repository> {
    let engine = Engine::from_config(&EngineConfig::default()).with_clock(Clock::Fixed(now()), None);
    let repository = Repository::with_engine(engine);
    load(&repository, &["cars.yaml"]);
    repository
}

/// Count the same query directly against the search backend.
fn independent_count(session: &Session, search: Vec<FacetCondition>, facet: Option<(&str, &str)>) -> usize {
    let docbase = session.tree().lookup_path("/shop/cars").unwrap().unwrap();
    let ranges = match facet {
        Some((facet, bucket)) => {
            let parsed = ParsedFacet::parse(facet).unwrap();
            vec![parsed.range(bucket).unwrap().clone()]
        }
        None => Vec::new(),
    };
    let query = FacetedQuery {
        docbase,
        search,
        ranges,
        filter: FilterState::default(),
        now: now(),
    };
    StoreSearch::new(ViewProjector::default())
        .count(session.tree(), &query, None)
        .unwrap()
        .total
}

#[test]
fn navigation_root_lists_facets_and_result_set() {
    let repo = repository();
    let session = repo.login();
    let nav = walk(&session, &["shop", "nav"]);
    assert_eq!(
        names(&session, nav),
        vec!["Brand", "Color", "Price", "Listed", "hippo:resultset"]
    );
    let results = walk(&session, &["shop", "nav", "hippo:resultset"]);
    assert_eq!(count(&session, results), 5);
    assert_eq!(session.children(results).unwrap().len(), 5);
    assert_eq!(session.primary_type(results).unwrap(), "hippo:facetresult");
}

#[test]
fn values_sorted_by_count_descending() {
    let repo = repository();
    let session = repo.login();
    let brand = walk(&session, &["shop", "nav", "Brand"]);
    assert_eq!(
        value_counts(&session, brand),
        vec![("bmw".to_string(), 2), ("audi".to_string(), 1), ("vw".to_string(), 1)]
    );
    // documents without a brand are not counted by the level's result set
    let results = walk(&session, &["shop", "nav", "Brand", "hippo:resultset"]);
    assert_eq!(count(&session, results), 4);
}

#[test]
fn display_options_control_value_order() {
    let repo = repository();
    let session = repo.login();

    let color = walk(&session, &["shop", "nav", "Color"]);
    let values: Vec<String> = value_counts(&session, color).into_iter().map(|(v, _)| v).collect();
    assert_eq!(values, vec!["black", "grey", "red", "white"]);

    let price = walk(&session, &["shop", "nav", "Price"]);
    assert_eq!(
        value_counts(&session, price),
        vec![("cheap".to_string(), 2), ("mid".to_string(), 2), ("premium".to_string(), 1)]
    );
}

#[test]
fn relative_date_ranges_use_the_clock() {
    let repo = repository();
    let session = repo.login();
    let listed = walk(&session, &["shop", "nav", "Listed"]);
    let mut counts = value_counts(&session, listed);
    counts.sort();
    assert_eq!(
        counts,
        vec![
            ("older".to_string(), 1),
            ("this week".to_string(), 2),
            ("today".to_string(), 2)
        ]
    );
}

#[test]
fn counts_match_independent_queries() {
    let repo = repository();
    let session = repo.login();

    let brand = walk(&session, &["shop", "nav", "Brand"]);
    for (value, counted) in value_counts(&session, brand) {
        let expected = independent_count(&session, vec![FacetCondition::equals("brand", value.clone())], None);
        assert_eq!(counted as usize, expected, "brand {}", value);
    }

    let price = walk(&session, &["shop", "nav", "Price"]);
    for (bucket, counted) in value_counts(&session, price) {
        let expected = independent_count(&session, Vec::new(), Some((PRICE, bucket.as_str())));
        assert_eq!(counted as usize, expected, "price {}", bucket);
    }

    // one level deeper the constraints accumulate
    let color = walk(&session, &["shop", "nav", "Brand", "bmw", "Color"]);
    for (value, counted) in value_counts(&session, color) {
        let expected = independent_count(
            &session,
            vec![
                FacetCondition::equals("brand", "bmw"),
                FacetCondition::equals("color", value.clone()),
            ],
            None,
        );
        assert_eq!(counted as usize, expected, "bmw/{}", value);
    }
}

#[test]
fn drill_down_result_set_holds_matching_documents() {
    let repo = repository();
    let session = repo.login();
    let bmw = walk(&session, &["shop", "nav", "Brand", "bmw"]);
    assert_eq!(count(&session, bmw), 2);
    assert_eq!(session.primary_type(bmw).unwrap(), "hippo:facetsubnavigation");
    assert_eq!(
        names(&session, bmw),
        vec!["Brand", "Color", "Price", "Listed", "hippo:resultset"]
    );

    let results = walk(&session, &["shop", "nav", "Brand", "bmw", "hippo:resultset"]);
    assert_eq!(names(&session, results), vec!["bmw-x1", "bmw-m3"]);

    let document = walk(&session, &["shop", "nav", "Brand", "bmw", "hippo:resultset", "bmw-m3"]);
    let physical = session.tree().lookup_path("/shop/cars/bmw-m3/bmw-m3").unwrap();
    assert_eq!(session.canonical(document).unwrap(), physical);
}

#[test]
fn reused_facet_value_stops_recursion() {
    let repo = repository();
    let session = repo.login();
    let again = walk(&session, &["shop", "nav", "Brand", "bmw", "Brand", "bmw"]);
    assert_eq!(names(&session, again), vec!["hippo:resultset"]);

    let fresh = walk(&session, &["shop", "nav", "Brand", "bmw", "Color", "red"]);
    assert_eq!(names(&session, fresh).len(), 5);
}

#[test]
fn limit_and_order_apply_to_result_sets() {
    let repo = repository();
    let session = repo.login();
    let results = walk(&session, &["shop", "limited", "hippo:resultset"]);
    assert_eq!(count(&session, results), 5);
    assert_eq!(names(&session, results), vec!["bmw-m3", "bmw-x1"]);

    let limited = walk(&session, &["shop", "limited"]);
    assert_eq!(names(&session, limited), vec!["brand", "hippo:resultset"]);
}

// Range buckets take part in an inherited order preference like plain values.
#[test]
fn range_buckets_follow_inherited_order_preference() {
    let repo = repository();
    let session = repo.login();
    let price = walk(&session, &["preferred", "nav", "Price"]);
    let buckets: Vec<String> = value_counts(&session, price).into_iter().map(|(v, _)| v).collect();
    assert_eq!(buckets, vec!["mid", "cheap", "premium"]);
}

#[test]
fn held_navigation_item_reports_count_of_current_revision() {
    let repo = repository();
    let mut viewer = repo.login();
    let bmw = walk(&viewer, &["shop", "nav", "Brand", "bmw"]);
    assert_eq!(count(&viewer, bmw), 2);

    let mut editor = repo.login();
    let cars = editor.node_by_path("/shop/cars").unwrap().and_then(|c| c.physical()).unwrap();
    let handle = editor.add_node(cars, "bmw-i3", "hippo:handle").unwrap();
    let document = editor.add_node(handle, "bmw-i3", "hippo:document").unwrap();
    editor
        .set_property(document, Property::single("brand", PropertyValue::String("bmw".into())))
        .unwrap();
    editor.save().unwrap();

    viewer.refresh(false).unwrap();
    assert_eq!(count(&viewer, bmw), 3);
    assert_eq!(walk(&viewer, &["shop", "nav", "Brand", "bmw"]), bmw);
}

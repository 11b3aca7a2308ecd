use std::sync::Arc;

use facetview::path::PathResolver;
use facetview::store::fixture;
use facetview::{EngineConfig, NodeId, NodeRead, Repository, Session};
use proptest::prelude::*;

use crate::support::walk;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}".prop_filter("YAML null keyword", |s| s != "null")
}

/// A handle with variants whose `state` and `language` come from the strategy.
fn handle_yaml(variants: &[(String, String)]) -> String {
    let mut yaml = String::from("p:\n  docs:\n    doc:\n      _type: hippo:handle\n      _children:\n");
    for (state, language) in variants {
        yaml.push_str(&format!(
            "        - _name: doc\n          _type: hippo:document\n          state: {}\n          language: {}\n",
            state, language
        ));
    }
    yaml.push_str(
        "  view:\n    _type: hippo:facetselect\n    hippo:docbase: /p/docs\n    hippo:facets: [language]\n    hippo:values: [en]\n    hippo:modes: [prefer]\n",
    );
    yaml
}

fn session_with(yaml: &str) -> (Arc<Repository>, Session) {
    let repo = Repository::in_memory(&EngineConfig::default());
    let mut session = repo.login();
    fixture::load_str(&mut session, NodeId::root(), yaml).unwrap();
    session.save().unwrap();
    let session = repo.login();
    (repo, session)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn projection_is_deterministic(
        variants in prop::collection::vec(
            (prop::sample::select(vec!["draft", "published"]), prop::sample::select(vec!["en", "nl", "de"])),
            1..6,
        )
    ) {
        let variants: Vec<(String, String)> = variants
            .into_iter()
            .map(|(s, l)| (s.to_string(), l.to_string()))
            .collect();
        let (repo, first) = session_with(&handle_yaml(&variants));
        let second = repo.login();

        let left = walk(&first, &["p", "view", "doc"]);
        let right = walk(&second, &["p", "view", "doc"]);
        let left_children = first.children(left).unwrap();
        prop_assert_eq!(&left_children, &second.children(right).unwrap());
        prop_assert_eq!(left_children.len(), variants.len());

        // preferred variants come first, physical order breaks ties
        let languages: Vec<String> = left_children
            .iter()
            .map(|c| first.property(*c, "language").unwrap().unwrap().string_values()[0].clone())
            .collect();
        let mut expected: Vec<String> = variants.iter().map(|(_, l)| l.clone()).collect();
        expected.sort_by_key(|l| l != "en");
        prop_assert_eq!(languages, expected);
    }

    #[test]
    fn plain_paths_round_trip(segments in prop::collection::vec(name(), 1..5)) {
        let mut yaml = String::new();
        for (depth, segment) in segments.iter().enumerate() {
            let indent = "  ".repeat(depth);
            yaml.push_str(&format!("{}{}:\n{}  _type: nt:unstructured\n", indent, segment, indent));
        }
        let (_repo, session) = session_with(&yaml);
        let path = format!("/{}", segments.join("/"));
        let resolved = PathResolver::new(&session)
            .get_node(session.root(), &path)
            .unwrap();
        prop_assert!(resolved.is_some(), "{} did not resolve", path);
        prop_assert_eq!(session.path(resolved.unwrap()).unwrap(), path);
    }

    #[test]
    fn sibling_indexed_paths_round_trip(
        steps in prop::collection::vec((name(), 1usize..4), 1..4)
    ) {
        let (_repo, session) = session_with(&sibling_chain_yaml(&steps));
        let mut path = String::from("/r");
        for (segment, copies) in &steps {
            match copies {
                1 => path.push_str(&format!("/{}", segment)),
                n => path.push_str(&format!("/{}[{}]", segment, n)),
            }
        }
        let resolved = PathResolver::new(&session)
            .get_node(session.root(), &path)
            .unwrap();
        prop_assert!(resolved.is_some(), "{} did not resolve", path);
        prop_assert_eq!(session.path(resolved.unwrap()).unwrap(), path);
    }
}

/// Nested same-name siblings below `/r`; each level descends into the last copy.
fn sibling_chain_yaml(steps: &[(String, usize)]) -> String {
    let mut yaml = String::from("r:\n  _type: nt:unstructured\n");
    let mut indent = String::from("  ");
    for (segment, copies) in steps {
        yaml.push_str(&format!("{}_children:\n", indent));
        for _ in 0..*copies {
            yaml.push_str(&format!(
                "{}  - _name: {}\n{}    _type: nt:unstructured\n",
                indent, segment, indent
            ));
        }
        indent.push_str("    ");
    }
    yaml
}

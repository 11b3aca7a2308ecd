use std::fs;

use facetview::tooling::cli::{CliContext, Commands};
use facetview::ViewConfig;
use tempfile::TempDir;

use crate::support::fixture_path;

fn fixture_context() -> CliContext {
    CliContext::new(
        ViewConfig::default(),
        &[fixture_path("cars.yaml")],
        None,
    )
    .unwrap()
}

#[test]
fn nav_json_contract_has_counts_and_children() {
    let output = fixture_context()
        .execute(&Commands::Nav {
            path: "/shop/nav".to_string(),
            depth: 2,
            no_results: true,
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["name"], "nav");
    let facets = parsed["children"].as_array().expect("children array should exist");
    assert_eq!(facets.len(), 4);
    let brand = &facets[0];
    assert_eq!(brand["name"], "Brand");
    assert_eq!(brand["children"][0]["name"], "bmw");
    assert_eq!(brand["children"][0]["count"], 2);
}

#[test]
fn get_json_contract_has_item_and_properties() {
    let output = fixture_context()
        .execute(&Commands::Get {
            path: "/shop/nav/Brand/bmw/hippo:resultset/bmw-m3".to_string(),
            property: false,
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["item"]["kind"], "virtual");
    assert_eq!(parsed["properties"]["brand"], "bmw");
    assert!(parsed["path"].as_str().unwrap().ends_with("/bmw-m3"));
}

#[test]
fn import_into_persistent_store_then_list() {
    let temp_dir = TempDir::new().unwrap();
    let fixtures = temp_dir.path().join("fixtures");
    fs::create_dir_all(&fixtures).unwrap();
    fs::copy(fixture_path("vehicles.yaml"), fixtures.join("vehicles.yaml")).unwrap();
    fs::write(fixtures.join("notes.txt"), "not a fixture").unwrap();
    let store = temp_dir.path().join("store");

    {
        let cli = CliContext::new(ViewConfig::default(), &[], Some(store.clone())).unwrap();
        let output = cli
            .execute(&Commands::Import {
                source: fixtures.clone(),
                at: "/".to_string(),
                yes: true,
            })
            .unwrap();
        assert!(output.starts_with("Imported 1 file(s)"));
    }

    let cli = CliContext::new(ViewConfig::default(), &[], Some(store)).unwrap();
    let output = cli
        .execute(&Commands::Ls {
            path: "/vehicles/red/cars".to_string(),
            format: "json".to_string(),
        })
        .unwrap();
    let rows: serde_json::Value = serde_json::from_str(&output).unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["redcar", "bluecar", "redbike"]);
}

#[test]
fn config_command_renders_toml() {
    let output = fixture_context()
        .execute(&Commands::Config {
            format: "toml".to_string(),
        })
        .unwrap();
    assert!(output.contains("[engine]"));
    assert!(output.contains("observer_capacity = 256"));
}

use facetview::{EngineConfig, NodeRead, Repository};
use tempfile::TempDir;

use crate::support::{load, names, string, walk};

#[test]
fn committed_content_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");
    let config = EngineConfig::default();

    let (document, handle) = {
        let repo = Repository::open(&path, &config).unwrap();
        assert!(repo.is_persistent());
        load(&repo, &["facetselect.yaml"]);
        let session = repo.login();
        let document = walk(&session, &["test", "mirror", "article", "article"]);
        let handle = session.node_by_path("/test/docs/doc").unwrap().unwrap();
        (document, handle)
    };

    let repo = Repository::open(&path, &config).unwrap();
    let session = repo.login();
    assert_eq!(
        names(&session, walk(&session, &["test", "docs", "article"])),
        vec!["article", "article", "article", "hippo:request"]
    );
    // identifiers are stored, so virtual ids are stable across restarts
    assert_eq!(walk(&session, &["test", "mirror", "article", "article"]), document);
    assert_eq!(session.node_by_path("/test/docs/doc").unwrap(), Some(handle));
    assert_eq!(
        string(&session, document, "state").as_deref(),
        Some("unpublished")
    );
}

#[test]
fn removals_are_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");
    let config = EngineConfig::default();

    {
        let repo = Repository::open(&path, &config).unwrap();
        load(&repo, &["facetselect.yaml"]);
        let mut session = repo.login();
        let handle = session
            .node_by_path("/test/docs/article")
            .unwrap()
            .and_then(|h| h.physical())
            .unwrap();
        session.remove_node(handle).unwrap();
        session.save().unwrap();
    }

    let repo = Repository::open(&path, &config).unwrap();
    let session = repo.login();
    assert_eq!(session.node_by_path("/test/docs/article").unwrap(), None);
    assert_eq!(names(&session, walk(&session, &["test", "mirror"])), vec!["doc"]);
}

use std::sync::Arc;

use facetview::store::PropertyValue;
use facetview::{EngineConfig, ItemRef, ModelObserver, NodeRead, Property, ReferenceState};
use parking_lot::Mutex;

use crate::support::{repository, walk};

#[test]
fn observer_follows_a_document_through_edits_and_removal() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let events = repo.subscribe();
    let mut viewer = repo.login();
    let observer = ModelObserver::new(16);
    let seen: Arc<Mutex<Vec<ReferenceState>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    observer.subscribe(Arc::new(
        move |_observer: &ModelObserver, _read: &dyn NodeRead, state: &ReferenceState| {
            recorder.lock().push(*state);
        },
    ));

    let document = walk(&viewer, &["test", "mirror", "doc", "doc"]);
    let context = walk(&viewer, &["test", "mirror", "doc"]);
    let handle = viewer
        .node_by_path("/test/docs/doc")
        .unwrap()
        .and_then(|h| h.physical())
        .unwrap();

    let state = observer.select(&viewer, document).unwrap();
    assert_eq!(
        state,
        ReferenceState::Virtual {
            virtual_item: document,
            physical: handle
        }
    );

    // another session adds a variant below the observed handle
    let mut editor = repo.login();
    let draft = editor.add_node(handle, "doc", "hippo:document").unwrap();
    editor
        .set_property(draft, Property::single("state", PropertyValue::String("draft".into())))
        .unwrap();
    editor.save().unwrap();

    let batch = events.try_recv().unwrap();
    viewer.refresh(false).unwrap();
    let stale = observer.on_event(&viewer, &batch).unwrap();
    assert_eq!(stale, vec![context]);
    assert_eq!(viewer.children(context).unwrap().len(), 2);

    // choosing the handle elsewhere reselects the first variant in the mirror
    let reselected = observer.set_model(&viewer, handle).unwrap().unwrap();
    assert_eq!(
        reselected,
        ReferenceState::Virtual {
            virtual_item: document,
            physical: handle
        }
    );

    editor.refresh(false).unwrap();
    editor.remove_node(handle).unwrap();
    editor.save().unwrap();
    let batch = events.try_recv().unwrap();
    viewer.refresh(false).unwrap();
    observer.on_event(&viewer, &batch).unwrap();
    assert_eq!(observer.state(), ReferenceState::Unbound);
    assert_eq!(seen.lock().last(), Some(&ReferenceState::Unbound));

    // the old virtual item no longer has a physical counterpart
    assert_eq!(viewer.canonical(document).unwrap(), None);
    assert_eq!(observer.select(&viewer, document).unwrap(), ReferenceState::Unbound);
}

#[test]
fn physical_selection_needs_no_bridge_entry() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let observer = ModelObserver::new(4);
    let handle = session.node_by_path("/test/docs/article").unwrap().unwrap();
    assert!(matches!(handle, ItemRef::Physical(_)));
    let state = observer.select(&session, handle).unwrap();
    assert_eq!(state.physical(), handle.physical());
    assert!(observer.bridge().is_empty());
}

#[test]
fn unseen_handle_stays_physical() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let session = repo.login();
    let observer = ModelObserver::new(4);
    let handle = session
        .node_by_path("/test/docs/article")
        .unwrap()
        .and_then(|h| h.physical())
        .unwrap();
    assert_eq!(
        observer.set_model(&session, handle).unwrap(),
        Some(ReferenceState::Physical(handle))
    );
}

#[test]
fn variant_property_edit_marks_its_view_stale() {
    let repo = repository(&EngineConfig::default(), &["facetselect.yaml"]);
    let events = repo.subscribe();
    let mut viewer = repo.login();
    let observer = ModelObserver::new(16);

    let document = walk(&viewer, &["test", "mirror", "doc", "doc"]);
    let context = walk(&viewer, &["test", "mirror", "doc"]);
    observer.select(&viewer, document).unwrap();

    let mut editor = repo.login();
    let variant = editor
        .node_by_path("/test/docs/doc/doc")
        .unwrap()
        .and_then(|v| v.physical())
        .unwrap();
    editor
        .set_property(variant, Property::single("state", PropertyValue::String("unpublished".into())))
        .unwrap();
    editor.save().unwrap();

    let batch = events.try_recv().unwrap();
    assert!(batch.iter().all(|e| e.parent().is_none()));
    viewer.refresh(false).unwrap();
    assert_eq!(observer.on_event(&viewer, &batch).unwrap(), vec![context]);
}

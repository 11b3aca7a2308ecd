//! Physical/virtual correspondence for observers
//!
//! Consumers browse virtual trees but edit, lock and receive change events on
//! physical nodes. [`ObservationBridge`] remembers under which virtual parent a
//! physical document handle was last seen, so that a change to the handle can
//! be routed back to the view showing it and an edited handle can be selected
//! again at the same place in the virtual tree.

use crate::error::{ApiError, StorageError};
use crate::nodetype::NT_DOCUMENT;
use crate::read::NodeRead;
use crate::store::events::ChangeEvent;
use crate::types::{ItemRef, NodeId};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Treat a reference that disappeared concurrently as absent.
fn not_found_as_none<T>(result: Result<Option<T>, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Err(ApiError::StorageError(StorageError::ItemNotFound(what))) => {
            debug!(item = %what, "Observed item no longer exists");
            Ok(None)
        }
        other => other,
    }
}

/// Bounded reverse-lookup table: canonical handle -> virtual parent.
pub struct ObservationBridge {
    references: Mutex<LruCache<NodeId, ItemRef>>,
}

impl ObservationBridge {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            references: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.references.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.lock().is_empty()
    }

    /// Virtual parent recorded for a canonical node.
    pub fn context_of(&self, canonical: &NodeId) -> Option<ItemRef> {
        self.references.lock().peek(canonical).copied()
    }

    /// Physical counterpart of `item`.
    ///
    /// Physical items come back unchanged. For a virtual item the canonical
    /// node is returned (a document is widened to its handle) and recorded
    /// against the item's virtual parent. `None` when the item is purely
    /// computed or its physical node is gone.
    pub fn resolve_canonical(&self, read: &dyn NodeRead, item: ItemRef) -> Result<Option<NodeId>, ApiError> {
        let id = match item {
            ItemRef::Physical(id) => return Ok(Some(id)),
            ItemRef::Virtual(id) => id,
        };
        let mut canonical = match not_found_as_none(read.canonical(item))? {
            Some(canonical) => canonical,
            None => return Ok(None),
        };

        if read.is_node_type(ItemRef::Physical(canonical), NT_DOCUMENT)? {
            if let Some(parent) = read.parent(ItemRef::Physical(canonical))? {
                if read.is_handle(parent)? {
                    if let Some(handle) = parent.physical() {
                        canonical = handle;
                    }
                }
            }
        }

        if let Some(parent) = not_found_as_none(read.parent(item))? {
            self.references.lock().put(canonical, parent);
            debug!(canonical = %canonical, virtual_item = %id.short(), "Recorded virtual context");
        }
        Ok(Some(canonical))
    }

    /// Virtual item showing `node` in the context it was last observed in.
    ///
    /// Among the context's children named like the handle, the one with the
    /// lowest sibling index whose canonical node sits below the handle wins.
    /// Without a recorded context or a match, the physical node is returned.
    pub fn resolve_virtual(&self, read: &dyn NodeRead, node: NodeId) -> Result<ItemRef, ApiError> {
        let physical = ItemRef::Physical(node);
        if !read.is_handle(physical)? {
            return Ok(physical);
        }
        let context = match self.references.lock().get(&node).copied() {
            Some(context) => context,
            None => return Ok(physical),
        };

        let name = read.name(physical)?;
        let candidates = match not_found_as_none(read.children_named(context, &name).map(Some))? {
            Some(candidates) => candidates,
            None => Vec::new(),
        };
        let mut best: Option<(usize, ItemRef)> = None;
        for candidate in candidates {
            let canonical = match not_found_as_none(read.canonical(candidate))? {
                Some(canonical) => canonical,
                None => continue,
            };
            let under_handle = not_found_as_none(read.parent(ItemRef::Physical(canonical)))? == Some(physical);
            if !under_handle {
                continue;
            }
            let index = read.index(candidate)?;
            if best.map_or(true, |(lowest, _)| index < lowest) {
                best = Some((index, candidate));
            }
        }

        match best {
            Some((_, target)) => Ok(target),
            None => {
                warn!(handle = %node, context = %context, "Could not find document in its last virtual context");
                Ok(physical)
            }
        }
    }

    /// Virtual contexts affected by a batch of changes, in first-seen order.
    ///
    /// A change to a document below a handle counts as a change to the
    /// handle, since contexts are recorded against handles.
    pub fn stale_views(&self, read: &dyn NodeRead, events: &[ChangeEvent]) -> Result<Vec<ItemRef>, ApiError> {
        let mut touched = Vec::new();
        for event in events {
            touched.push(event.node_id());
            touched.extend(event.parent());
            if event.parent().is_none() {
                touched.extend(self.enclosing_handle(read, event.node_id())?);
            }
        }
        let references = self.references.lock();
        let mut out = Vec::new();
        for id in touched {
            if let Some(context) = references.peek(&id) {
                if !out.contains(context) {
                    out.push(*context);
                }
            }
        }
        Ok(out)
    }

    fn enclosing_handle(&self, read: &dyn NodeRead, node: NodeId) -> Result<Option<NodeId>, ApiError> {
        if read.node_by_id(&node)?.is_none() {
            return Ok(None);
        }
        match not_found_as_none(read.parent(ItemRef::Physical(node)))? {
            Some(parent) if read.is_handle(parent)? => Ok(parent.physical()),
            _ => Ok(None),
        }
    }

    pub fn forget(&self, canonical: &NodeId) {
        self.references.lock().pop(canonical);
    }

    /// Drop every tracked reference.
    pub fn detach(&self) {
        let mut references = self.references.lock();
        if !references.is_empty() {
            debug!(references = references.len(), "Released observed references");
        }
        references.clear();
    }
}

/// What an observer currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceState {
    #[default]
    Unbound,
    Physical(NodeId),
    Virtual { virtual_item: ItemRef, physical: NodeId },
}

impl ReferenceState {
    pub fn physical(&self) -> Option<NodeId> {
        match self {
            ReferenceState::Unbound => None,
            ReferenceState::Physical(id) => Some(*id),
            ReferenceState::Virtual { physical, .. } => Some(*physical),
        }
    }
}

pub type Listener = Arc<dyn Fn(&ModelObserver, &dyn NodeRead, &ReferenceState) + Send + Sync>;

/// Keeps a browsing selection and an editing selection in step.
///
/// Selecting an item in a (virtual) tree binds the observer to its physical
/// counterpart; setting a physical model re-selects the matching virtual item.
/// Updates that arrive while one is being applied are dropped, so a listener
/// reacting to a change cannot feed it back into the observer.
pub struct ModelObserver {
    bridge: ObservationBridge,
    state: Mutex<ReferenceState>,
    active: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

/// Clears the active flag when an update finishes, including on error.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ModelObserver {
    pub fn new(capacity: usize) -> Self {
        Self {
            bridge: ObservationBridge::new(capacity),
            state: Mutex::new(ReferenceState::Unbound),
            active: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn bridge(&self) -> &ObservationBridge {
        &self.bridge
    }

    pub fn state(&self) -> ReferenceState {
        *self.state.lock()
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners.lock().push(listener);
    }

    fn enter(&self) -> Option<ActiveGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveGuard(&self.active))
    }

    fn notify(&self, read: &dyn NodeRead, state: &ReferenceState) {
        let listeners: Vec<Listener> = self.listeners.lock().clone();
        for listener in listeners {
            listener(self, read, state);
        }
    }

    /// Bind to an item selected while browsing.
    pub fn select(&self, read: &dyn NodeRead, item: ItemRef) -> Result<ReferenceState, ApiError> {
        let next = match item {
            ItemRef::Physical(id) => ReferenceState::Physical(id),
            ItemRef::Virtual(_) => match self.bridge.resolve_canonical(read, item)? {
                Some(physical) => ReferenceState::Virtual {
                    virtual_item: item,
                    physical,
                },
                None => ReferenceState::Unbound,
            },
        };
        *self.state.lock() = next;
        Ok(next)
    }

    /// Bind to a physical node chosen elsewhere, reselecting its virtual view.
    ///
    /// Returns `None` when the call arrived during another update.
    pub fn set_model(&self, read: &dyn NodeRead, node: NodeId) -> Result<Option<ReferenceState>, ApiError> {
        let _guard = match self.enter() {
            Some(guard) => guard,
            None => {
                debug!(node = %node, "Suppressed re-entrant model update");
                return Ok(None);
            }
        };
        let next = match self.bridge.resolve_virtual(read, node)? {
            ItemRef::Physical(id) => ReferenceState::Physical(id),
            virtual_item => ReferenceState::Virtual {
                virtual_item,
                physical: node,
            },
        };
        *self.state.lock() = next;
        self.notify(read, &next);
        Ok(Some(next))
    }

    /// React to committed changes.
    ///
    /// Unbinds when the observed physical node was removed and tells listeners
    /// about the new state. Returns the virtual contexts that went stale.
    pub fn on_event(&self, read: &dyn NodeRead, events: &[ChangeEvent]) -> Result<Vec<ItemRef>, ApiError> {
        let _guard = match self.enter() {
            Some(guard) => guard,
            None => {
                debug!(events = events.len(), "Suppressed re-entrant event delivery");
                return Ok(Vec::new());
            }
        };
        let stale = self.bridge.stale_views(read, events)?;
        let current = self.state();
        let removed = current.physical().is_some_and(|id| {
            events
                .iter()
                .any(|e| matches!(e, ChangeEvent::NodeRemoved { id: removed, .. } if *removed == id))
        });
        if removed {
            if let Some(id) = current.physical() {
                self.bridge.forget(&id);
            }
            *self.state.lock() = ReferenceState::Unbound;
            self.notify(read, &ReferenceState::Unbound);
        } else if current != ReferenceState::Unbound {
            self.notify(read, &current);
        }
        Ok(stale)
    }

    /// Release all tracked references and unbind.
    pub fn detach(&self) {
        self.bridge.detach();
        *self.state.lock() = ReferenceState::Unbound;
    }
}

impl Drop for ModelObserver {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::nodetype::{HIPPO_DOCBASE, NT_HANDLE, NT_MIRROR, NT_UNSTRUCTURED};
    use crate::session::Session;
    use crate::store::repository::Repository;
    use crate::store::Property;

    struct Fixture {
        session: Session,
        handle: NodeId,
        document: NodeId,
    }

    fn fixture() -> Fixture {
        let repo = Repository::in_memory(&EngineConfig::default());
        let mut session = repo.login();
        let docs = session.add_node(NodeId::root(), "docs", NT_UNSTRUCTURED).unwrap();
        let handle = session.add_node(docs, "doc", NT_HANDLE).unwrap();
        let document = session.add_node(handle, "doc", NT_DOCUMENT).unwrap();
        let mirror = session.add_node(NodeId::root(), "mirror", NT_MIRROR).unwrap();
        session
            .set_property(mirror, Property::string(HIPPO_DOCBASE, docs.to_string()))
            .unwrap();
        session.save().unwrap();
        Fixture {
            session,
            handle,
            document,
        }
    }

    #[test]
    fn test_canonical_of_document_is_handle() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        let item = f.session.node_by_path("/mirror/doc/doc").unwrap().unwrap();
        assert_eq!(bridge.resolve_canonical(&f.session, item).unwrap(), Some(f.handle));
        let context = f.session.node_by_path("/mirror/doc").unwrap();
        assert_eq!(bridge.context_of(&f.handle), context);
    }

    #[test]
    fn test_physical_is_its_own_canonical() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        let canonical = bridge
            .resolve_canonical(&f.session, ItemRef::Physical(f.document))
            .unwrap();
        assert_eq!(canonical, Some(f.document));
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_resolve_virtual_round_trip() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        let item = f.session.node_by_path("/mirror/doc/doc").unwrap().unwrap();
        bridge.resolve_canonical(&f.session, item).unwrap();
        assert_eq!(bridge.resolve_virtual(&f.session, f.handle).unwrap(), item);
    }

    #[test]
    fn test_resolve_virtual_without_context() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        assert_eq!(
            bridge.resolve_virtual(&f.session, f.handle).unwrap(),
            ItemRef::Physical(f.handle)
        );
    }

    #[test]
    fn test_stale_views_from_document_change() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        let item = f.session.node_by_path("/mirror/doc/doc").unwrap().unwrap();
        bridge.resolve_canonical(&f.session, item).unwrap();
        let context = f.session.node_by_path("/mirror/doc").unwrap().unwrap();
        let events = vec![ChangeEvent::PropertyChanged {
            id: f.document,
            name: "state".to_string(),
        }];
        assert_eq!(bridge.stale_views(&f.session, &events).unwrap(), vec![context]);
        let events = vec![ChangeEvent::NodeAdded {
            id: NodeId::new_random(),
            parent: f.handle,
        }];
        assert_eq!(bridge.stale_views(&f.session, &events).unwrap(), vec![context]);
    }

    #[test]
    fn test_stale_views_ignores_unobserved_change() {
        let f = fixture();
        let bridge = ObservationBridge::new(8);
        let events = vec![ChangeEvent::PropertyChanged {
            id: f.document,
            name: "state".to_string(),
        }];
        assert!(bridge.stale_views(&f.session, &events).unwrap().is_empty());
        let gone = vec![ChangeEvent::PropertyChanged {
            id: NodeId::new_random(),
            name: "state".to_string(),
        }];
        assert!(bridge.stale_views(&f.session, &gone).unwrap().is_empty());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let bridge = ObservationBridge::new(1);
        bridge.references.lock().put(NodeId::new_random(), ItemRef::Physical(NodeId::root()));
        bridge.references.lock().put(NodeId::new_random(), ItemRef::Physical(NodeId::root()));
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn test_reentrant_set_model_is_suppressed() {
        let f = fixture();
        let observer = ModelObserver::new(8);
        let nested = Arc::new(Mutex::new(Vec::new()));
        let seen = nested.clone();
        let handle = f.handle;
        observer.subscribe(Arc::new(move |observer: &ModelObserver, read: &dyn NodeRead, _state: &ReferenceState| {
            seen.lock().push(observer.set_model(read, handle).unwrap());
        }));
        let state = observer.set_model(&f.session, f.handle).unwrap();
        assert_eq!(state, Some(ReferenceState::Physical(f.handle)));
        assert_eq!(*nested.lock(), vec![None]);
    }

    #[test]
    fn test_select_binds_virtual_then_detach() {
        let f = fixture();
        let observer = ModelObserver::new(8);
        let item = f.session.node_by_path("/mirror/doc/doc").unwrap().unwrap();
        let state = observer.select(&f.session, item).unwrap();
        assert_eq!(
            state,
            ReferenceState::Virtual {
                virtual_item: item,
                physical: f.handle
            }
        );
        observer.detach();
        assert_eq!(observer.state(), ReferenceState::Unbound);
        assert!(observer.bridge().is_empty());
    }
}

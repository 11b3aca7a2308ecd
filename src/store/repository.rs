//! Repository: committed tree, persistence and change publication
//!
//! Sessions read a committed snapshot and record mutations; `commit` replays
//! them against the latest snapshot, writes the touched records to sled (when
//! persistent) and publishes the resulting change events to subscribers.

use crate::config::EngineConfig;
use crate::error::{ApiError, StorageError};
use crate::session::Session;
use crate::store::events::ChangeEvent;
use crate::store::persistence::SledStore;
use crate::store::tree::{Mutation, Tree};
use crate::store::PhysicalNode;
use crate::types::NodeId;
use crate::virtual_tree::Engine;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Committed {
    tree: Arc<Tree>,
    revision: u64,
}

pub struct Repository {
    state: RwLock<Committed>,
    persistence: Option<SledStore>,
    subscribers: Mutex<Vec<mpsc::Sender<Arc<Vec<ChangeEvent>>>>>,
    engine: Arc<Engine>,
}

impl Repository {
    /// Volatile repository holding only the root.
    pub fn in_memory(config: &EngineConfig) -> Arc<Self> {
        Arc::new(Self::build(Tree::new(), None, Engine::from_config(config)))
    }

    /// Persistent repository backed by a sled database at `path`.
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Arc<Self>, ApiError> {
        let store = SledStore::open(path)?;
        let tree = store.load_tree()?;
        info!(nodes = tree.len(), "Repository opened");
        Ok(Arc::new(Self::build(tree, Some(store), Engine::from_config(config))))
    }

    /// Volatile repository with a customized engine (search backend, clock).
    pub fn with_engine(engine: Engine) -> Arc<Self> {
        Arc::new(Self::build(Tree::new(), None, engine))
    }

    fn build(tree: Tree, persistence: Option<SledStore>, engine: Engine) -> Self {
        Self {
            state: RwLock::new(Committed {
                tree: Arc::new(tree),
                revision: 0,
            }),
            persistence,
            subscribers: Mutex::new(Vec::new()),
            engine: Arc::new(engine),
        }
    }

    /// Open a session on the latest committed state.
    pub fn login(self: &Arc<Self>) -> Session {
        Session::new(self.clone())
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub(crate) fn snapshot(&self) -> (Arc<Tree>, u64) {
        let state = self.state.read();
        (state.tree.clone(), state.revision)
    }

    /// Receive every committed batch of change events.
    pub fn subscribe(&self) -> mpsc::Receiver<Arc<Vec<ChangeEvent>>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Apply mutations atomically on top of the latest committed tree.
    pub(crate) fn commit(&self, mutations: &[Mutation]) -> Result<(Arc<Tree>, u64, Vec<ChangeEvent>), StorageError> {
        let (tree, revision, events) = {
            let mut state = self.state.write();
            let mut next = state.tree.as_ref().clone();
            let mut events = Vec::new();
            for mutation in mutations {
                events.extend(next.apply(mutation)?);
            }

            if let Some(store) = &self.persistence {
                let (upserts, removals) = touched_records(&next, &events);
                store.write_batch(&upserts, &removals)?;
            }

            state.tree = Arc::new(next);
            state.revision += 1;
            (state.tree.clone(), state.revision, events)
        };

        debug!(revision, events = events.len(), "Committed mutations");
        self.publish(&events);
        Ok((tree, revision, events))
    }

    fn publish(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let batch = Arc::new(events.to_vec());
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
        if subscribers.len() < before {
            warn!(dropped = before - subscribers.len(), "Dropped disconnected subscribers");
        }
    }
}

fn touched_records(tree: &Tree, events: &[ChangeEvent]) -> (Vec<Arc<PhysicalNode>>, Vec<NodeId>) {
    let mut ids = BTreeSet::new();
    for event in events {
        ids.insert(event.node_id());
        if let Some(parent) = event.parent() {
            ids.insert(parent);
        }
    }
    let mut upserts = Vec::new();
    let mut removals = Vec::new();
    for id in ids {
        match tree.node(&id) {
            Some(node) => upserts.push(node.clone()),
            None => removals.push(id),
        }
    }
    (upserts, removals)
}

//! Sled-backed node persistence
//!
//! One record per node in the `nodes` tree, keyed by the node id bytes and
//! serialized with bincode. Commits are written as a single batch.

use crate::error::StorageError;
use crate::store::tree::Tree;
use crate::store::{NodeStore, PhysicalNode};
use crate::types::NodeId;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const NODES_TREE: &str = "nodes";

pub struct SledStore {
    db: sled::Db,
    nodes: sled::Tree,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path)?;
        let nodes = db.open_tree(NODES_TREE)?;
        info!(path = %path.display(), records = nodes.len(), "Node store opened");
        Ok(Self { db, nodes })
    }

    /// Temporary store, removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        let nodes = db.open_tree(NODES_TREE)?;
        Ok(Self { db, nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read every record into a tree.
    pub fn load_tree(&self) -> Result<Tree, StorageError> {
        let mut records = Vec::with_capacity(self.nodes.len());
        for entry in self.nodes.iter() {
            let (_, bytes) = entry?;
            let record: PhysicalNode = bincode::deserialize(&bytes)?;
            records.push(record);
        }
        debug!(records = records.len(), "Loaded node records");
        Ok(Tree::from_nodes(records))
    }

    /// Write changed records and delete removed ones atomically.
    pub fn write_batch(&self, upserts: &[Arc<PhysicalNode>], removals: &[NodeId]) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for node in upserts {
            let bytes = bincode::serialize(node.as_ref())?;
            batch.insert(node.id.as_uuid().as_bytes().to_vec(), bytes);
        }
        for id in removals {
            batch.remove(id.as_uuid().as_bytes().to_vec());
        }
        self.nodes.apply_batch(batch)?;
        self.db.flush()?;
        debug!(upserts = upserts.len(), removals = removals.len(), "Node batch written");
        Ok(())
    }
}

impl NodeStore for SledStore {
    fn get(&self, id: &NodeId) -> Result<Option<Arc<PhysicalNode>>, StorageError> {
        match self.nodes.get(id.as_uuid().as_bytes())? {
            Some(bytes) => {
                let record: PhysicalNode = bincode::deserialize(&bytes)?;
                Ok(Some(Arc::new(record)))
            }
            None => Ok(None),
        }
    }
}

//! Cross-node cache invalidation.
//!
//! The store does not know how nodes talk to each other. It is handed a [`Cluster`] and only ever publishes
//! [`InvalidationMessage`]s to it and listens for the ones other nodes publish. Delivery is best effort.
use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::entity::new_id;
use crate::error::StoreResult;

/// Default number of messages a [`LocalBus`] subscriber may fall behind before it starts losing them.
pub const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CacheKind {
    Products,
    Orders,
    Categories,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Key(String),
    /// Everything of the kind.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    pub origin: String,
    pub kind:   CacheKind,
    pub key:    CacheKey,
}

impl InvalidationMessage {
    pub fn key(origin: impl Into<String>, kind: CacheKind, key: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            kind,
            key: CacheKey::Key(key.into()),
        }
    }

    pub fn wildcard(origin: impl Into<String>, kind: CacheKind) -> Self {
        Self {
            origin: origin.into(),
            kind,
            key: CacheKey::Wildcard,
        }
    }

    /// Wire form for transports that carry bytes.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(postcard::to_stdvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

/// What a cache needs from the cluster membership layer.
pub trait Cluster: Debug + Send + Sync + 'static {
    /// Identifier of this node. Messages carrying it as their origin are our own echoes.
    fn node_id(&self) -> &str;

    /// Fire and forget.
    fn publish(&self, message: InvalidationMessage);

    fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage>;
}

/// A cluster of one. Publishing goes nowhere and nothing ever arrives.
#[derive(Debug)]
pub struct NoCluster {
    node_id: String,
    // Kept so that subscribers see an open, silent channel rather than a closed one.
    tx:      broadcast::Sender<InvalidationMessage>,
}

impl NoCluster {
    pub fn new() -> Self {
        Self::with_node_id(new_id())
    }

    pub fn with_node_id(node_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            node_id: node_id.into(),
            tx,
        }
    }
}

impl Default for NoCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster for NoCluster {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn publish(&self, _message: InvalidationMessage) {}

    fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.tx.subscribe()
    }
}

/// An in-process message bus. Every [`BusMember`] joined to it sees what every other member publishes, itself
/// included.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<InvalidationMessage>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn join(&self, node_id: impl Into<String>) -> BusMember {
        BusMember {
            node_id: node_id.into(),
            tx:      self.tx.clone(),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct BusMember {
    node_id: String,
    tx:      broadcast::Sender<InvalidationMessage>,
}

impl Cluster for BusMember {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn publish(&self, message: InvalidationMessage) {
        // No subscribers is not an error for a broadcast.
        if self.tx.send(message).is_err() {
            tracing::trace!("[{}] invalidation published with no listeners", self.node_id);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.tx.subscribe()
    }
}

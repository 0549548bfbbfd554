//! # layered-store
//!
//! Persistence layer of a multi-tenant messaging and commerce server.
//!
//! Requests are plain values ([`request::StoreRequest`]) that travel down a [`supplier::SupplierChain`]: an ordered
//! list of layers where each one may answer or pass the request on. The standard chain is
//!
//! 1. [`local_cache::LocalCacheSupplier`]: per-node read-through cache backed by [moka](https://crates.io/crates/moka).
//!    Writes evict locally and broadcast an invalidation to the other nodes through a [`cluster::Cluster`].
//! 2. [`retry::RetrySupplier`]: re-runs the database layer on transient failures.
//! 3. [`sql::SqlSupplier`]: the database itself, via [sea-orm](https://crates.io/crates/sea-orm). Writes go to the
//!    primary, reads are spread over replicas.
//!
//! Callers do not drive the chain themselves. A [`Store`] hands every operation to its own task and returns a
//! [`dispatch::StoreChannel`] that yields the typed result exactly once:
//!
//! ```ignore
//! let store = Store::builder()
//!     .primary(db)
//!     .cache_settings(CacheSettings::default())
//!     .build()?;
//!
//! let product = store.product().get(&id).recv().await?;
//! let page = store.order().list(Cursor::page(0, 60)).recv().await?;
//! let older = store.message().list(&channel, Cursor::before(&oldest_seen, 0, 60)).recv().await?;
//! ```
//!
//! Lists come back as [`list::EntityList`]: the ordered ids plus the entities keyed by id, carrying an ETag that is
//! stable across serialization.
//!
//! # Pagination
//!
//! Every list accepts one of four [`cursor::Cursor`] modes:
//!
//! - `Page`: offset/limit over the most recently updated rows.
//! - `Since`: everything updated after a timestamp, oldest first; for incremental sync.
//! - `After`: rows created after an anchor row, oldest first.
//! - `Before`: rows created before an anchor row. The query walks backwards from the anchor and the result is
//!   reversed, so it too reads oldest first.
//!
//! # Category trees
//!
//! Categories form nested-set trees. Reads are range queries; structural changes are [`tree::TreeMutation`]s applied
//! atomically by a [`tree::TreeProcedure`].
//!
//! # Feature flags
//!
//! - `sqlite`, `pg`, `mysql`: enable the corresponding database driver.
//! - `tracing`: enables [`telemetry`] and compiles in trace-level instrumentation.
pub mod boundary;
pub mod cluster;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod list;
pub mod local_cache;
pub mod migrations;
pub mod request;
pub mod retry;
pub mod sql;
pub mod store;
pub mod supplier;
#[cfg(feature = "tracing")]
pub mod telemetry;
pub mod tree;

pub use store::Store;

pub mod prelude {
    pub use crate::boundary::conditional;
    pub use crate::boundary::Conditional;
    pub use crate::boundary::CursorParams;
    pub use crate::cluster::CacheKind;
    pub use crate::cluster::Cluster;
    pub use crate::cluster::LocalBus;
    pub use crate::cluster::NoCluster;
    pub use crate::config::StoreConfig;
    pub use crate::cursor::Cursor;
    pub use crate::dispatch::must;
    pub use crate::dispatch::StoreChannel;
    pub use crate::entity::Category;
    pub use crate::entity::Message;
    pub use crate::entity::Order;
    pub use crate::entity::OrderStatus;
    pub use crate::entity::Product;
    pub use crate::entity::StoreEntity;
    pub use crate::error::ErrorKind;
    pub use crate::error::StoreError;
    pub use crate::error::StoreResult;
    pub use crate::list::EntityList;
    pub use crate::local_cache::CacheSettings;
    pub use crate::retry::RetryPolicy;
    pub use crate::store::Store;
    pub use crate::supplier::Hints;
}

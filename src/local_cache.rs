//! In-process read-through cache layer.
//!
//! Holds one bounded, time-expiring [`moka`] cache per [`CacheKind`]. Reads by id are answered from memory when
//! possible; misses are forwarded and the answer is cached on the way back. Writes are forwarded first; once they
//! succeed the affected key is evicted here and an [`InvalidationMessage`] goes out to the other nodes.
//!
//! Every kind has an epoch counter that each eviction bumps. A miss forwards with the epoch it saw, and the answer is
//! only cached if no eviction happened in between, so a slow read can never re-insert a value that was invalidated
//! while it was in flight.
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldx_plus::fx_plus;
use moka::future::Cache;
use strum::IntoEnumIterator;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::AbortHandle;
use tracing::instrument;

use crate::cluster::CacheKey;
use crate::cluster::CacheKind;
use crate::cluster::Cluster;
use crate::cluster::InvalidationMessage;
use crate::entity::Category;
use crate::entity::Order;
use crate::entity::Product;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::request::StoreRequest;
use crate::request::StoreResponse;
use crate::supplier::Hints;
use crate::supplier::Supplied;
use crate::supplier::Supplier;
use crate::supplier::Ticket;

/// Entries per entity kind unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// How long an entry stays valid unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_CACHE_CAPACITY,
            time_to_live: DEFAULT_CACHE_TTL,
        }
    }
}

// What a request means for the cache.
enum Target<'a> {
    Read(CacheKind, &'a str),
    Write(CacheKind, CacheKey),
}

#[fx_plus(
    parent,
    no_new,
    default(off),
    sync,
    builder(
        doc("Builder object of [`LocalCacheSupplier`].", "", "See [`LocalCacheSupplier::builder()`] method."),
        method_doc("Implement builder pattern for [`LocalCacheSupplier`]."),
    )
)]
pub struct LocalCacheSupplier {
    /// Bus invalidations are published to and received from.
    #[fieldx(get(clone), builder(required))]
    cluster: Arc<dyn Cluster>,

    #[fieldx(get(copy), default(DEFAULT_CACHE_CAPACITY))]
    max_capacity: u64,

    #[fieldx(get(copy), default(DEFAULT_CACHE_TTL))]
    time_to_live: Duration,

    #[fieldx(lazy, private, get(clone), builder(off))]
    products: Cache<String, Product>,

    #[fieldx(lazy, private, get(clone), builder(off))]
    orders: Cache<String, Order>,

    #[fieldx(lazy, private, get(clone), builder(off))]
    categories: Cache<String, Category>,

    #[fieldx(builder(off), default([AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)]))]
    epochs: [AtomicU64; 3],

    #[fieldx(private, clearer, lock, get, set, builder(off))]
    listener: AbortHandle,
}

impl LocalCacheSupplier {
    /// A cache configured by `settings`.
    pub fn with_settings(settings: CacheSettings, cluster: Arc<dyn Cluster>) -> StoreResult<Arc<Self>> {
        Self::builder()
            .cluster(cluster)
            .max_capacity(settings.max_capacity)
            .time_to_live(settings.time_to_live)
            .build()
            .map_err(StoreError::builder)
    }

    fn build_products(&self) -> Cache<String, Product> {
        self.build_cache()
    }

    fn build_orders(&self) -> Cache<String, Order> {
        self.build_cache()
    }

    fn build_categories(&self) -> Cache<String, Category> {
        self.build_cache()
    }

    fn build_cache<V: Clone + Send + Sync + 'static>(&self) -> Cache<String, V> {
        Cache::builder()
            .max_capacity(self.max_capacity())
            .time_to_live(self.time_to_live())
            .build()
    }

    pub fn node_id(&self) -> &str {
        self.cluster.node_id()
    }

    /// Start listening for invalidations published by other nodes. Calling it again is a no-op.
    ///
    /// The listener only holds a weak reference to the cache and is aborted when the cache is dropped.
    pub fn start(&self) {
        if self.listener().is_some() {
            return;
        }
        let Some(myself) = self.myself()
        else {
            return;
        };

        // Subscribe before spawning so nothing published from now on is missed.
        let mut rx = self.cluster.subscribe();
        let me = Arc::downgrade(&myself);
        let node_id = self.node_id().to_string();

        let handle = tokio::spawn(async move {
            loop {
                let received = rx.recv().await;
                let Some(cache) = me.upgrade()
                else {
                    break;
                };
                match received {
                    Ok(message) => cache.on_peer_message(message).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("[{node_id}] missed {missed} invalidation(s); purging all caches");
                        for kind in CacheKind::iter() {
                            cache.evict(kind, &CacheKey::Wildcard).await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("[{node_id}] invalidation channel closed");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.set_listener(handle.abort_handle()) {
            // Lost a race with another start().
            previous.abort();
        }
    }

    /// Evict a single entry here and on every other node.
    pub async fn invalidate(&self, kind: CacheKind, id: &str) {
        let key = CacheKey::Key(id.to_string());
        self.evict(kind, &key).await;
        self.broadcast(kind, key);
    }

    /// Drop every cached entry of `kind`, here and on every other node.
    pub async fn purge(&self, kind: CacheKind) {
        self.evict(kind, &CacheKey::Wildcard).await;
        self.broadcast(kind, CacheKey::Wildcard);
    }

    pub fn contains(&self, kind: CacheKind, id: &str) -> bool {
        match kind {
            CacheKind::Products => self.products().contains_key(id),
            CacheKind::Orders => self.orders().contains_key(id),
            CacheKind::Categories => self.categories().contains_key(id),
        }
    }

    pub fn epoch(&self, kind: CacheKind) -> u64 {
        self.epochs[kind as usize].load(Ordering::Acquire)
    }

    #[instrument(level = "trace", skip(self), fields(node = self.node_id()))]
    async fn on_peer_message(&self, message: InvalidationMessage) {
        if message.origin == self.node_id() {
            return;
        }
        tracing::debug!("[{}] invalidation from {}: {} {:?}", self.node_id(), message.origin, message.kind, message.key);
        self.evict(message.kind, &message.key).await;
    }

    fn broadcast(&self, kind: CacheKind, key: CacheKey) {
        self.cluster.publish(InvalidationMessage {
            origin: self.node_id().to_string(),
            kind,
            key,
        });
    }

    async fn evict(&self, kind: CacheKind, key: &CacheKey) {
        self.epochs[kind as usize].fetch_add(1, Ordering::AcqRel);
        match key {
            CacheKey::Key(id) => match kind {
                CacheKind::Products => self.products().invalidate(id).await,
                CacheKind::Orders => self.orders().invalidate(id).await,
                CacheKind::Categories => self.categories().invalidate(id).await,
            },
            CacheKey::Wildcard => match kind {
                CacheKind::Products => self.products().invalidate_all(),
                CacheKind::Orders => self.orders().invalidate_all(),
                CacheKind::Categories => self.categories().invalidate_all(),
            },
        }
    }

    async fn lookup(&self, kind: CacheKind, id: &str) -> Option<StoreResponse> {
        match kind {
            CacheKind::Products => self.products().get(id).await.map(StoreResponse::Product),
            CacheKind::Orders => self.orders().get(id).await.map(StoreResponse::Order),
            CacheKind::Categories => self.categories().get(id).await.map(StoreResponse::Category),
        }
    }

    // Insert, then re-check the epoch: an eviction that slipped in between removes what we just put in.
    async fn populate(&self, kind: CacheKind, id: &str, response: &StoreResponse, ticket: Ticket) {
        if self.epoch(kind) != ticket.0 {
            tracing::trace!("[{}] stale read of {kind} '{id}' not cached", self.node_id());
            return;
        }
        match response {
            StoreResponse::Product(v) => self.products().insert(id.to_string(), v.clone()).await,
            StoreResponse::Order(v) => self.orders().insert(id.to_string(), v.clone()).await,
            StoreResponse::Category(v) => self.categories().insert(id.to_string(), v.clone()).await,
            _ => return,
        }
        if self.epoch(kind) != ticket.0 {
            self.evict(kind, &CacheKey::Key(id.to_string())).await;
        }
    }

    fn target<'a>(request: &'a StoreRequest) -> Option<Target<'a>> {
        Some(match request {
            StoreRequest::ProductGet(id) => Target::Read(CacheKind::Products, id),
            StoreRequest::OrderGet(id) => Target::Read(CacheKind::Orders, id),
            StoreRequest::CategoryGet(id) => Target::Read(CacheKind::Categories, id),
            StoreRequest::ProductUpdate(p) => Target::Write(CacheKind::Products, CacheKey::Key(p.id.clone())),
            StoreRequest::ProductDelete(id) => Target::Write(CacheKind::Products, CacheKey::Key(id.clone())),
            StoreRequest::OrderUpdate(o) => Target::Write(CacheKind::Orders, CacheKey::Key(o.id.clone())),
            StoreRequest::OrderDelete(id) => Target::Write(CacheKind::Orders, CacheKey::Key(id.clone())),
            // Tree mutations renumber an unknown set of nodes.
            StoreRequest::CategoryMutate(_) => Target::Write(CacheKind::Categories, CacheKey::Wildcard),
            _ => return None,
        })
    }

    fn bypass(hints: &Hints) -> bool {
        hints.no_cache || hints.include_deleted
    }
}

impl fmt::Debug for LocalCacheSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCacheSupplier")
            .field("node_id", &self.node_id())
            .field("products", &self.products().entry_count())
            .field("orders", &self.orders().entry_count())
            .field("categories", &self.categories().entry_count())
            .finish()
    }
}

impl Drop for LocalCacheSupplier {
    fn drop(&mut self) {
        if let Some(listener) = self.clear_listener() {
            listener.abort();
        }
    }
}

#[async_trait]
impl Supplier for LocalCacheSupplier {
    fn name(&self) -> &'static str {
        "local_cache"
    }

    #[instrument(level = "trace", skip(self, request), fields(op = request.op()))]
    async fn supply(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<Supplied> {
        if let Some(Target::Read(kind, id)) = Self::target(request) {
            if !Self::bypass(hints) {
                // Take the ticket before looking so that an eviction racing the lookup invalidates it.
                let ticket = Ticket(self.epoch(kind));
                if let Some(response) = self.lookup(kind, id).await {
                    return Ok(Supplied::Answer(response));
                }
                return Ok(Supplied::Forward(ticket));
            }
        }
        Ok(Supplied::forward())
    }

    async fn after_answer(
        &self,
        request: &StoreRequest,
        response: &StoreResponse,
        hints: &Hints,
        ticket: Ticket,
    ) -> StoreResult<()> {
        match Self::target(request) {
            Some(Target::Read(kind, id)) => {
                if !Self::bypass(hints) {
                    self.populate(kind, id, response, ticket).await;
                }
            }
            Some(Target::Write(kind, key)) => {
                self.evict(kind, &key).await;
                self.broadcast(kind, key);
            }
            None => (),
        }
        Ok(())
    }
}

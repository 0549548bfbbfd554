//! Typed entry points.
//!
//! [`Store`] owns a supplier chain. Every method builds a [`StoreRequest`], dispatches it through the chain on its own
//! task and hands back a [`StoreChannel`] for the typed result.
//!
//! The standard chain (optional local cache, then retrying SQL) is assembled on first use from what the builder was
//! given; [`Store::from_chain`] takes a ready one instead.
use std::sync::Arc;

use fieldx::fxstruct;
use sea_orm::DatabaseConnection;

use crate::cluster::CacheKind;
use crate::cluster::Cluster;
use crate::cluster::NoCluster;
use crate::cursor::Cursor;
use crate::cursor::MAX_OFFSET;
use crate::cursor::MAX_PER_PAGE;
use crate::dispatch::dispatch;
use crate::dispatch::StoreChannel;
use crate::entity::new_id;
use crate::entity::now_millis;
use crate::entity::Category;
use crate::entity::Message;
use crate::entity::Order;
use crate::entity::Product;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::local_cache::CacheSettings;
use crate::local_cache::LocalCacheSupplier;
use crate::request::FromResponse;
use crate::request::StoreRequest;
use crate::retry::RetryPolicy;
use crate::retry::RetrySupplier;
use crate::sql::SqlSupplier;
use crate::supplier::Hints;
use crate::supplier::SupplierChain;
use crate::tree::TreeMutation;

#[fxstruct(
    sync,
    rc,
    no_new,
    default(off),
    fallible(off, error(StoreError)),
    builder(
        doc("Builder object of [`Store`].", "", "See [`Store::builder()`] method."),
        method_doc("Implement builder pattern for [`Store`]."),
    )
)]
pub struct Store {
    /// All writes go here.
    #[fieldx(optional, get(clone, private))]
    primary: DatabaseConnection,

    /// Reads are spread over these when given.
    #[fieldx(get(clone, private), default(Vec::new()))]
    replicas: Vec<DatabaseConnection>,

    /// Put a local cache in front of the database.
    #[fieldx(optional, get(copy))]
    cache_settings: CacheSettings,

    /// Bus the local cache is invalidated through. Without one the cache only serves this node.
    #[fieldx(optional, get(clone, private))]
    cluster: Arc<dyn Cluster>,

    #[fieldx(get(copy), default(RetryPolicy::default()))]
    retry: RetryPolicy,

    /// Largest page size a listing may ask for.
    #[fieldx(get(copy), default(MAX_PER_PAGE))]
    max_per_page: u64,

    /// The local cache layer, if the chain has one.
    #[fieldx(lazy, fallible, get(clone), builder(off))]
    cache: Option<Arc<LocalCacheSupplier>>,

    /// Replaces the standard chain when given to the builder.
    #[fieldx(lazy, fallible, get(clone))]
    chain: SupplierChain,
}

impl Store {
    /// A store over an arbitrary, already assembled chain.
    pub fn from_chain(chain: SupplierChain) -> StoreResult<Arc<Self>> {
        Self::builder().chain(chain).build().map_err(StoreError::builder)
    }

    // Starts the invalidation listener and therefore runs within a tokio runtime.
    fn build_cache(&self) -> StoreResult<Option<Arc<LocalCacheSupplier>>> {
        let Some(settings) = self.cache_settings()
        else {
            return Ok(None);
        };
        let cluster: Arc<dyn Cluster> = match self.cluster() {
            Some(cluster) => cluster,
            None => Arc::new(NoCluster::new()),
        };

        let cache = LocalCacheSupplier::with_settings(settings, cluster)?;
        cache.start();
        Ok(Some(cache))
    }

    fn build_chain(&self) -> StoreResult<SupplierChain> {
        let Some(primary) = self.primary()
        else {
            return Err(StoreError::internal("store.no_primary"));
        };

        let sql = SqlSupplier::new(primary).with_replicas(self.replicas());
        let retry = RetrySupplier::builder()
            .inner(Arc::new(sql))
            .policy(self.retry())
            .build()
            .map_err(StoreError::builder)?;

        let mut chain = SupplierChain::builder();
        if let Some(cache) = self.cache()? {
            chain = chain.shared_layer(cache);
        }
        let chain = chain.layer(retry).build();

        tracing::debug!(
            "store chain: {}",
            (0..chain.len())
                .filter_map(|i| chain.layer(i).map(|l| l.name()))
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(chain)
    }

    pub fn product(&self) -> ProductStore<'_> {
        ProductStore { store: self }
    }

    pub fn order(&self) -> OrderStore<'_> {
        OrderStore { store: self }
    }

    pub fn message(&self) -> MessageStore<'_> {
        MessageStore { store: self }
    }

    pub fn category(&self) -> CategoryStore<'_> {
        CategoryStore { store: self }
    }

    /// Drop every locally cached entity of `kind` and tell the other nodes to do the same.
    pub async fn purge_cache(&self, kind: CacheKind) -> StoreResult<()> {
        if let Some(cache) = self.cache()? {
            cache.purge(kind).await;
        }
        Ok(())
    }

    fn call<T>(&self, request: StoreRequest, hints: Hints) -> StoreChannel<T>
    where
        T: FromResponse + Send + 'static,
    {
        match self.chain() {
            Ok(chain) => dispatch(request.op(), async move { T::from_response(chain.supply(&request, &hints).await?) }),
            Err(err) => StoreChannel::ready(request.op(), Err(err)),
        }
    }

    // Page sizes beyond the configured maximum and offsets no database accepts are refused before anything is
    // dispatched.
    fn check_cursor(&self, cursor: &Cursor) -> Result<(), StoreError> {
        let max_per_page = self.max_per_page();
        if let Some(limit) = cursor.limit() {
            if limit == 0 || limit > max_per_page {
                return Err(StoreError::bad_cursor("per_page", format!("{limit} is not within 1..={max_per_page}")));
            }
        }
        if let Some(offset) = cursor.offset() {
            if offset > MAX_OFFSET {
                return Err(StoreError::bad_cursor("page", format!("offset {offset} is out of range")));
            }
        }
        Ok(())
    }

    fn list<T>(&self, cursor: &Cursor, request: StoreRequest, hints: Hints) -> StoreChannel<T>
    where
        T: FromResponse + Send + 'static,
    {
        match self.check_cursor(cursor) {
            Ok(()) => self.call(request, hints),
            Err(err) => StoreChannel::ready(request.op(), Err(err)),
        }
    }
}

pub struct ProductStore<'a> {
    store: &'a Store,
}

impl ProductStore<'_> {
    /// Insert a new product. It must not have an id yet.
    pub fn save(&self, product: Product) -> StoreChannel<Product> {
        self.store.call(StoreRequest::ProductSave(product), Hints::default())
    }

    pub fn get(&self, id: &str) -> StoreChannel<Product> {
        self.get_with(id, Hints::default())
    }

    pub fn get_with(&self, id: &str, hints: Hints) -> StoreChannel<Product> {
        self.store.call(StoreRequest::ProductGet(id.to_string()), hints)
    }

    pub fn update(&self, product: Product) -> StoreChannel<Product> {
        self.store.call(StoreRequest::ProductUpdate(product), Hints::default())
    }

    pub fn delete(&self, id: &str) -> StoreChannel<()> {
        self.store.call(StoreRequest::ProductDelete(id.to_string()), Hints::default())
    }

    pub fn list(&self, cursor: Cursor) -> StoreChannel<EntityList<Product>> {
        self.list_with(cursor, Hints::default())
    }

    pub fn list_with(&self, cursor: Cursor, hints: Hints) -> StoreChannel<EntityList<Product>> {
        self.store.list(&cursor.clone(), StoreRequest::ProductList(cursor), hints)
    }
}

pub struct OrderStore<'a> {
    store: &'a Store,
}

impl OrderStore<'_> {
    pub fn save(&self, order: Order) -> StoreChannel<Order> {
        self.store.call(StoreRequest::OrderSave(order), Hints::default())
    }

    pub fn get(&self, id: &str) -> StoreChannel<Order> {
        self.get_with(id, Hints::default())
    }

    pub fn get_with(&self, id: &str, hints: Hints) -> StoreChannel<Order> {
        self.store.call(StoreRequest::OrderGet(id.to_string()), hints)
    }

    pub fn update(&self, order: Order) -> StoreChannel<Order> {
        self.store.call(StoreRequest::OrderUpdate(order), Hints::default())
    }

    pub fn delete(&self, id: &str) -> StoreChannel<()> {
        self.store.call(StoreRequest::OrderDelete(id.to_string()), Hints::default())
    }

    /// Orders of all customers.
    pub fn list(&self, cursor: Cursor) -> StoreChannel<EntityList<Order>> {
        self.list_with(None, cursor, Hints::default())
    }

    pub fn list_for_customer(&self, customer_id: &str, cursor: Cursor) -> StoreChannel<EntityList<Order>> {
        self.list_with(Some(customer_id), cursor, Hints::default())
    }

    pub fn list_with(&self, customer_id: Option<&str>, cursor: Cursor, hints: Hints) -> StoreChannel<EntityList<Order>> {
        let request = StoreRequest::OrderList {
            customer_id: customer_id.map(str::to_string),
            cursor:      cursor.clone(),
        };
        self.store.list(&cursor, request, hints)
    }
}

pub struct MessageStore<'a> {
    store: &'a Store,
}

impl MessageStore<'_> {
    pub fn save(&self, message: Message) -> StoreChannel<Message> {
        self.store.call(StoreRequest::MessageSave(message), Hints::default())
    }

    pub fn get(&self, id: &str) -> StoreChannel<Message> {
        self.get_with(id, Hints::default())
    }

    pub fn get_with(&self, id: &str, hints: Hints) -> StoreChannel<Message> {
        self.store.call(StoreRequest::MessageGet(id.to_string()), hints)
    }

    pub fn update(&self, message: Message) -> StoreChannel<Message> {
        self.store.call(StoreRequest::MessageUpdate(message), Hints::default())
    }

    pub fn delete(&self, id: &str) -> StoreChannel<()> {
        self.store.call(StoreRequest::MessageDelete(id.to_string()), Hints::default())
    }

    /// Messages of a channel.
    pub fn list(&self, channel_id: &str, cursor: Cursor) -> StoreChannel<EntityList<Message>> {
        self.list_with(channel_id, cursor, Hints::default())
    }

    pub fn list_with(&self, channel_id: &str, cursor: Cursor, hints: Hints) -> StoreChannel<EntityList<Message>> {
        let request = StoreRequest::MessageList {
            channel_id: channel_id.to_string(),
            cursor:     cursor.clone(),
        };
        self.store.list(&cursor, request, hints)
    }
}

pub struct CategoryStore<'a> {
    store: &'a Store,
}

impl CategoryStore<'_> {
    /// Create a node as the last child of `parent_id`, or as a new root.
    pub fn create(&self, parent_id: Option<&str>, name: &str) -> StoreChannel<Category> {
        let now = now_millis();
        self.mutate(TreeMutation::Insert {
            id:        new_id(),
            parent_id: parent_id.map(str::to_string),
            name:      name.to_string(),
            create_at: now,
            update_at: now,
        })
    }

    pub fn get(&self, id: &str) -> StoreChannel<Category> {
        self.store.call(StoreRequest::CategoryGet(id.to_string()), Hints::default())
    }

    /// The existing nodes among `ids`, in tree order.
    pub fn get_by_ids(&self, ids: Vec<String>) -> StoreChannel<EntityList<Category>> {
        self.store.call(StoreRequest::CategoryGetMany(ids), Hints::default())
    }

    pub fn descendants(&self, id: &str) -> StoreChannel<EntityList<Category>> {
        self.store.call(StoreRequest::CategoryDescendants(id.to_string()), Hints::default())
    }

    /// Root first, the node itself last.
    pub fn path(&self, id: &str) -> StoreChannel<EntityList<Category>> {
        self.store.call(StoreRequest::CategoryPath(id.to_string()), Hints::default())
    }

    pub fn roots(&self) -> StoreChannel<EntityList<Category>> {
        self.store.call(StoreRequest::CategoryRoots, Hints::default())
    }

    /// Re-attach `id` with its subtree as the last child of `parent_id`, or make it a root.
    pub fn move_to(&self, id: &str, parent_id: Option<&str>) -> StoreChannel<Category> {
        self.mutate(TreeMutation::Move {
            id:        id.to_string(),
            parent_id: parent_id.map(str::to_string),
            update_at: now_millis(),
        })
    }

    /// Move `id` to index `position` among its siblings.
    pub fn order(&self, id: &str, position: u32) -> StoreChannel<Category> {
        self.mutate(TreeMutation::Order {
            id: id.to_string(),
            position,
            update_at: now_millis(),
        })
    }

    pub fn rename(&self, id: &str, name: &str) -> StoreChannel<Category> {
        self.mutate(TreeMutation::Rename {
            id:        id.to_string(),
            name:      name.to_string(),
            update_at: now_millis(),
        })
    }

    /// Remove `id` and everything below it.
    pub fn delete(&self, id: &str) -> StoreChannel<()> {
        self.mutate(TreeMutation::Delete { id: id.to_string() })
    }

    fn mutate<T>(&self, mutation: TreeMutation) -> StoreChannel<T>
    where
        T: FromResponse + Send + 'static,
    {
        self.store.call(StoreRequest::CategoryMutate(mutation), Hints::default())
    }
}

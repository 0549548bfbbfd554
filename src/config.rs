//! Process-level configuration: command line flags with `LSTORE_*` environment fallbacks.
use std::sync::Arc;
use std::time::Duration;

use sea_orm::ConnectOptions;
use sea_orm::ConnectionTrait;
use sea_orm::Database;
use sea_orm::DatabaseConnection;
use sea_orm::DbBackend;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::cluster::Cluster;
use crate::cluster::NoCluster;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::local_cache::CacheSettings;
use crate::migrations::Migrator;
use crate::retry::RetryPolicy;
use crate::store::Store;

#[derive(Debug, Clone, clap::Parser)]
#[clap(about, version, name = "layered-store")]
pub struct StoreConfig {
    /// Connection string of the primary database; all writes go here.
    #[clap(long, env = "LSTORE_PRIMARY")]
    pub primary: String,

    /// Read replicas. Repeat the flag or give a comma-separated list.
    #[clap(long = "replica", env = "LSTORE_REPLICAS", value_delimiter = ',')]
    pub replicas: Vec<String>,

    /// Identity of this node on the invalidation bus. Random when omitted.
    #[clap(long, env = "LSTORE_NODE_ID")]
    pub node_id: Option<String>,

    /// Entries per entity kind held by the local cache. 0 disables the cache.
    #[clap(long, env = "LSTORE_CACHE_CAPACITY", default_value_t = 10_000)]
    pub cache_capacity: u64,

    /// Seconds a cached entity stays valid.
    #[clap(long, env = "LSTORE_CACHE_TTL", default_value_t = 900)]
    pub cache_ttl: u64,

    /// Retries of a transiently failed database operation.
    #[clap(long, env = "LSTORE_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Initial delay between retries, in milliseconds. Doubles on every retry.
    #[clap(long, env = "LSTORE_RETRY_BACKOFF", default_value_t = 50)]
    pub retry_backoff: u64,

    /// Largest page size a listing may ask for.
    #[clap(long, env = "LSTORE_MAX_PER_PAGE", default_value_t = crate::cursor::MAX_PER_PAGE)]
    pub max_per_page: u64,

    /// Connection pool size per database.
    #[clap(long, env = "LSTORE_MAX_CONNECTIONS", default_value_t = 16)]
    pub max_connections: u32,

    /// Bring the schema up to date on connect.
    #[clap(long, env = "LSTORE_MIGRATE")]
    pub migrate: bool,
}

impl StoreConfig {
    pub fn validate(&self) -> StoreResult<()> {
        if self.primary.trim().is_empty() {
            return Err(StoreError::validation("config", "primary connection string is empty"));
        }
        if let Some(empty) = self.replicas.iter().position(|r| r.trim().is_empty()) {
            return Err(StoreError::validation("config", format!("replica #{empty} is empty")));
        }
        if self.node_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(StoreError::validation("config", "node id is empty"));
        }
        if self.cache_capacity > 0 && self.cache_ttl == 0 {
            return Err(StoreError::validation("config", "cache TTL must be positive"));
        }
        if self.max_per_page == 0 {
            return Err(StoreError::validation("config", "max per page must be positive"));
        }
        if self.max_connections == 0 {
            return Err(StoreError::validation("config", "max connections must be positive"));
        }
        Ok(())
    }

    /// `None` when the cache is disabled.
    pub fn cache_settings(&self) -> Option<CacheSettings> {
        (self.cache_capacity > 0).then(|| CacheSettings {
            max_capacity: self.cache_capacity,
            time_to_live: Duration::from_secs(self.cache_ttl),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.retry_backoff),
            ..RetryPolicy::default()
        }
    }

    /// Connect as a single node.
    pub async fn connect(&self) -> StoreResult<Arc<Store>> {
        let cluster = match &self.node_id {
            Some(node_id) => NoCluster::with_node_id(node_id.clone()),
            None => NoCluster::new(),
        };
        self.connect_with_cluster(Arc::new(cluster)).await
    }

    /// Connect with the cache invalidated through `cluster`.
    pub async fn connect_with_cluster(&self, cluster: Arc<dyn Cluster>) -> StoreResult<Arc<Store>> {
        self.validate()?;

        let primary = self.open(&self.primary).await?;
        if self.migrate {
            Migrator::up(&primary, None).await?;
            info!("schema is up to date");
        }

        let mut replicas = Vec::with_capacity(self.replicas.len());
        for dsn in &self.replicas {
            replicas.push(self.open(dsn).await?);
        }

        let mut builder = Store::builder()
            .primary(primary)
            .replicas(replicas)
            .retry(self.retry_policy())
            .max_per_page(self.max_per_page);
        if let Some(settings) = self.cache_settings() {
            builder = builder.cache_settings(settings).cluster(cluster);
        }
        let store = builder.build().map_err(StoreError::builder)?;

        info!(
            "store connected: {} replica(s), cache {}",
            self.replicas.len(),
            if self.cache_capacity > 0 { "on" } else { "off" }
        );
        Ok(store)
    }

    async fn open(&self, dsn: &str) -> StoreResult<DatabaseConnection> {
        let mut options = ConnectOptions::new(dsn);
        options.max_connections(self.max_connections).sqlx_logging(false);

        let db = Database::connect(options)
            .await
            .map_err(|err| StoreError::internal_with("store.connect", err))?;
        if db.get_database_backend() == DbBackend::Sqlite {
            configure_sqlite(&db).await?;
        }
        Ok(db)
    }
}

/// Pragmas every SQLite connection is opened with.
pub async fn configure_sqlite(db: &DatabaseConnection) -> StoreResult<()> {
    db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
    db.execute_unprepared("PRAGMA cache=64000;").await?;
    db.execute_unprepared("PRAGMA synchronous=NORMAL;").await?;
    db.execute_unprepared("PRAGMA busy_timeout=5000;").await?;
    Ok(())
}

//! The layer that answers everything from the database.
//!
//! Writes always go to the primary connection. Reads are spread round-robin over the replicas, if any, unless the
//! caller asked for [`Hints::use_primary`].
pub mod category;
pub mod message;
pub mod order;
pub mod pagination;
pub mod product;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveModelTrait;
use sea_orm::ColumnTrait;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::IntoActiveModel;
use sea_orm::QueryFilter;
use tracing::instrument;

use crate::entity::now_millis;
use crate::entity::Messages;
use crate::entity::Orders;
use crate::entity::Products;
use crate::entity::StoreEntity;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::request::StoreRequest;
use crate::request::StoreResponse;
use crate::supplier::Hints;
use crate::supplier::Supplied;
use crate::supplier::Supplier;
use crate::tree::TreeMutation;
use crate::tree::TreeProcedure;

use self::category::SqlTreeProcedure;
use self::pagination::Listable;

#[derive(Debug)]
pub struct SqlSupplier {
    primary:      DatabaseConnection,
    replicas:     Vec<DatabaseConnection>,
    next_replica: AtomicUsize,
    tree:         SqlTreeProcedure,
}

impl SqlSupplier {
    pub fn new(primary: DatabaseConnection) -> Self {
        Self {
            tree: SqlTreeProcedure::new(primary.clone()),
            primary,
            replicas: Vec::new(),
            next_replica: AtomicUsize::new(0),
        }
    }

    pub fn with_replicas(mut self, replicas: Vec<DatabaseConnection>) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn primary(&self) -> &DatabaseConnection {
        &self.primary
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn tree(&self) -> &SqlTreeProcedure {
        &self.tree
    }

    fn reader(&self, hints: &Hints) -> &DatabaseConnection {
        if hints.use_primary || self.replicas.is_empty() {
            &self.primary
        }
        else {
            let idx = self.next_replica.fetch_add(1, Ordering::Relaxed) % self.replicas.len();
            &self.replicas[idx]
        }
    }

    async fn handle(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<StoreResponse> {
        let primary = &self.primary;
        Ok(match request {
            StoreRequest::ProductSave(p) => save::<Products, _>(primary, p.clone()).await?.into(),
            StoreRequest::ProductGet(id) => fetch::<Products, _>(self.reader(hints), id, hints).await?.into(),
            StoreRequest::ProductUpdate(p) => update::<Products, _>(primary, p.clone()).await?.into(),
            StoreRequest::ProductDelete(id) => {
                soft_delete::<Products, _>(primary, id).await?;
                StoreResponse::Done
            }
            StoreRequest::ProductList(cursor) => product::list(self.reader(hints), cursor, hints).await?.into(),

            StoreRequest::OrderSave(o) => save::<Orders, _>(primary, o.clone()).await?.into(),
            StoreRequest::OrderGet(id) => fetch::<Orders, _>(self.reader(hints), id, hints).await?.into(),
            StoreRequest::OrderUpdate(o) => update::<Orders, _>(primary, o.clone()).await?.into(),
            StoreRequest::OrderDelete(id) => {
                soft_delete::<Orders, _>(primary, id).await?;
                StoreResponse::Done
            }
            StoreRequest::OrderList { customer_id, cursor } => {
                order::list(self.reader(hints), customer_id.as_deref(), cursor, hints)
                    .await?
                    .into()
            }

            StoreRequest::MessageSave(m) => save::<Messages, _>(primary, m.clone()).await?.into(),
            StoreRequest::MessageGet(id) => fetch::<Messages, _>(self.reader(hints), id, hints).await?.into(),
            StoreRequest::MessageUpdate(m) => update::<Messages, _>(primary, m.clone()).await?.into(),
            StoreRequest::MessageDelete(id) => {
                soft_delete::<Messages, _>(primary, id).await?;
                StoreResponse::Done
            }
            StoreRequest::MessageList { channel_id, cursor } => {
                message::list(self.reader(hints), channel_id, cursor, hints).await?.into()
            }

            StoreRequest::CategoryGet(id) => category::get(self.reader(hints), id).await?.into(),
            StoreRequest::CategoryGetMany(ids) => category::get_by_ids(self.reader(hints), ids).await?.into(),
            StoreRequest::CategoryDescendants(id) => category::descendants(self.reader(hints), id).await?.into(),
            StoreRequest::CategoryPath(id) => category::path(self.reader(hints), id).await?.into(),
            StoreRequest::CategoryRoots => category::roots(self.reader(hints)).await?.into(),
            StoreRequest::CategoryMutate(mutation) => {
                self.tree.apply(mutation.clone()).await?;
                match mutation {
                    TreeMutation::Delete { .. } => StoreResponse::Done,
                    // The node has just been written; read it back from where it was written.
                    _ => category::get(primary, mutation.id()).await?.into(),
                }
            }
        })
    }
}

#[async_trait]
impl Supplier for SqlSupplier {
    fn name(&self) -> &'static str {
        "sql"
    }

    #[instrument(level = "trace", skip(self, request), fields(op = request.op()))]
    async fn supply(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<Supplied> {
        match self.handle(request, hints).await {
            Ok(response) => Ok(Supplied::Answer(response)),
            Err(err) => {
                if let StoreError::Internal { source, .. } = &err {
                    tracing::error!("{} failed: {err}; caused by: {source:?}", request.op());
                }
                else {
                    tracing::debug!("{} rejected: {err}", request.op());
                }
                Err(err)
            }
        }
    }
}

/// Fetch a live row by id.
pub(crate) async fn fetch<E, C>(conn: &C, id: &str, hints: &Hints) -> StoreResult<E::Model>
where
    E: Listable,
    E::Model: StoreEntity,
    C: ConnectionTrait,
{
    pagination::by_id::<E>(id)
        .filter(E::live(hints))
        .one(conn)
        .await?
        .ok_or_else(|| StoreError::not_found(<E::Model as StoreEntity>::ENTITY, id))
}

/// Insert a new entity. Only entities without an id can be saved.
pub(crate) async fn save<E, C>(conn: &C, mut model: E::Model) -> StoreResult<E::Model>
where
    E: Listable,
    E::Model: StoreEntity + IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    if !model.id().is_empty() {
        return Err(StoreError::conflict(<E::Model as StoreEntity>::ENTITY, model.id()));
    }
    model.pre_save();
    model.is_valid()?;

    E::insert(model.clone().into_active_model())
        .exec_without_returning(conn)
        .await
        .map_err(|err| StoreError::from(err).or_conflict(<E::Model as StoreEntity>::ENTITY, model.id()))?;

    Ok(model)
}

/// Replace a live row. `create_at` and the deletion mark are kept and `update_at` moves forward.
///
/// The write itself only matches a row that is still live, so an update racing a delete either lands before it or
/// fails with not-found; it never brings the deleted row back.
pub(crate) async fn update<E, C>(conn: &C, mut model: E::Model) -> StoreResult<E::Model>
where
    E: Listable,
    E::Model: StoreEntity + IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    let previous = fetch::<E, C>(conn, model.id(), &Hints::default()).await?;
    model.pre_update(&previous);
    model.is_valid()?;

    let mut write = E::update_many()
        .set(model.clone().into_active_model().reset_all())
        .filter(E::id_column().eq(model.id()));
    if let Some(delete_at) = E::delete_at_column() {
        write = write.filter(delete_at.eq(0));
    }

    if write.exec(conn).await?.rows_affected == 0 {
        return Err(StoreError::not_found(<E::Model as StoreEntity>::ENTITY, model.id()));
    }
    Ok(model)
}

/// Mark a live row deleted.
pub(crate) async fn soft_delete<E, C>(conn: &C, id: &str) -> StoreResult<()>
where
    E: Listable,
    E::Model: StoreEntity,
    C: ConnectionTrait,
{
    let Some(delete_at) = E::delete_at_column()
    else {
        return Err(StoreError::internal("store.no_soft_delete"));
    };
    let now = now_millis();

    let result = E::update_many()
        .col_expr(delete_at, Expr::value(now))
        .col_expr(E::update_at_column(), Expr::value(now))
        .filter(E::id_column().eq(id))
        .filter(delete_at.eq(0))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::not_found(<E::Model as StoreEntity>::ENTITY, id));
    }
    Ok(())
}

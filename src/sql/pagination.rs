//! The four retrieval modes, written once for every listable table.
use sea_orm::ColumnTrait;
use sea_orm::Condition;
use sea_orm::ConnectionTrait;
use sea_orm::EntityTrait;
use sea_orm::QueryFilter;
use sea_orm::QueryOrder;
use sea_orm::QuerySelect;
use sea_orm::Select;

use crate::cursor::Cursor;
use crate::entity::StoreEntity;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::supplier::Hints;

/// A table that follows the `id`/`create_at`/`update_at`/`delete_at` convention.
pub trait Listable: EntityTrait {
    fn id_column() -> Self::Column;
    fn create_at_column() -> Self::Column;
    fn update_at_column() -> Self::Column;
    /// `None` for tables whose rows are removed physically.
    fn delete_at_column() -> Option<Self::Column>;

    /// Condition excluding soft-deleted rows unless `hints` asks for them.
    fn live(hints: &Hints) -> Condition {
        match Self::delete_at_column() {
            Some(column) if !hints.include_deleted => Condition::all().add(column.eq(0)),
            _ => Condition::all(),
        }
    }
}

/// Run `cursor` against the rows of `E` matching `scope`.
///
/// `Since` results are ordered by `update_at`, everything else by `create_at` except plain pages which show the most
/// recently updated rows first. A `before`/`after` anchor that does not exist within `scope` yields an empty list.
pub async fn list<E, C>(conn: &C, scope: Condition, cursor: &Cursor, hints: &Hints) -> StoreResult<EntityList<E::Model>>
where
    E: Listable,
    E::Model: StoreEntity,
    C: ConnectionTrait,
{
    let id = E::id_column();
    let create_at = E::create_at_column();
    let update_at = E::update_at_column();
    let condition = scope.clone().add(E::live(hints));

    let rows = match cursor {
        Cursor::Page { offset, limit } => {
            E::find()
                .filter(condition)
                .order_by_desc(update_at)
                .order_by_desc(id)
                .offset(*offset)
                .limit(*limit)
                .all(conn)
                .await?
        }
        Cursor::Since { since } => {
            E::find()
                .filter(condition.add(update_at.gt(*since)))
                .order_by_asc(update_at)
                .order_by_asc(id)
                .all(conn)
                .await?
        }
        Cursor::After { anchor, offset, limit } => {
            let Some(anchor_at) = anchor_create_at::<E, C>(conn, &scope, anchor).await?
            else {
                return Ok(EntityList::new());
            };
            E::find()
                .filter(condition.add(create_at.gt(anchor_at)))
                .order_by_asc(create_at)
                .order_by_asc(id)
                .offset(*offset)
                .limit(*limit)
                .all(conn)
                .await?
        }
        Cursor::Before { anchor, offset, limit } => {
            let Some(anchor_at) = anchor_create_at::<E, C>(conn, &scope, anchor).await?
            else {
                return Ok(EntityList::new());
            };
            // Walk the index backwards from the anchor, then restore chronological order.
            let mut rows = E::find()
                .filter(condition.add(create_at.lt(anchor_at)))
                .order_by_desc(create_at)
                .order_by_desc(id)
                .offset(*offset)
                .limit(*limit)
                .all(conn)
                .await?;
            rows.reverse();
            rows
        }
    };

    Ok(EntityList::from_ordered(rows))
}

// The anchor is looked up regardless of its own deletion state: a deleted message still marks a position. It must
// belong to the listed scope though.
async fn anchor_create_at<E, C>(conn: &C, scope: &Condition, anchor: &str) -> StoreResult<Option<i64>>
where
    E: Listable,
    E::Model: StoreEntity,
    C: ConnectionTrait,
{
    Ok(E::find()
        .filter(scope.clone())
        .filter(E::id_column().eq(anchor))
        .one(conn)
        .await?
        .map(|row| row.create_at()))
}

/// Rows of `E` whose ids are in `ids`, unordered. Soft-deleted ones are dropped unless `hints` says otherwise.
pub async fn by_ids<E, C>(conn: &C, ids: Vec<String>, hints: &Hints) -> StoreResult<Vec<E::Model>>
where
    E: Listable,
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(E::find()
        .filter(E::id_column().is_in(ids))
        .filter(E::live(hints))
        .all(conn)
        .await?)
}

/// Base select of `E` filtered by id.
pub fn by_id<E: Listable>(id: &str) -> Select<E> {
    E::find().filter(E::id_column().eq(id))
}

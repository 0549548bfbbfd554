use sea_orm::Condition;
use sea_orm::ConnectionTrait;

use crate::cursor::Cursor;
use crate::entity::product::Column;
use crate::entity::Product;
use crate::entity::Products;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::supplier::Hints;

use super::pagination;
use super::pagination::Listable;

impl Listable for Products {
    fn id_column() -> Column {
        Column::Id
    }

    fn create_at_column() -> Column {
        Column::CreateAt
    }

    fn update_at_column() -> Column {
        Column::UpdateAt
    }

    fn delete_at_column() -> Option<Column> {
        Some(Column::DeleteAt)
    }
}

/// The whole catalogue is one listing.
pub async fn list<C: ConnectionTrait>(conn: &C, cursor: &Cursor, hints: &Hints) -> StoreResult<EntityList<Product>> {
    pagination::list::<Products, C>(conn, Condition::all(), cursor, hints).await
}

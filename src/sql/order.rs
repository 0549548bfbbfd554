use sea_orm::ColumnTrait;
use sea_orm::Condition;
use sea_orm::ConnectionTrait;

use crate::cursor::Cursor;
use crate::entity::order::Column;
use crate::entity::Order;
use crate::entity::Orders;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::supplier::Hints;

use super::pagination;
use super::pagination::Listable;

impl Listable for Orders {
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

/// Orders of one customer, or of everybody when `customer_id` is `None`.
pub async fn list<C: ConnectionTrait>(
    conn: &C,
    customer_id: Option<&str>,
    cursor: &Cursor,
    hints: &Hints,
) -> StoreResult<EntityList<Order>> {
    let scope = match customer_id {
        Some(customer_id) => Condition::all().add(Column::CustomerId.eq(customer_id)),
        None => Condition::all(),
    };
    pagination::list::<Orders, C>(conn, scope, cursor, hints).await
}

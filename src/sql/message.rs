use std::collections::HashSet;

use sea_orm::ColumnTrait;
use sea_orm::Condition;
use sea_orm::ConnectionTrait;

use crate::cursor::Cursor;
use crate::entity::message::Column;
use crate::entity::Message;
use crate::entity::Messages;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::supplier::Hints;

use super::pagination;
use super::pagination::Listable;

impl Listable for Messages {
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

/// Messages of a channel.
///
/// For `since` listings the roots of any replies in the result are added to the items, outside of the order, so that a
/// syncing client can place every reply in its thread without another round trip.
pub async fn list<C: ConnectionTrait>(
    conn: &C,
    channel_id: &str,
    cursor: &Cursor,
    hints: &Hints,
) -> StoreResult<EntityList<Message>> {
    let scope = Condition::all().add(Column::ChannelId.eq(channel_id));
    let mut list = pagination::list::<Messages, C>(conn, scope, cursor, hints).await?;

    if matches!(cursor, Cursor::Since { .. }) {
        let missing: HashSet<String> = list
            .iter()
            .filter(|m| m.is_reply() && list.get(&m.root_id).is_none())
            .map(|m| m.root_id.clone())
            .collect();
        if !missing.is_empty() {
            tracing::trace!("adding {} thread root(s) to a since listing of '{channel_id}'", missing.len());
            for root in pagination::by_ids::<Messages, C>(conn, missing.into_iter().collect(), hints).await? {
                list.add_item(root);
            }
        }
    }

    Ok(list)
}

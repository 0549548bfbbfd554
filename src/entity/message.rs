use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use super::check_id;
use super::check_len;
use super::store_entity_basics;
use super::StoreEntity;
use crate::error::StoreError;
use crate::error::StoreResult;

/// Longest message body accepted by the store, in characters.
pub const MAX_MESSAGE_LEN: usize = 16_383;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:         String,
    #[sea_orm(indexed)]
    pub channel_id: String,
    pub user_id:    String,
    /// Id of the thread root this message replies to. Empty for a root message.
    #[serde(default)]
    pub root_id:    String,
    pub message:    String,
    /// Free-form properties as a serialized JSON object.
    #[serde(default)]
    pub props:      Option<String>,
    pub create_at:  i64,
    pub update_at:  i64,
    #[serde(default)]
    pub delete_at:  i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id:         String::new(),
            channel_id: channel_id.into(),
            user_id:    user_id.into(),
            root_id:    String::new(),
            message:    message.into(),
            props:      None,
            create_at:  0,
            update_at:  0,
            delete_at:  0,
        }
    }

    pub fn reply_to(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }

    pub fn is_reply(&self) -> bool {
        !self.root_id.is_empty()
    }
}

impl StoreEntity for Model {
    const ENTITY: &'static str = "message";
    const PLURAL: &'static str = "messages";

    store_entity_basics!(soft_delete);

    fn is_valid(&self) -> StoreResult<()> {
        check_id(Self::ENTITY, &self.channel_id)?;
        check_id(Self::ENTITY, &self.user_id)?;
        if self.is_reply() {
            check_id(Self::ENTITY, &self.root_id)?;
            if self.root_id == self.id {
                return Err(StoreError::validation(Self::ENTITY, "a message cannot reply to itself"));
            }
        }
        check_len(Self::ENTITY, "message", &self.message, 0, MAX_MESSAGE_LEN)?;
        if let Some(ref props) = self.props {
            match serde_json::from_str::<serde_json::Value>(props) {
                Ok(serde_json::Value::Object(_)) => (),
                _ => return Err(StoreError::validation(Self::ENTITY, "props must be a JSON object")),
            }
        }
        Ok(())
    }

    fn make_non_nil(&mut self) {
        if self.props.is_none() {
            self.props = Some("{}".to_string());
        }
    }
}

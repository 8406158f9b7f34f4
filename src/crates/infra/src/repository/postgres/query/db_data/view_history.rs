use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use domain::value::{ItemId, UserId};
use model::view_history::ViewHistoryEntry;

/// Latest view of an item per user; re-views overwrite `viewed_at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "view_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub item_id: i64,
    pub viewed_at: chrono::NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ViewHistoryEntry {
    fn from(model: Model) -> Self {
        ViewHistoryEntry {
            user_id: UserId::from(model.user_id),
            item_id: ItemId::from(model.item_id),
            viewed_at: model.viewed_at,
        }
    }
}

impl From<&ViewHistoryEntry> for ActiveModel {
    fn from(entry: &ViewHistoryEntry) -> Self {
        Self {
            user_id: Set(entry.user_id.as_i64()),
            item_id: Set(entry.item_id.as_i64()),
            viewed_at: Set(entry.viewed_at),
        }
    }
}

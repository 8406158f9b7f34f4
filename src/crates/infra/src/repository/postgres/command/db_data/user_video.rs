use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use domain::interaction::{InteractionError, InteractionRecord};
use domain::value::{ItemId, UserId};

/// One row per (user, item) pair.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "user_video")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub item_id: i64,

    pub play_count: i32,
    pub liked: bool,
    pub disliked: bool,
    pub favorited: bool,
    pub last_played_at: Option<chrono::NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for InteractionRecord {
    type Error = InteractionError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        InteractionRecord::restore(
            UserId::from(model.user_id),
            ItemId::from(model.item_id),
            model.play_count,
            model.liked,
            model.disliked,
            model.favorited,
            model.last_played_at,
        )
    }
}

impl From<&InteractionRecord> for ActiveModel {
    fn from(record: &InteractionRecord) -> Self {
        Self {
            user_id: Set(record.user_id.as_i64()),
            item_id: Set(record.item_id.as_i64()),
            play_count: Set(record.play_count),
            liked: Set(record.liked()),
            disliked: Set(record.disliked()),
            favorited: Set(record.favorited),
            last_played_at: Set(record.last_played_at),
        }
    }
}

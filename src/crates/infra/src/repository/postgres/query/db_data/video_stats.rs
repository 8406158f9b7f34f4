use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use model::item_stats::ItemStats;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "video_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub item_id: i64,

    #[sea_orm(column_type = "BigInteger")]
    pub play_count: i64,

    #[sea_orm(column_type = "BigInteger")]
    pub good_count: i64,

    #[sea_orm(column_type = "BigInteger")]
    pub bad_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ItemStats {
    fn from(model: Model) -> Self {
        ItemStats {
            play: model.play_count,
            good: model.good_count,
            bad: model.bad_count,
        }
    }
}

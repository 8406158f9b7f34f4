use super::db_data::video_stats as stat_db;
use async_trait::async_trait;
use domain::interaction::{Counter, SwapDirection};
use domain::value::ItemId;
use model::item_stats::{AggregateStatsUpdater, ItemStats};
use model::ModelError;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

/// Counters kept as deltas: every change is a single upsert adding to the stored value.
pub struct ItemStatsRepositoryImpl {
    db: DatabaseConnection,
}

impl ItemStatsRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn column(counter: Counter) -> stat_db::Column {
        match counter {
            Counter::Play => stat_db::Column::PlayCount,
            Counter::Good => stat_db::Column::GoodCount,
            Counter::Bad => stat_db::Column::BadCount,
        }
    }

    async fn add(&self, item_id: ItemId, deltas: &[(Counter, i64)]) -> Result<(), ModelError> {
        let mut active_model = stat_db::ActiveModel {
            item_id: Set(item_id.as_i64()),
            play_count: Set(0),
            good_count: Set(0),
            bad_count: Set(0),
        };
        let mut on_conflict = OnConflict::column(stat_db::Column::ItemId);
        for (counter, delta) in deltas {
            let column = Self::column(*counter);
            active_model.set(column, (*delta).into());
            on_conflict.value(column, Expr::col((stat_db::Entity, column)).add(*delta));
        }

        stat_db::Entity::insert(active_model)
            .on_conflict(on_conflict.to_owned())
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| ModelError::DbErr(e.to_string()))?;
        Ok(())
    }

    pub async fn find_by_item_id(&self, item_id: ItemId) -> Result<Option<ItemStats>, ModelError> {
        let row = stat_db::Entity::find_by_id(item_id.as_i64())
            .one(&self.db)
            .await
            .map_err(|e| ModelError::DbErr(e.to_string()))?;
        Ok(row.map(ItemStats::from))
    }
}

#[async_trait]
impl AggregateStatsUpdater for ItemStatsRepositoryImpl {
    async fn adjust_counter(
        &self,
        item_id: ItemId,
        counter: Counter,
        delta: i64,
    ) -> Result<(), ModelError> {
        self.add(item_id, &[(counter, delta)]).await
    }

    async fn swap_good_bad(
        &self,
        item_id: ItemId,
        direction: SwapDirection,
    ) -> Result<(), ModelError> {
        let deltas = match direction {
            SwapDirection::DislikeToLike => [(Counter::Good, 1), (Counter::Bad, -1)],
            SwapDirection::LikeToDislike => [(Counter::Good, -1), (Counter::Bad, 1)],
        };
        self.add(item_id, &deltas).await
    }
}

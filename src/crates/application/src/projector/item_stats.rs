use crate::error::AppError;
use domain::interaction::{Counter, SwapDirection};
use domain::value::ItemId;
use model::item_stats::AggregateStatsUpdater;
use std::sync::Arc;

/// ItemStatsProjector forwards counter effects to the aggregate stats store
pub struct ItemStatsProjector {
    stats_updater: Arc<dyn AggregateStatsUpdater>,
}

impl ItemStatsProjector {
    pub fn new(stats_updater: Arc<dyn AggregateStatsUpdater>) -> Self {
        Self { stats_updater }
    }

    pub async fn on_counter_adjusted(
        &self,
        item_id: ItemId,
        counter: Counter,
        delta: i64,
    ) -> Result<(), AppError> {
        self.stats_updater
            .adjust_counter(item_id, counter, delta)
            .await?;
        Ok(())
    }

    /// One vote moved between good and bad
    pub async fn on_counters_swapped(
        &self,
        item_id: ItemId,
        direction: SwapDirection,
    ) -> Result<(), AppError> {
        self.stats_updater.swap_good_bad(item_id, direction).await?;
        Ok(())
    }
}

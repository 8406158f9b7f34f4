use async_trait::async_trait;
use dashmap::DashMap;
use domain::interaction::{Counter, SwapDirection};
use domain::value::ItemId;
use model::item_stats::{AggregateStatsUpdater, ItemStats};
use model::ModelError;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryItemStatsRepository {
    store: Arc<DashMap<ItemId, ItemStats>>,
}

impl InMemoryItemStatsRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Current counters of an item, zero when nothing was recorded yet
    pub fn stats(&self, item_id: ItemId) -> ItemStats {
        self.store
            .get(&item_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AggregateStatsUpdater for InMemoryItemStatsRepository {
    async fn adjust_counter(
        &self,
        item_id: ItemId,
        counter: Counter,
        delta: i64,
    ) -> Result<(), ModelError> {
        self.store.entry(item_id).or_default().adjust(counter, delta);
        Ok(())
    }

    async fn swap_good_bad(
        &self,
        item_id: ItemId,
        direction: SwapDirection,
    ) -> Result<(), ModelError> {
        self.store.entry(item_id).or_default().swap(direction);
        Ok(())
    }
}

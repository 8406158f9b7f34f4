use crate::ModelError;
use async_trait::async_trait;
use domain::interaction::{Counter, SwapDirection};
use domain::value::ItemId;

/// Aggregate counters of one item as kept by the stats store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStats {
    pub play: i64,
    pub good: i64,
    pub bad: i64,
}

impl ItemStats {
    pub fn counter(&self, counter: Counter) -> i64 {
        match counter {
            Counter::Play => self.play,
            Counter::Good => self.good,
            Counter::Bad => self.bad,
        }
    }

    pub fn adjust(&mut self, counter: Counter, delta: i64) {
        match counter {
            Counter::Play => self.play += delta,
            Counter::Good => self.good += delta,
            Counter::Bad => self.bad += delta,
        }
    }

    pub fn swap(&mut self, direction: SwapDirection) {
        match direction {
            SwapDirection::DislikeToLike => {
                self.good += 1;
                self.bad -= 1;
            }
            SwapDirection::LikeToDislike => {
                self.good -= 1;
                self.bad += 1;
            }
        }
    }
}

/// Delta-only contract of the aggregate statistics store.
/// The interaction core never reads counters back through it.
#[async_trait]
pub trait AggregateStatsUpdater: Send + Sync {
    async fn adjust_counter(
        &self,
        item_id: ItemId,
        counter: Counter,
        delta: i64,
    ) -> Result<(), ModelError>;

    async fn swap_good_bad(
        &self,
        item_id: ItemId,
        direction: SwapDirection,
    ) -> Result<(), ModelError>;
}

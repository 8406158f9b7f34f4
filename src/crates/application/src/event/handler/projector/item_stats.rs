use crate::error::AppError;
use crate::event::event_bus::{EventEnvelope, Handler};
use crate::projector::item_stats::ItemStatsProjector;
use async_trait::async_trait;
use domain::interaction::InteractionEffect;

pub struct ItemStatsHandler {
    projector: ItemStatsProjector,
}

impl ItemStatsHandler {
    pub fn new(projector: ItemStatsProjector) -> Self {
        Self { projector }
    }
}

#[async_trait]
impl Handler<InteractionEffect> for ItemStatsHandler {
    async fn handle(&self, envelope: &EventEnvelope<InteractionEffect>) -> Result<(), AppError> {
        match &envelope.payload {
            InteractionEffect::AdjustCounter {
                item_id,
                counter,
                delta,
            } => {
                self.projector
                    .on_counter_adjusted(*item_id, *counter, *delta)
                    .await
            }
            InteractionEffect::SwapGoodBad { item_id, direction } => {
                self.projector.on_counters_swapped(*item_id, *direction).await
            }
            InteractionEffect::AppendHistory { .. } => Ok(()),
        }
    }

    fn accepts(&self, envelope: &EventEnvelope<InteractionEffect>) -> bool {
        matches!(
            envelope.payload,
            InteractionEffect::AdjustCounter { .. } | InteractionEffect::SwapGoodBad { .. }
        )
    }

    fn name(&self) -> &'static str {
        "item_stats"
    }
}

use super::item_stats::ItemStatsHandler;
use super::view_history::ViewHistoryHandler;
use crate::event::event_bus::EventBus;
use crate::projector::item_stats::ItemStatsProjector;
use domain::interaction::InteractionEffect;
use model::item_stats::AggregateStatsUpdater;
use model::view_history::RecentHistoryLog;
use std::sync::Arc;

/// Subscribe the effect consumers. Each handler accepts only the effect kinds
/// it owns, so every effect is delivered exactly once.
pub async fn register_handlers<B: EventBus>(
    bus: &mut B,
    stats_updater: Arc<dyn AggregateStatsUpdater>,
    history_log: Arc<dyn RecentHistoryLog>,
) {
    let item_stats_handler = ItemStatsHandler::new(ItemStatsProjector::new(stats_updater));
    let view_history_handler = ViewHistoryHandler::new(history_log);

    bus.subscribe::<InteractionEffect>(Arc::new(item_stats_handler))
        .await;
    bus.subscribe::<InteractionEffect>(Arc::new(view_history_handler))
        .await;
}

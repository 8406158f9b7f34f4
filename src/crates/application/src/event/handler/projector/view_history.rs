use crate::error::AppError;
use crate::event::event_bus::{EventEnvelope, Handler};
use crate::projector::view_history::ViewHistoryProjector;
use async_trait::async_trait;
use domain::interaction::InteractionEffect;
use model::view_history::RecentHistoryLog;
use std::sync::Arc;

pub struct ViewHistoryHandler {
    projector: ViewHistoryProjector,
}

impl ViewHistoryHandler {
    pub fn new(history_log: Arc<dyn RecentHistoryLog>) -> Self {
        Self {
            projector: ViewHistoryProjector::new(history_log),
        }
    }
}

#[async_trait]
impl Handler<InteractionEffect> for ViewHistoryHandler {
    async fn handle(&self, envelope: &EventEnvelope<InteractionEffect>) -> Result<(), AppError> {
        match &envelope.payload {
            InteractionEffect::AppendHistory {
                user_id,
                item_id,
                viewed_at,
            } => self.projector.on_view(*user_id, *item_id, *viewed_at).await,
            _ => Ok(()),
        }
    }

    fn accepts(&self, envelope: &EventEnvelope<InteractionEffect>) -> bool {
        matches!(envelope.payload, InteractionEffect::AppendHistory { .. })
    }

    fn name(&self) -> &'static str {
        "view_history"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_bus::{CorrelationId, EventId};
    use chrono::NaiveDate;
    use domain::interaction::Counter;
    use domain::value::{ItemId, UserId};
    use model::view_history::ViewHistoryEntry;
    use model::ModelError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLog {
        entries: Mutex<Vec<ViewHistoryEntry>>,
    }

    #[async_trait]
    impl RecentHistoryLog for RecordingLog {
        async fn record_view(&self, entry: &ViewHistoryEntry) -> Result<(), ModelError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn recent(&self, _user_id: UserId, _limit: usize) -> Result<Vec<ItemId>, ModelError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_only_history_effects_are_recorded() {
        let log = Arc::new(RecordingLog::default());
        let handler = ViewHistoryHandler::new(log.clone());
        let viewed_at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();

        let mut accepted = Vec::new();
        for effect in [
            InteractionEffect::AppendHistory {
                user_id: UserId::from(7),
                item_id: ItemId::from(42),
                viewed_at,
            },
            InteractionEffect::AdjustCounter {
                item_id: ItemId::from(42),
                counter: Counter::Play,
                delta: 1,
            },
        ] {
            let envelope =
                EventEnvelope::from_domain_event(effect, CorrelationId::new(), EventId::new());
            accepted.push(handler.accepts(&envelope));
            handler.handle(&envelope).await.unwrap();
        }

        assert_eq!(accepted, vec![true, false]);
        assert_eq!(
            *log.entries.lock().unwrap(),
            vec![ViewHistoryEntry {
                user_id: UserId::from(7),
                item_id: ItemId::from(42),
                viewed_at,
            }]
        );
    }
}

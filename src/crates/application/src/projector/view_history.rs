use crate::error::AppError;
use chrono::NaiveDateTime;
use domain::value::{ItemId, UserId};
use model::view_history::{RecentHistoryLog, ViewHistoryEntry};
use std::sync::Arc;

pub struct ViewHistoryProjector {
    history_log: Arc<dyn RecentHistoryLog>,
}

impl ViewHistoryProjector {
    pub fn new(history_log: Arc<dyn RecentHistoryLog>) -> Self {
        Self { history_log }
    }

    /// Move the item to the front of the user's history
    pub async fn on_view(
        &self,
        user_id: UserId,
        item_id: ItemId,
        viewed_at: NaiveDateTime,
    ) -> Result<(), AppError> {
        let entry = ViewHistoryEntry {
            user_id,
            item_id,
            viewed_at,
        };
        self.history_log.record_view(&entry).await?;
        Ok(())
    }
}

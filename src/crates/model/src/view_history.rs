use crate::ModelError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::value::{ItemId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewHistoryEntry {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub viewed_at: NaiveDateTime,
}

/// Recency-ordered set of viewed items per user. Re-viewing an item moves it to the front.
#[async_trait]
pub trait RecentHistoryLog: Send + Sync {
    async fn record_view(&self, entry: &ViewHistoryEntry) -> Result<(), ModelError>;

    /// Most recent first.
    async fn recent(&self, user_id: UserId, limit: usize) -> Result<Vec<ItemId>, ModelError>;
}

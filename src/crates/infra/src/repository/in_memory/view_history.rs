use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use domain::value::{ItemId, UserId};
use model::view_history::{RecentHistoryLog, ViewHistoryEntry};
use model::ModelError;
use std::sync::Arc;

/// Per-user recency list, newest first, one entry per item.
#[derive(Clone, Default)]
pub struct InMemoryViewHistoryRepository {
    store: Arc<DashMap<UserId, Vec<(ItemId, NaiveDateTime)>>>,
    /// Entries kept per user, unbounded when `None`
    limit_per_user: Option<usize>,
}

impl InMemoryViewHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit_per_user: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            limit_per_user: Some(limit_per_user),
        }
    }
}

#[async_trait]
impl RecentHistoryLog for InMemoryViewHistoryRepository {
    async fn record_view(&self, entry: &ViewHistoryEntry) -> Result<(), ModelError> {
        let mut views = self.store.entry(entry.user_id).or_default();
        if let Some(pos) = views.iter().position(|(item, _)| *item == entry.item_id) {
            // redelivered or older than what we have
            if views[pos].1 >= entry.viewed_at {
                return Ok(());
            }
            views.remove(pos);
        }
        let at = views
            .iter()
            .position(|(_, viewed_at)| *viewed_at < entry.viewed_at)
            .unwrap_or(views.len());
        views.insert(at, (entry.item_id, entry.viewed_at));
        if let Some(limit) = self.limit_per_user {
            views.truncate(limit);
        }
        Ok(())
    }

    async fn recent(&self, user_id: UserId, limit: usize) -> Result<Vec<ItemId>, ModelError> {
        Ok(self
            .store
            .get(&user_id)
            .map(|views| views.iter().take(limit).map(|(item, _)| *item).collect())
            .unwrap_or_default())
    }
}

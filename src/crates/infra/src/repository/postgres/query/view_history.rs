use super::db_data::view_history as db;
use async_trait::async_trait;
use domain::value::{ItemId, UserId};
use model::view_history::{RecentHistoryLog, ViewHistoryEntry};
use model::ModelError;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

pub struct ViewHistoryRepositoryImpl {
    db: DatabaseConnection,
}

impl ViewHistoryRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecentHistoryLog for ViewHistoryRepositoryImpl {
    async fn record_view(&self, entry: &ViewHistoryEntry) -> Result<(), ModelError> {
        let model: db::ActiveModel = entry.into();
        // redelivered or late views never move an item backwards
        let on_conflict = OnConflict::columns([db::Column::UserId, db::Column::ItemId])
            .value(
                db::Column::ViewedAt,
                Expr::cust("GREATEST(view_history.viewed_at, EXCLUDED.viewed_at)"),
            )
            .to_owned();
        db::Entity::insert(model)
            .on_conflict(on_conflict)
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| ModelError::ProjectionError(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, user_id: UserId, limit: usize) -> Result<Vec<ItemId>, ModelError> {
        let rows = db::Entity::find()
            .filter(db::Column::UserId.eq(user_id.as_i64()))
            .order_by_desc(db::Column::ViewedAt)
            .limit(limit as u64)
            .all(&self.db)
            .await
            .map_err(|e| ModelError::ProjectionError(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(ViewHistoryEntry::from)
            .map(|entry| entry.item_id)
            .collect())
    }
}

use super::db_data::user_video;
use async_trait::async_trait;
use domain::interaction::{
    InteractionChanges, InteractionError, InteractionRecord, InteractionRecordStore,
};
use domain::value::InteractionKey;
use sea_orm::sea_query::Expr;
use sea_orm::*;

#[derive(Clone)]
pub struct InteractionRecordStoreImpl {
    db: sea_orm::DbConn,
}

impl InteractionRecordStoreImpl {
    pub fn new(db: sea_orm::DbConn) -> Self {
        Self { db }
    }
}

fn store_err(e: DbErr) -> InteractionError {
    InteractionError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl InteractionRecordStore for InteractionRecordStoreImpl {
    async fn find(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, InteractionError> {
        let row: Option<user_video::Model> =
            user_video::Entity::find_by_id((key.user_id.as_i64(), key.item_id.as_i64()))
                .one(&self.db)
                .await
                .map_err(store_err)?;
        row.map(InteractionRecord::try_from).transpose()
    }

    async fn insert(&self, record: &InteractionRecord) -> Result<(), InteractionError> {
        let active_model: user_video::ActiveModel = record.into();
        user_video::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    InteractionError::DuplicateKey(record.key())
                }
                _ => store_err(e),
            })?;
        Ok(())
    }

    async fn update_fields(
        &self,
        key: &InteractionKey,
        changes: &InteractionChanges,
    ) -> Result<(), InteractionError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut update = user_video::Entity::update_many()
            .filter(user_video::Column::UserId.eq(key.user_id.as_i64()))
            .filter(user_video::Column::ItemId.eq(key.item_id.as_i64()));
        if let Some(play_count) = changes.play_count {
            update = update.col_expr(user_video::Column::PlayCount, Expr::value(play_count));
        }
        if let Some(at) = changes.last_played_at {
            update = update.col_expr(user_video::Column::LastPlayedAt, Expr::value(at));
        }
        if let Some(liked) = changes.liked {
            update = update.col_expr(user_video::Column::Liked, Expr::value(liked));
        }
        if let Some(disliked) = changes.disliked {
            update = update.col_expr(user_video::Column::Disliked, Expr::value(disliked));
        }

        let result = update.exec(&self.db).await.map_err(store_err)?;
        if result.rows_affected == 0 {
            return Err(InteractionError::NotFound(*key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain::value::{ItemId, UserId};

    fn key() -> InteractionKey {
        InteractionKey::new(UserId::from(7), ItemId::from(42))
    }

    #[tokio::test]
    async fn test_find_maps_row_to_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_video::Model {
                user_id: 7,
                item_id: 42,
                play_count: 2,
                liked: true,
                disliked: false,
                favorited: false,
                last_played_at: None,
            }]])
            .into_connection();
        let store = InteractionRecordStoreImpl::new(db);

        let record = store.find(&key()).await.unwrap().unwrap();

        assert_eq!(record.play_count, 2);
        assert!(record.liked());
    }

    #[tokio::test]
    async fn test_update_without_rows_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let store = InteractionRecordStoreImpl::new(db);
        let changes = InteractionChanges {
            play_count: Some(2),
            last_played_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0),
            ..Default::default()
        };

        let result = store.update_fields(&key(), &changes).await;

        assert!(matches!(result, Err(InteractionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_changes_skip_the_database() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = InteractionRecordStoreImpl::new(db);

        store
            .update_fields(&key(), &InteractionChanges::default())
            .await
            .unwrap();
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per (user, item); the composite key rejects a second first play
        manager
            .create_table(
                Table::create()
                    .table(UserVideo::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserVideo::UserId).big_integer().not_null())
                    .col(ColumnDef::new(UserVideo::ItemId).big_integer().not_null())
                    .col(
                        ColumnDef::new(UserVideo::PlayCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserVideo::Liked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserVideo::Disliked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserVideo::Favorited)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(UserVideo::LastPlayedAt).timestamp().null())
                    .primary_key(
                        Index::create()
                            .col(UserVideo::UserId)
                            .col(UserVideo::ItemId),
                    )
                    .check(Expr::cust("NOT (liked AND disliked)"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VideoStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VideoStats::ItemId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VideoStats::PlayCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VideoStats::GoodCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VideoStats::BadCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ViewHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ViewHistory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(ViewHistory::ItemId).big_integer().not_null())
                    .col(ColumnDef::new(ViewHistory::ViewedAt).timestamp().not_null())
                    .primary_key(
                        Index::create()
                            .col(ViewHistory::UserId)
                            .col(ViewHistory::ItemId),
                    )
                    .to_owned(),
            )
            .await?;

        // Recent views of a user, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_view_history_user_viewed_at")
                    .table(ViewHistory::Table)
                    .col(ViewHistory::UserId)
                    .col(ViewHistory::ViewedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ViewHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VideoStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserVideo::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserVideo {
    Table,
    UserId,
    ItemId,
    PlayCount,
    Liked,
    Disliked,
    Favorited,
    LastPlayedAt,
}

#[derive(DeriveIden)]
enum VideoStats {
    Table,
    ItemId,
    PlayCount,
    GoodCount,
    BadCount,
}

#[derive(DeriveIden)]
enum ViewHistory {
    Table,
    UserId,
    ItemId,
    ViewedAt,
}

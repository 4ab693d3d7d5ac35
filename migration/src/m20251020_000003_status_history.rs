use sea_orm_migration::prelude::*;

use crate::{DEAL_STATUSES, NOW_SQL, m20251020_000002_deals::Deals};

#[derive(DeriveIden)]
enum StatusHistory {
    Table,
    Id,
    DealId,
    OldStatus,
    NewStatus,
    ChangedAt,
    Notes,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StatusHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StatusHistory::DealId).integer().not_null())
                    .col(
                        ColumnDef::new(StatusHistory::OldStatus)
                            .string_len(32)
                            .check(Expr::col(StatusHistory::OldStatus).is_in(DEAL_STATUSES)),
                    )
                    .col(
                        ColumnDef::new(StatusHistory::NewStatus)
                            .string_len(32)
                            .not_null()
                            .check(Expr::col(StatusHistory::NewStatus).is_in(DEAL_STATUSES)),
                    )
                    .col(
                        ColumnDef::new(StatusHistory::ChangedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::cust(NOW_SQL)),
                    )
                    .col(ColumnDef::new(StatusHistory::Notes).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_deal")
                            .from(StatusHistory::Table, StatusHistory::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_status_history_deal")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::DealId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await
    }
}

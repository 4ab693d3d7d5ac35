use sea_orm_migration::prelude::*;

use crate::NOW_SQL;

#[derive(DeriveIden)]
pub(crate) enum Sources {
    Table,
    Id,
    Name,
    ReliabilityRating,
    Notes,
    TotalDeals,
    SuccessfulDeals,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sources::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sources::Name).text().not_null().unique_key())
                    .col(
                        ColumnDef::new(Sources::ReliabilityRating)
                            .integer()
                            .not_null()
                            .default(3)
                            .check(Expr::col(Sources::ReliabilityRating).between(1, 10)),
                    )
                    .col(ColumnDef::new(Sources::Notes).text())
                    .col(
                        ColumnDef::new(Sources::TotalDeals)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Sources::SuccessfulDeals)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Sources::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::cust(NOW_SQL)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await
    }
}

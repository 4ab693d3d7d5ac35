use sea_orm_migration::prelude::*;

use crate::{DEAL_STATUSES, NOW_SQL, PRICE_TYPES, m20251020_000001_sources::Sources};

#[derive(DeriveIden)]
pub(crate) enum Deals {
    Table,
    Id,
    CommodityType,
    SourceName,
    SourceReliability,
    DealText,
    Price,
    PriceCurrency,
    PriceType,
    GrossDiscount,
    Commission,
    NetDiscount,
    Quantity,
    QuantityUnit,
    OriginCountry,
    PaymentMethod,
    ShippingTerms,
    AdditionalNotes,
    DateReceived,
    Status,
    AiScore,
    AiReasoning,
    AiAnalysis,
    ManualScore,
    FilePath,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Deals::CommodityType).text().not_null())
                    .col(ColumnDef::new(Deals::SourceName).text().not_null())
                    .col(
                        ColumnDef::new(Deals::SourceReliability)
                            .integer()
                            .check(Expr::col(Deals::SourceReliability).between(1, 10)),
                    )
                    .col(ColumnDef::new(Deals::DealText).text())
                    .col(ColumnDef::new(Deals::Price).double())
                    .col(ColumnDef::new(Deals::PriceCurrency).text().default("USD"))
                    .col(
                        ColumnDef::new(Deals::PriceType)
                            .string_len(16)
                            .not_null()
                            .default(PRICE_TYPES[0])
                            .check(Expr::col(Deals::PriceType).is_in(PRICE_TYPES)),
                    )
                    .col(ColumnDef::new(Deals::GrossDiscount).double())
                    .col(ColumnDef::new(Deals::Commission).double())
                    .col(ColumnDef::new(Deals::NetDiscount).double())
                    .col(ColumnDef::new(Deals::Quantity).double())
                    .col(ColumnDef::new(Deals::QuantityUnit).text())
                    .col(ColumnDef::new(Deals::OriginCountry).text())
                    .col(ColumnDef::new(Deals::PaymentMethod).text())
                    .col(ColumnDef::new(Deals::ShippingTerms).text())
                    .col(ColumnDef::new(Deals::AdditionalNotes).text())
                    .col(ColumnDef::new(Deals::DateReceived).date().not_null())
                    .col(
                        ColumnDef::new(Deals::Status)
                            .string_len(32)
                            .not_null()
                            .default(DEAL_STATUSES[0])
                            .check(Expr::col(Deals::Status).is_in(DEAL_STATUSES)),
                    )
                    .col(
                        ColumnDef::new(Deals::AiScore)
                            .integer()
                            .check(Expr::col(Deals::AiScore).between(0, 100)),
                    )
                    .col(ColumnDef::new(Deals::AiReasoning).text())
                    .col(ColumnDef::new(Deals::AiAnalysis).text())
                    .col(
                        ColumnDef::new(Deals::ManualScore)
                            .integer()
                            .check(Expr::col(Deals::ManualScore).between(0, 100)),
                    )
                    .col(ColumnDef::new(Deals::FilePath).text())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::cust(NOW_SQL)),
                    )
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::cust(NOW_SQL)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_source_name")
                            .from(Deals::Table, Deals::SourceName)
                            .to(Sources::Table, Sources::Name)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        let indexes = [
            ("idx_deals_status", Deals::Status),
            ("idx_deals_commodity_type", Deals::CommodityType),
            ("idx_deals_source_name", Deals::SourceName),
            ("idx_deals_date_received", Deals::DateReceived),
        ];
        for (name, column) in indexes {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Deals::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}

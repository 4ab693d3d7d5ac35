use sea_orm_migration::prelude::*;

use crate::m20251020_000001_sources::Sources;

/// Development contacts present in every fresh database.
pub const SEED_SOURCES: [(&str, i32, &str); 3] = [
    ("John Mensah", 7, "Ghana gold contact; documents usually complete."),
    ("Amara Okafor", 5, "Copper cathode leads, mixed verification history."),
    ("Kwame Asante", 3, "New contact, unverified."),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, rating, notes) in SEED_SOURCES {
            let stmt = Query::insert()
                .into_table(Sources::Table)
                .columns([Sources::Name, Sources::ReliabilityRating, Sources::Notes])
                .values_panic([name.into(), rating.into(), notes.into()])
                .on_conflict(OnConflict::column(Sources::Name).do_nothing().to_owned())
                .to_owned();
            manager.exec_stmt(stmt).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let names: Vec<&str> = SEED_SOURCES.iter().map(|(name, _, _)| *name).collect();
        let stmt = Query::delete()
            .from_table(Sources::Table)
            .and_where(Expr::col(Sources::Name).is_in(names))
            .and_where(Expr::col(Sources::TotalDeals).eq(0))
            .to_owned();
        manager.exec_stmt(stmt).await
    }
}

pub use sea_orm_migration::prelude::*;

mod m20251020_000001_sources;
mod m20251020_000002_deals;
mod m20251020_000003_status_history;
mod m20251020_000004_deal_triggers;
mod m20251020_000005_seed_sources;

pub use m20251020_000005_seed_sources::SEED_SOURCES;

/// Values accepted by the `status` CHECK constraints.
pub const DEAL_STATUSES: [&str; 7] = [
    "unassigned",
    "under_review",
    "in_progress",
    "done",
    "closed_lost",
    "on_hold",
    "rejected",
];

pub const PRICE_TYPES: [&str; 2] = ["fixed_price", "lme_discount"];

/// Millisecond-precision UTC timestamp, matching what sqlx writes for `NaiveDateTime`.
pub(crate) const NOW_SQL: &str = "(strftime('%Y-%m-%d %H:%M:%f', 'now'))";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251020_000001_sources::Migration),
            Box::new(m20251020_000002_deals::Migration),
            Box::new(m20251020_000003_status_history::Migration),
            Box::new(m20251020_000004_deal_triggers::Migration),
            Box::new(m20251020_000005_seed_sources::Migration),
        ]
    }
}

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

// SQLite leaves recursive_triggers off, so the touch trigger's own UPDATE
// does not fire it again.
const TOUCH_UPDATED_AT: &str = r#"
CREATE TRIGGER IF NOT EXISTS deals_touch_updated_at
AFTER UPDATE ON deals
FOR EACH ROW
BEGIN
    UPDATE deals
    SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
    WHERE id = NEW.id;
END;
"#;

const COUNT_SOURCE_TOTAL: &str = r#"
CREATE TRIGGER IF NOT EXISTS deals_count_source_total
AFTER INSERT ON deals
FOR EACH ROW
BEGIN
    UPDATE sources
    SET total_deals = total_deals + 1
    WHERE name = NEW.source_name;
END;
"#;

const COUNT_SOURCE_SUCCESS: &str = r#"
CREATE TRIGGER IF NOT EXISTS deals_count_source_success
AFTER UPDATE OF status ON deals
FOR EACH ROW
WHEN NEW.status = 'done' AND OLD.status IS NOT 'done'
BEGIN
    UPDATE sources
    SET successful_deals = successful_deals + 1
    WHERE name = NEW.source_name;
END;
"#;

const DOWN_SQL: [&str; 3] = [
    "DROP TRIGGER IF EXISTS deals_count_source_success",
    "DROP TRIGGER IF EXISTS deals_count_source_total",
    "DROP TRIGGER IF EXISTS deals_touch_updated_at",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in [TOUCH_UPDATED_AT, COUNT_SOURCE_TOTAL, COUNT_SOURCE_SUCCESS] {
            conn.execute_unprepared(sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in DOWN_SQL {
            conn.execute_unprepared(sql).await?;
        }
        Ok(())
    }
}

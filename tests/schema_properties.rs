use std::time::Duration;

use anyhow::Result;
use dealdesk_tests::{exec, insert_deal, memory_db, scalar, source_counters};
use entity::deal;
use platform_db::{ConstraintKind, classify_constraint};
use sea_orm::EntityTrait;

#[tokio::test]
async fn inserting_a_deal_counts_against_its_source() -> Result<()> {
    let db = memory_db().await?;
    assert_eq!(source_counters(&db, "John Mensah").await?, (0, 0));

    insert_deal(&db, "Gold", "John Mensah").await?;
    assert_eq!(source_counters(&db, "John Mensah").await?, (1, 0));
    insert_deal(&db, "Copper", "John Mensah").await?;
    assert_eq!(source_counters(&db, "John Mensah").await?, (2, 0));
    assert_eq!(source_counters(&db, "Amara Okafor").await?, (0, 0));
    Ok(())
}

#[tokio::test]
async fn moving_to_done_counts_one_success() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Gold", "Amara Okafor").await?;

    exec(&db, "UPDATE deals SET status = 'in_progress' WHERE id = ?", [id.into()]).await?;
    assert_eq!(source_counters(&db, "Amara Okafor").await?, (1, 0));

    exec(&db, "UPDATE deals SET status = 'done' WHERE id = ?", [id.into()]).await?;
    assert_eq!(source_counters(&db, "Amara Okafor").await?, (1, 1));

    // Re-saving a finished deal, or touching other columns, is not a new success.
    exec(&db, "UPDATE deals SET status = 'done' WHERE id = ?", [id.into()]).await?;
    exec(&db, "UPDATE deals SET deal_text = 'signed copy' WHERE id = ?", [id.into()]).await?;
    assert_eq!(source_counters(&db, "Amara Okafor").await?, (1, 1));
    Ok(())
}

#[tokio::test]
async fn deals_inserted_as_done_are_not_successes() -> Result<()> {
    let db = memory_db().await?;
    exec(
        &db,
        "INSERT INTO deals (commodity_type, source_name, date_received, status) \
         VALUES ('Gold', 'Kwame Asante', '2025-10-20', 'done')",
        [],
    )
    .await?;
    assert_eq!(source_counters(&db, "Kwame Asante").await?, (1, 0));
    Ok(())
}

#[tokio::test]
async fn updates_refresh_updated_at() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Wheat", "John Mensah").await?;
    const UPDATED_AT: &str = "SELECT updated_at FROM deals WHERE id = ?";
    let before: String = scalar(&db, UPDATED_AT, [id.into()]).await?;

    tokio::time::sleep(Duration::from_millis(5)).await;
    exec(&db, "UPDATE deals SET quantity = 25 WHERE id = ?", [id.into()]).await?;
    let after: String = scalar(&db, UPDATED_AT, [id.into()]).await?;
    assert!(after > before, "{after} should be later than {before}");

    let model = deal::Entity::find_by_id(id).one(&db).await?.unwrap();
    assert!(model.updated_at >= model.created_at);
    Ok(())
}

#[tokio::test]
async fn out_of_range_values_are_rejected() -> Result<()> {
    let db = memory_db().await?;
    let cases = [
        "INSERT INTO deals (commodity_type, source_name, date_received, ai_score) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', 101)",
        "INSERT INTO deals (commodity_type, source_name, date_received, manual_score) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', -1)",
        "INSERT INTO deals (commodity_type, source_name, date_received, source_reliability) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', 0)",
        "INSERT INTO deals (commodity_type, source_name, date_received, status) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', 'archived')",
        "INSERT INTO deals (commodity_type, source_name, date_received, price_type) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', 'barter')",
        "INSERT INTO sources (name, reliability_rating) VALUES ('Overrated', 11)",
    ];
    for sql in cases {
        let err = exec(&db, sql, []).await.unwrap_err();
        assert_eq!(classify_constraint(&err), Some(ConstraintKind::Check), "{sql}");
    }
    // Rejected inserts never reach the counter trigger.
    assert_eq!(source_counters(&db, "John Mensah").await?, (0, 0));

    // Boundaries are inclusive.
    exec(
        &db,
        "INSERT INTO deals (commodity_type, source_name, date_received, ai_score, manual_score, source_reliability) \
         VALUES ('Gold', 'John Mensah', '2025-10-20', 100, 0, 10)",
        [],
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn required_columns_and_unique_names() -> Result<()> {
    let db = memory_db().await?;
    for sql in [
        "INSERT INTO deals (source_name, date_received) VALUES ('John Mensah', '2025-10-20')",
        "INSERT INTO deals (commodity_type, date_received) VALUES ('Gold', '2025-10-20')",
        "INSERT INTO deals (commodity_type, source_name) VALUES ('Gold', 'John Mensah')",
    ] {
        let err = exec(&db, sql, []).await.unwrap_err();
        assert_eq!(classify_constraint(&err), Some(ConstraintKind::NotNull), "{sql}");
    }

    let err = exec(&db, "INSERT INTO sources (name) VALUES ('John Mensah')", [])
        .await
        .unwrap_err();
    assert_eq!(classify_constraint(&err), Some(ConstraintKind::Unique));
    Ok(())
}

#[tokio::test]
async fn column_defaults_apply() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Soybean", "Kwame Asante").await?;
    let row: (String, String, String) = (
        scalar(&db, "SELECT status FROM deals WHERE id = ?", [id.into()]).await?,
        scalar(&db, "SELECT price_type FROM deals WHERE id = ?", [id.into()]).await?,
        scalar(&db, "SELECT price_currency FROM deals WHERE id = ?", [id.into()]).await?,
    );
    assert_eq!(row, ("unassigned".into(), "fixed_price".into(), "USD".into()));

    exec(&db, "INSERT INTO sources (name) VALUES ('Efua Boateng')", []).await?;
    let rating: i32 = scalar(
        &db,
        "SELECT reliability_rating FROM sources WHERE name = 'Efua Boateng'",
        [],
    )
    .await?;
    assert_eq!(rating, 3);
    Ok(())
}

#[tokio::test]
async fn deleting_a_deal_removes_its_history() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Gold", "John Mensah").await?;
    let keep = insert_deal(&db, "Gold", "John Mensah").await?;
    for deal_id in [id, id, keep] {
        exec(
            &db,
            "INSERT INTO status_history (deal_id, old_status, new_status) VALUES (?, 'unassigned', 'under_review')",
            [deal_id.into()],
        )
        .await?;
    }

    exec(&db, "DELETE FROM deals WHERE id = ?", [id.into()]).await?;
    let remaining: i64 = scalar(&db, "SELECT COUNT(*) FROM status_history", []).await?;
    assert_eq!(remaining, 1);
    let orphaned: i64 = scalar(
        &db,
        "SELECT COUNT(*) FROM status_history WHERE deal_id = ?",
        [id.into()],
    )
    .await?;
    assert_eq!(orphaned, 0);
    Ok(())
}

#[tokio::test]
async fn history_rows_reject_unknown_statuses() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Gold", "John Mensah").await?;
    let err = exec(
        &db,
        "INSERT INTO status_history (deal_id, old_status, new_status) VALUES (?, NULL, 'lost')",
        [id.into()],
    )
    .await
    .unwrap_err();
    assert_eq!(classify_constraint(&err), Some(ConstraintKind::Check));
    Ok(())
}

#[tokio::test]
async fn renaming_a_source_follows_into_deals() -> Result<()> {
    let db = memory_db().await?;
    let id = insert_deal(&db, "Copper", "Amara Okafor").await?;
    exec(
        &db,
        "UPDATE sources SET name = 'Amara O. Okafor' WHERE name = 'Amara Okafor'",
        [],
    )
    .await?;
    let source: String = scalar(&db, "SELECT source_name FROM deals WHERE id = ?", [id.into()]).await?;
    assert_eq!(source, "Amara O. Okafor");
    Ok(())
}

#[tokio::test]
async fn unknown_sources_are_rejected_by_foreign_key() -> Result<()> {
    let db = memory_db().await?;
    let err = insert_deal(&db, "Gold", "Nobody").await.unwrap_err();
    let db_err = err.downcast_ref::<sea_orm::DbErr>().unwrap();
    assert_eq!(classify_constraint(db_err), Some(ConstraintKind::ForeignKey));
    Ok(())
}

#[tokio::test]
async fn counter_trigger_is_a_no_op_for_unknown_sources_without_foreign_keys() -> Result<()> {
    let db = memory_db().await?;
    exec(&db, "PRAGMA foreign_keys = OFF", []).await?;
    insert_deal(&db, "Gold", "Nobody").await?;

    let totals: i64 = scalar(&db, "SELECT SUM(total_deals) FROM sources", []).await?;
    assert_eq!(totals, 0);
    let deals: i64 = scalar(&db, "SELECT COUNT(*) FROM deals", []).await?;
    assert_eq!(deals, 1);
    Ok(())
}

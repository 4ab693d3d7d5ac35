use anyhow::Result;
use chrono::NaiveDate;
use migration::{Migrator, MigratorTrait};
use platform_db::{ConstraintKind, DatabaseSettings, connect};
use products_deals::{
    AttachmentPolicy, DealAnalysis, DealFilter, DealPatch, DealStatus, DealStore, NewDeal,
    NewSource, PriceType, RiskLevel, SourcePatch, StoreError, scoring::parse_score_response,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

async fn store() -> Result<DealStore> {
    let db = connect(&DatabaseSettings::in_memory()).await?;
    Migrator::up(&db, None).await?;
    Ok(DealStore::new(db))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

fn gold(source: &str, d: u32) -> NewDeal {
    NewDeal {
        quantity: Some(50.0),
        quantity_unit: Some("kg".into()),
        origin_country: Some("Ghana".into()),
        ..NewDeal::new("Gold", source, day(d))
    }
}

#[tokio::test]
async fn seeded_sources_are_listed_by_name() -> Result<()> {
    let store = store().await?;
    let names: Vec<_> = store
        .list_sources()
        .await?
        .into_iter()
        .map(|s| (s.name, s.reliability_rating))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Amara Okafor".to_string(), 5),
            ("John Mensah".to_string(), 7),
            ("Kwame Asante".to_string(), 3),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn create_source_defaults_and_rejects_duplicates() -> Result<()> {
    let store = store().await?;
    let created = store
        .create_source(NewSource {
            name: "  Efua Boateng ".into(),
            ..NewSource::default()
        })
        .await?;
    assert_eq!(created.name, "Efua Boateng");
    assert_eq!(created.reliability_rating, 3);
    assert_eq!(created.total_deals, 0);

    let err = store
        .create_source(NewSource {
            name: "John Mensah".into(),
            ..NewSource::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));

    let err = store
        .create_source(NewSource {
            name: "Zero Rated".into(),
            reliability_rating: Some(0),
            notes: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));
    Ok(())
}

#[tokio::test]
async fn update_and_rename_source() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("Kwame Asante", 1)).await?;

    let updated = store
        .update_source(
            "Kwame Asante",
            SourcePatch {
                reliability_rating: Some(6),
                notes: Some("KYC done".into()),
            },
        )
        .await?;
    assert_eq!(updated.reliability_rating, 6);
    assert_eq!(updated.notes.as_deref(), Some("KYC done"));

    let renamed = store.rename_source("Kwame Asante", "Kwame A. Asante").await?;
    assert_eq!(renamed.total_deals, 1);
    let deal = store.get_deal(deal.id).await?.unwrap();
    assert_eq!(deal.source_name, "Kwame A. Asante");

    let err = store.rename_source("Nobody", "Somebody").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn create_deal_snapshots_reliability_and_records_history() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 3)).await?;

    assert_eq!(deal.status, DealStatus::Unassigned);
    assert_eq!(deal.source_reliability, Some(7));
    assert_eq!(deal.price_type, PriceType::FixedPrice);
    assert_eq!(deal.price_currency.as_deref(), Some("USD"));

    let source = store.find_source("John Mensah").await?.unwrap();
    assert_eq!(source.total_deals, 1);

    let history = store.status_history(deal.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_status, None);
    assert_eq!(history[0].new_status, DealStatus::Unassigned);
    Ok(())
}

#[tokio::test]
async fn create_deal_validates_input() -> Result<()> {
    let store = store().await?;
    let err = store
        .create_deal(NewDeal::new("  ", "John Mensah", day(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store
        .create_deal(NewDeal::new("Copper", "Unknown Broker", day(1)))
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));

    let err = store
        .create_deal(NewDeal {
            source_reliability: Some(11),
            ..NewDeal::new("Copper", "Amara Okafor", day(1))
        })
        .await
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));

    // Failed inserts leave the counter alone.
    let source = store.find_source("Amara Okafor").await?.unwrap();
    assert_eq!(source.total_deals, 0);
    Ok(())
}

#[tokio::test]
async fn list_deals_filters_and_orders() -> Result<()> {
    let store = store().await?;
    let first = store.create_deal(gold("John Mensah", 1)).await?;
    let second = store.create_deal(gold("John Mensah", 5)).await?;
    let copper = store
        .create_deal(NewDeal::new("Copper", "Amara Okafor", day(5)))
        .await?;
    store
        .transition_status(first.id, DealStatus::UnderReview, None)
        .await?;

    let ids: Vec<i32> = store
        .list_deals(DealFilter::default())
        .await?
        .iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![copper.id, second.id, first.id]);

    let gold_only = store
        .list_deals(DealFilter {
            commodity_type: Some("Gold".into()),
            ..DealFilter::default()
        })
        .await?;
    assert_eq!(gold_only.len(), 2);

    let reviewing = store
        .list_deals(DealFilter {
            status: Some(DealStatus::UnderReview),
            ..DealFilter::default()
        })
        .await?;
    assert_eq!(reviewing.len(), 1);
    assert_eq!(reviewing[0].id, first.id);

    let limited = store
        .list_deals(DealFilter {
            limit: Some(0),
            ..DealFilter::default()
        })
        .await?;
    assert_eq!(limited.len(), 1);

    assert_eq!(store.latest_deal().await?.map(|d| d.id), Some(copper.id));
    Ok(())
}

#[tokio::test]
async fn update_deal_applies_patch() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 1)).await?;

    let err = store
        .update_deal(deal.id, DealPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let updated = store
        .update_deal(
            deal.id,
            DealPatch {
                price_type: Some(PriceType::LmeDiscount),
                gross_discount: Some(12.0),
                commission: Some(2.0),
                net_discount: Some(10.0),
                payment_method: Some("DLC".into()),
                ..DealPatch::default()
            },
        )
        .await?;
    assert_eq!(updated.price_type, PriceType::LmeDiscount);
    assert_eq!(updated.net_discount, Some(10.0));
    assert_eq!(updated.payment_method.as_deref(), Some("DLC"));
    assert_eq!(updated.quantity, Some(50.0));
    assert!(updated.updated_at >= deal.updated_at);

    let err = store
        .update_deal(
            999,
            DealPatch {
                deal_text: Some("ghost".into()),
                ..DealPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn transition_records_history_only_on_change() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 1)).await?;

    store
        .transition_status(deal.id, DealStatus::InProgress, Some("call booked".into()))
        .await?;
    store
        .transition_status(deal.id, DealStatus::InProgress, None)
        .await?;
    let done = store
        .transition_status(deal.id, DealStatus::Done, Some("signed".into()))
        .await?;
    assert_eq!(done.status, DealStatus::Done);

    let history = store.status_history(deal.id).await?;
    let moves: Vec<_> = history
        .iter()
        .map(|h| (h.old_status, h.new_status))
        .collect();
    assert_eq!(
        moves,
        vec![
            (Some(DealStatus::InProgress), DealStatus::Done),
            (Some(DealStatus::Unassigned), DealStatus::InProgress),
            (None, DealStatus::Unassigned),
        ]
    );
    assert_eq!(history[0].notes.as_deref(), Some("signed"));

    store
        .transition_status(deal.id, DealStatus::Done, None)
        .await?;
    let source = store.find_source("John Mensah").await?.unwrap();
    assert_eq!(source.successful_deals, 1);

    let err = store
        .transition_status(404, DealStatus::Done, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn delete_deal_cascades_history() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 1)).await?;
    store
        .transition_status(deal.id, DealStatus::OnHold, None)
        .await?;

    assert!(store.delete_deal(deal.id).await?);
    assert!(!store.delete_deal(deal.id).await?);
    assert!(store.status_history(deal.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn scores_are_range_checked() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("Amara Okafor", 1)).await?;

    let scored = store.set_manual_score(deal.id, 70).await?;
    assert_eq!(scored.manual_score, Some(70));
    let err = store.set_manual_score(deal.id, 101).await.unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check));

    let analysis = parse_score_response(
        r#"{"score": 77, "risk_level": "high", "reasoning": ["CONCERN: price 25% under LME"]}"#,
    );
    let scored = store.record_ai_score(deal.id, &analysis).await?;
    assert_eq!(scored.ai_score, Some(77));
    let reasoning: Vec<String> = serde_json::from_str(scored.ai_reasoning.as_deref().unwrap())?;
    assert_eq!(reasoning, vec!["CONCERN: price 25% under LME".to_string()]);
    let stored: DealAnalysis = serde_json::from_str(scored.ai_analysis.as_deref().unwrap())?;
    assert_eq!(stored.risk_level, RiskLevel::High);
    Ok(())
}

#[tokio::test]
async fn statistics_aggregate_pipeline() -> Result<()> {
    let store = store().await?;
    let empty = store.statistics().await?;
    assert_eq!(empty.total_deals, 0);
    assert_eq!(empty.average_ai_score, 0.0);
    assert!(empty.top_commodities.is_empty());

    let a = store.create_deal(gold("John Mensah", 1)).await?;
    let b = store.create_deal(gold("Amara Okafor", 2)).await?;
    store
        .create_deal(NewDeal::new("Copper", "Amara Okafor", day(3)))
        .await?;
    store.transition_status(a.id, DealStatus::Done, None).await?;
    store
        .record_ai_score(a.id, &parse_score_response(r#"{"score": 80}"#))
        .await?;
    store
        .record_ai_score(b.id, &parse_score_response(r#"{"score": 71}"#))
        .await?;

    let stats = store.statistics().await?;
    assert_eq!(stats.total_deals, 3);
    assert_eq!(stats.count(DealStatus::Done), 1);
    assert_eq!(stats.count(DealStatus::Unassigned), 2);
    assert_eq!(stats.count(DealStatus::Rejected), 0);
    assert_eq!(stats.average_ai_score, 75.5);
    assert_eq!(stats.top_commodities[0].commodity_type, "Gold");
    assert_eq!(stats.top_commodities[0].deals, 2);
    assert_eq!(stats.top_commodities[1].commodity_type, "Copper");
    Ok(())
}

#[tokio::test]
async fn repair_clears_only_corrupted_reasoning() -> Result<()> {
    let store = store().await?;
    let good = store.create_deal(gold("John Mensah", 1)).await?;
    let bad = store.create_deal(gold("John Mensah", 2)).await?;
    let unscored = store.create_deal(gold("John Mensah", 3)).await?;
    store
        .record_ai_score(good.id, &parse_score_response(r#"{"score": 60, "reasoning": ["INFO: ok"]}"#))
        .await?;

    store
        .connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "UPDATE deals SET ai_score = 40, ai_reasoning = ?, ai_analysis = ? WHERE id = ?",
            [
                "['POSITIVE: python repr']".into(),
                "{not json".into(),
                bad.id.into(),
            ],
        ))
        .await?;
    store
        .connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "UPDATE deals SET ai_reasoning = 'garbage' WHERE id = ?",
            [unscored.id.into()],
        ))
        .await?;

    let report = store.repair_ai_reasoning().await?;
    assert_eq!(report.scored, 2);
    assert_eq!(report.repaired, vec![bad.id]);
    assert_eq!(report.invalid_analysis, vec![bad.id]);

    let bad = store.get_deal(bad.id).await?.unwrap();
    assert_eq!(bad.ai_reasoning.as_deref(), Some("[]"));
    assert_eq!(bad.ai_analysis.as_deref(), Some("{not json"));
    let good = store.get_deal(good.id).await?.unwrap();
    assert_eq!(good.ai_reasoning.as_deref(), Some(r#"["INFO: ok"]"#));
    let unscored = store.get_deal(unscored.id).await?.unwrap();
    assert_eq!(unscored.ai_reasoning.as_deref(), Some("garbage"));
    Ok(())
}

#[tokio::test]
async fn resaving_the_same_status_refreshes_updated_at() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("Kwame Asante", 2)).await?;

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let resaved = store
        .transition_status(deal.id, DealStatus::Unassigned, None)
        .await?;
    assert_eq!(resaved.status, DealStatus::Unassigned);
    assert!(
        resaved.updated_at > deal.updated_at,
        "{} should be later than {}",
        resaved.updated_at,
        deal.updated_at
    );
    assert_eq!(store.status_history(deal.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn replacing_an_attachment_removes_the_old_file() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 3)).await?;
    let dir = std::env::temp_dir().join(format!("dealdesk-test-{}", uuid::Uuid::new_v4()));
    let policy = AttachmentPolicy::new(&dir);

    let first = store
        .store_attachment(&policy, deal.id, "draft.txt", b"draft")
        .await?
        .file_path
        .unwrap();
    let second = store
        .store_attachment(&policy, deal.id, "final.pdf", b"%PDF final")
        .await?
        .file_path
        .unwrap();
    assert_ne!(first, second);
    assert!(!std::path::Path::new(&first).exists());
    assert_eq!(tokio::fs::read(&second).await?, b"%PDF final");

    tokio::fs::remove_dir_all(&dir).await?;
    Ok(())
}

#[tokio::test]
async fn attachments_are_written_and_recorded() -> Result<()> {
    let store = store().await?;
    let deal = store.create_deal(gold("John Mensah", 1)).await?;
    let dir = std::env::temp_dir().join(format!("dealdesk-test-{}", uuid::Uuid::new_v4()));
    let policy = AttachmentPolicy::new(&dir).with_max_bytes(64);

    let updated = store
        .store_attachment(&policy, deal.id, "LOI final.pdf", b"%PDF-1.4 test")
        .await?;
    let path = updated.file_path.clone().unwrap();
    assert!(path.ends_with("-LOI_final.pdf"));
    assert_eq!(tokio::fs::read(&path).await?, b"%PDF-1.4 test");

    let err = store
        .store_attachment(&policy, 999, "terms.pdf", b"data")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let err = store
        .store_attachment(&policy, deal.id, "run.sh", b"data")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Attachment(_)));

    tokio::fs::remove_dir_all(&dir).await?;
    Ok(())
}

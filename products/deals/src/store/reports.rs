use std::collections::BTreeMap;

use entity::{DealStatus, deal};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
    sea_query::{Expr, Func, SimpleExpr},
};
use tracing::{info, instrument, warn};

use super::DealStore;
use crate::StoreResult;

const TOP_COMMODITIES: u64 = 5;

#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult)]
pub struct CommodityCount {
    pub commodity_type: String,
    pub deals: i64,
}

/// Dashboard aggregates over the whole pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DealStatistics {
    pub total_deals: u64,
    pub by_status: BTreeMap<DealStatus, u64>,
    /// Mean AI score over scored deals, two decimal places; `0.0` when none.
    pub average_ai_score: f64,
    pub top_commodities: Vec<CommodityCount>,
}

impl DealStatistics {
    pub fn count(&self, status: DealStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Outcome of [`DealStore::repair_ai_reasoning`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub scored: usize,
    /// Deals whose reasoning was reset to `[]`.
    pub repaired: Vec<i32>,
    /// Deals whose stored analysis is not valid JSON. Left untouched.
    pub invalid_analysis: Vec<i32>,
}

impl DealStore {
    #[instrument(skip(self))]
    pub async fn statistics(&self) -> StoreResult<DealStatistics> {
        let db = self.connection();
        let total_deals = deal::Entity::find().count(db).await?;

        let status_counts: Vec<(String, i64)> = deal::Entity::find()
            .select_only()
            .column(deal::Column::Status)
            .column_as(Expr::col(deal::Column::Id).count(), "deals")
            .group_by(deal::Column::Status)
            .into_tuple()
            .all(db)
            .await?;
        let mut by_status = BTreeMap::new();
        for (raw, count) in status_counts {
            match raw.parse::<DealStatus>() {
                Ok(status) => {
                    by_status.insert(status, count.max(0) as u64);
                }
                Err(err) => warn!(error = %err, "skipping unknown status in statistics"),
            }
        }

        let average: Option<Option<f64>> = deal::Entity::find()
            .select_only()
            .column_as(
                SimpleExpr::from(Func::avg(Expr::col(deal::Column::AiScore))),
                "average",
            )
            .filter(deal::Column::AiScore.is_not_null())
            .into_tuple()
            .one(db)
            .await?;
        let average_ai_score = average
            .flatten()
            .map(|avg| (avg * 100.0).round() / 100.0)
            .unwrap_or(0.0);

        let top_commodities = deal::Entity::find()
            .select_only()
            .column(deal::Column::CommodityType)
            .column_as(Expr::col(deal::Column::Id).count(), "deals")
            .group_by(deal::Column::CommodityType)
            .order_by_desc(Expr::col(deal::Column::Id).count())
            .order_by_asc(deal::Column::CommodityType)
            .limit(TOP_COMMODITIES)
            .into_model::<CommodityCount>()
            .all(db)
            .await?;

        Ok(DealStatistics {
            total_deals,
            by_status,
            average_ai_score,
            top_commodities,
        })
    }

    /// Reset corrupted `ai_reasoning` values on scored deals. A value survives
    /// only if it is a JSON array of strings; anything else becomes `[]`.
    /// Invalid `ai_analysis` payloads are reported but kept as-is.
    #[instrument(skip(self))]
    pub async fn repair_ai_reasoning(&self) -> StoreResult<RepairReport> {
        let db = self.connection();
        let scored: Vec<(i32, Option<String>, Option<String>)> = deal::Entity::find()
            .select_only()
            .columns([
                deal::Column::Id,
                deal::Column::AiReasoning,
                deal::Column::AiAnalysis,
            ])
            .filter(deal::Column::AiScore.is_not_null())
            .order_by_asc(deal::Column::Id)
            .into_tuple()
            .all(db)
            .await?;

        let mut report = RepairReport {
            scored: scored.len(),
            ..RepairReport::default()
        };
        for (id, reasoning, analysis) in scored {
            if let Some(reasoning) = reasoning.filter(|text| !text.is_empty()) {
                if !is_string_array(&reasoning) {
                    deal::Entity::update_many()
                        .col_expr(deal::Column::AiReasoning, Expr::value("[]"))
                        .filter(deal::Column::Id.eq(id))
                        .exec(db)
                        .await?;
                    info!(deal_id = id, "cleared corrupted ai reasoning");
                    report.repaired.push(id);
                }
            }
            if let Some(analysis) = analysis.filter(|text| !text.is_empty()) {
                if serde_json::from_str::<serde_json::Value>(&analysis).is_err() {
                    warn!(deal_id = id, "ai analysis is not valid JSON; keeping as-is");
                    report.invalid_analysis.push(id);
                }
            }
        }
        Ok(report)
    }
}

fn is_string_array(text: &str) -> bool {
    serde_json::from_str::<Vec<String>>(text).is_ok()
}

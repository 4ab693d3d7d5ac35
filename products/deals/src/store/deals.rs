use chrono::NaiveDate;
use entity::{DealStatus, PriceType, deal, source, status_history};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{NotSet, Set},
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use tracing::{info, instrument};

use super::{DealStore, optional_text, required_text};
use crate::{StoreError, StoreResult, scoring::DealAnalysis};

pub const DEFAULT_LIST_LIMIT: u64 = 100;
pub const MAX_LIST_LIMIT: u64 = 500;

/// Input for [`DealStore::create_deal`].
#[derive(Clone, Debug, Default)]
pub struct NewDeal {
    pub commodity_type: String,
    pub source_name: String,
    /// Snapshot of the source rating; copied from the source when unset.
    pub source_reliability: Option<i32>,
    pub deal_text: Option<String>,
    pub price: Option<f64>,
    pub price_currency: Option<String>,
    pub price_type: PriceType,
    pub gross_discount: Option<f64>,
    pub commission: Option<f64>,
    pub net_discount: Option<f64>,
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
    pub origin_country: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_terms: Option<String>,
    pub additional_notes: Option<String>,
    pub date_received: NaiveDate,
    pub status: Option<DealStatus>,
}

impl NewDeal {
    pub fn new(
        commodity_type: impl Into<String>,
        source_name: impl Into<String>,
        date_received: NaiveDate,
    ) -> Self {
        Self {
            commodity_type: commodity_type.into(),
            source_name: source_name.into(),
            date_received,
            ..Self::default()
        }
    }
}

/// Partial update of a deal's descriptive and pricing fields. `None` leaves a
/// field untouched. Status changes go through [`DealStore::transition_status`].
#[derive(Clone, Debug, Default)]
pub struct DealPatch {
    pub commodity_type: Option<String>,
    pub source_reliability: Option<i32>,
    pub deal_text: Option<String>,
    pub price: Option<f64>,
    pub price_currency: Option<String>,
    pub price_type: Option<PriceType>,
    pub gross_discount: Option<f64>,
    pub commission: Option<f64>,
    pub net_discount: Option<f64>,
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
    pub origin_country: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_terms: Option<String>,
    pub additional_notes: Option<String>,
    pub date_received: Option<NaiveDate>,
}

impl DealPatch {
    pub fn is_empty(&self) -> bool {
        self.commodity_type.is_none()
            && self.source_reliability.is_none()
            && self.deal_text.is_none()
            && self.price.is_none()
            && self.price_currency.is_none()
            && self.price_type.is_none()
            && self.gross_discount.is_none()
            && self.commission.is_none()
            && self.net_discount.is_none()
            && self.quantity.is_none()
            && self.quantity_unit.is_none()
            && self.origin_country.is_none()
            && self.payment_method.is_none()
            && self.shipping_terms.is_none()
            && self.additional_notes.is_none()
            && self.date_received.is_none()
    }

    fn apply(self, active: &mut deal::ActiveModel) -> StoreResult<()> {
        if let Some(commodity) = self.commodity_type {
            active.commodity_type = Set(required_text("commodity type", &commodity)?);
        }
        if let Some(rating) = self.source_reliability {
            active.source_reliability = Set(Some(rating));
        }
        if let Some(text) = self.deal_text {
            active.deal_text = Set(optional_text(Some(text)));
        }
        if let Some(price) = self.price {
            active.price = Set(Some(price));
        }
        if let Some(currency) = self.price_currency {
            active.price_currency = Set(optional_text(Some(currency)));
        }
        if let Some(price_type) = self.price_type {
            active.price_type = Set(price_type);
        }
        if let Some(gross) = self.gross_discount {
            active.gross_discount = Set(Some(gross));
        }
        if let Some(commission) = self.commission {
            active.commission = Set(Some(commission));
        }
        if let Some(net) = self.net_discount {
            active.net_discount = Set(Some(net));
        }
        if let Some(quantity) = self.quantity {
            active.quantity = Set(Some(quantity));
        }
        if let Some(unit) = self.quantity_unit {
            active.quantity_unit = Set(optional_text(Some(unit)));
        }
        if let Some(origin) = self.origin_country {
            active.origin_country = Set(optional_text(Some(origin)));
        }
        if let Some(payment) = self.payment_method {
            active.payment_method = Set(optional_text(Some(payment)));
        }
        if let Some(terms) = self.shipping_terms {
            active.shipping_terms = Set(optional_text(Some(terms)));
        }
        if let Some(notes) = self.additional_notes {
            active.additional_notes = Set(optional_text(Some(notes)));
        }
        if let Some(received) = self.date_received {
            active.date_received = Set(received);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct DealFilter {
    pub status: Option<DealStatus>,
    pub commodity_type: Option<String>,
    pub source_name: Option<String>,
    pub limit: Option<u64>,
}

impl DealStore {
    /// Insert a deal and its initial history row in one transaction. The
    /// source's `total_deals` counter is bumped by the insert trigger.
    #[instrument(skip(self, input), fields(source = %input.source_name))]
    pub async fn create_deal(&self, input: NewDeal) -> StoreResult<deal::Model> {
        let commodity_type = required_text("commodity type", &input.commodity_type)?;
        let source_name = required_text("source name", &input.source_name)?;
        let status = input.status.unwrap_or_default();

        let txn = self.connection().begin().await?;
        let source_reliability = match input.source_reliability {
            Some(rating) => Some(rating),
            None => source::Entity::find()
                .filter(source::Column::Name.eq(source_name.as_str()))
                .one(&txn)
                .await?
                .map(|source| source.reliability_rating),
        };

        let created = deal::ActiveModel {
            commodity_type: Set(commodity_type),
            source_name: Set(source_name),
            source_reliability: Set(source_reliability),
            deal_text: Set(optional_text(input.deal_text)),
            price: Set(input.price),
            price_currency: optional_text(input.price_currency)
                .map_or(NotSet, |currency| Set(Some(currency))),
            price_type: Set(input.price_type),
            gross_discount: Set(input.gross_discount),
            commission: Set(input.commission),
            net_discount: Set(input.net_discount),
            quantity: Set(input.quantity),
            quantity_unit: Set(optional_text(input.quantity_unit)),
            origin_country: Set(optional_text(input.origin_country)),
            payment_method: Set(optional_text(input.payment_method)),
            shipping_terms: Set(optional_text(input.shipping_terms)),
            additional_notes: Set(optional_text(input.additional_notes)),
            date_received: Set(input.date_received),
            status: Set(status),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        status_history::ActiveModel {
            deal_id: Set(created.id),
            old_status: Set(None),
            new_status: Set(status),
            notes: Set(Some("deal received".to_string())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(deal_id = created.id, commodity = %created.commodity_type, "deal created");
        Ok(created)
    }

    pub async fn get_deal(&self, id: i32) -> StoreResult<Option<deal::Model>> {
        Ok(deal::Entity::find_by_id(id).one(self.connection()).await?)
    }

    async fn require_deal(&self, id: i32) -> StoreResult<deal::Model> {
        self.get_deal(id)
            .await?
            .ok_or_else(|| StoreError::not_found("deal", id))
    }

    /// Deals newest-received first, optionally filtered.
    pub async fn list_deals(&self, filter: DealFilter) -> StoreResult<Vec<deal::Model>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let mut query = deal::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(deal::Column::Status.eq(status));
        }
        if let Some(commodity) = optional_text(filter.commodity_type) {
            query = query.filter(deal::Column::CommodityType.eq(commodity));
        }
        if let Some(source) = optional_text(filter.source_name) {
            query = query.filter(deal::Column::SourceName.eq(source));
        }
        Ok(query
            .order_by_desc(deal::Column::DateReceived)
            .order_by_desc(deal::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await?)
    }

    /// Most recently inserted deal.
    pub async fn latest_deal(&self) -> StoreResult<Option<deal::Model>> {
        Ok(deal::Entity::find()
            .order_by_desc(deal::Column::Id)
            .one(self.connection())
            .await?)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_deal(&self, id: i32, patch: DealPatch) -> StoreResult<deal::Model> {
        if patch.is_empty() {
            return Err(StoreError::invalid("nothing to update"));
        }
        let mut active: deal::ActiveModel = self.require_deal(id).await?.into();
        patch.apply(&mut active)?;
        Ok(active.update(self.connection()).await?)
    }

    /// Move a deal to `status`. A history row is appended only when the status
    /// actually changes; re-saving the same status still rewrites the row.
    #[instrument(skip(self, notes))]
    pub async fn transition_status(
        &self,
        id: i32,
        status: DealStatus,
        notes: Option<String>,
    ) -> StoreResult<deal::Model> {
        let txn = self.connection().begin().await?;
        let existing = deal::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::not_found("deal", id))?;
        let previous = existing.status;

        let mut active: deal::ActiveModel = existing.into();
        active.status = Set(status);
        let updated = active.update(&txn).await?;

        if previous != status {
            status_history::ActiveModel {
                deal_id: Set(id),
                old_status: Set(Some(previous)),
                new_status: Set(status),
                notes: Set(optional_text(notes)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        if previous != status {
            info!(deal_id = id, from = %previous, to = %status, "deal status changed");
        }
        Ok(updated)
    }

    /// History rows for a deal, newest first.
    pub async fn status_history(&self, deal_id: i32) -> StoreResult<Vec<status_history::Model>> {
        Ok(status_history::Entity::find()
            .filter(status_history::Column::DealId.eq(deal_id))
            .order_by_desc(status_history::Column::ChangedAt)
            .order_by_desc(status_history::Column::Id)
            .all(self.connection())
            .await?)
    }

    /// Delete a deal; its history goes with it via `ON DELETE CASCADE`.
    #[instrument(skip(self))]
    pub async fn delete_deal(&self, id: i32) -> StoreResult<bool> {
        let result = deal::Entity::delete_by_id(id)
            .exec(self.connection())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Record a reviewer's score. Out-of-range values are rejected by the
    /// `manual_score` CHECK constraint.
    pub async fn set_manual_score(&self, id: i32, score: i32) -> StoreResult<deal::Model> {
        self.update_columns(id, vec![(deal::Column::ManualScore, Expr::value(score))])
            .await
    }

    #[instrument(skip(self, analysis), fields(score = analysis.score))]
    pub async fn record_ai_score(
        &self,
        id: i32,
        analysis: &DealAnalysis,
    ) -> StoreResult<deal::Model> {
        let reasoning = serde_json::to_string(&analysis.reasoning)?;
        let full = serde_json::to_string(analysis)?;
        self.update_columns(
            id,
            vec![
                (deal::Column::AiScore, Expr::value(i32::from(analysis.score))),
                (deal::Column::AiReasoning, Expr::value(reasoning)),
                (deal::Column::AiAnalysis, Expr::value(full)),
            ],
        )
        .await
    }

    pub async fn set_attachment(&self, id: i32, path: &str) -> StoreResult<deal::Model> {
        self.update_columns(id, vec![(deal::Column::FilePath, Expr::value(path))])
            .await
    }

    async fn update_columns(
        &self,
        id: i32,
        columns: Vec<(deal::Column, sea_orm::sea_query::SimpleExpr)>,
    ) -> StoreResult<deal::Model> {
        let mut update = deal::Entity::update_many().filter(deal::Column::Id.eq(id));
        for (column, value) in columns {
            update = update.col_expr(column, value);
        }
        let result = update.exec(self.connection()).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::not_found("deal", id));
        }
        self.require_deal(id).await
    }
}

use async_graphql::{Enum, InputObject, Json, SimpleObject};
use chrono::{NaiveDate, NaiveDateTime};
use entity::{deal, source, status_history};
use products_deals::{
    CommodityCount, DealFilter, DealPatch, DealStatistics, DealStatus, NewDeal, NewSource,
    PriceType, SourcePatch,
};
use serde_json::Value;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "DealStatus")]
pub enum DealStatusGql {
    Unassigned,
    UnderReview,
    InProgress,
    Done,
    ClosedLost,
    OnHold,
    Rejected,
}

impl From<DealStatus> for DealStatusGql {
    fn from(value: DealStatus) -> Self {
        match value {
            DealStatus::Unassigned => DealStatusGql::Unassigned,
            DealStatus::UnderReview => DealStatusGql::UnderReview,
            DealStatus::InProgress => DealStatusGql::InProgress,
            DealStatus::Done => DealStatusGql::Done,
            DealStatus::ClosedLost => DealStatusGql::ClosedLost,
            DealStatus::OnHold => DealStatusGql::OnHold,
            DealStatus::Rejected => DealStatusGql::Rejected,
        }
    }
}

impl From<DealStatusGql> for DealStatus {
    fn from(value: DealStatusGql) -> Self {
        match value {
            DealStatusGql::Unassigned => DealStatus::Unassigned,
            DealStatusGql::UnderReview => DealStatus::UnderReview,
            DealStatusGql::InProgress => DealStatus::InProgress,
            DealStatusGql::Done => DealStatus::Done,
            DealStatusGql::ClosedLost => DealStatus::ClosedLost,
            DealStatusGql::OnHold => DealStatus::OnHold,
            DealStatusGql::Rejected => DealStatus::Rejected,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "PriceType")]
pub enum PriceTypeGql {
    FixedPrice,
    LmeDiscount,
}

impl From<PriceType> for PriceTypeGql {
    fn from(value: PriceType) -> Self {
        match value {
            PriceType::FixedPrice => PriceTypeGql::FixedPrice,
            PriceType::LmeDiscount => PriceTypeGql::LmeDiscount,
        }
    }
}

impl From<PriceTypeGql> for PriceType {
    fn from(value: PriceTypeGql) -> Self {
        match value {
            PriceTypeGql::FixedPrice => PriceType::FixedPrice,
            PriceTypeGql::LmeDiscount => PriceType::LmeDiscount,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Source")]
pub struct SourceNode {
    pub id: i32,
    pub name: String,
    #[graphql(name = "reliabilityRating")]
    pub reliability_rating: i32,
    pub notes: Option<String>,
    #[graphql(name = "totalDeals")]
    pub total_deals: i32,
    #[graphql(name = "successfulDeals")]
    pub successful_deals: i32,
    #[graphql(name = "successRate")]
    pub success_rate: Option<f64>,
    #[graphql(name = "createdAt")]
    pub created_at: NaiveDateTime,
}

impl From<source::Model> for SourceNode {
    fn from(model: source::Model) -> Self {
        Self {
            success_rate: model.success_rate(),
            id: model.id,
            name: model.name,
            reliability_rating: model.reliability_rating,
            notes: model.notes,
            total_deals: model.total_deals,
            successful_deals: model.successful_deals,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Deal")]
pub struct DealNode {
    pub id: i32,
    #[graphql(name = "commodityType")]
    pub commodity_type: String,
    #[graphql(name = "sourceName")]
    pub source_name: String,
    #[graphql(name = "sourceReliability")]
    pub source_reliability: Option<i32>,
    #[graphql(name = "dealText")]
    pub deal_text: Option<String>,
    pub price: Option<f64>,
    #[graphql(name = "priceCurrency")]
    pub price_currency: Option<String>,
    #[graphql(name = "priceType")]
    pub price_type: PriceTypeGql,
    #[graphql(name = "grossDiscount")]
    pub gross_discount: Option<f64>,
    pub commission: Option<f64>,
    #[graphql(name = "netDiscount")]
    pub net_discount: Option<f64>,
    pub quantity: Option<f64>,
    #[graphql(name = "quantityUnit")]
    pub quantity_unit: Option<String>,
    #[graphql(name = "originCountry")]
    pub origin_country: Option<String>,
    #[graphql(name = "paymentMethod")]
    pub payment_method: Option<String>,
    #[graphql(name = "shippingTerms")]
    pub shipping_terms: Option<String>,
    #[graphql(name = "additionalNotes")]
    pub additional_notes: Option<String>,
    #[graphql(name = "dateReceived")]
    pub date_received: NaiveDate,
    pub status: DealStatusGql,
    #[graphql(name = "aiScore")]
    pub ai_score: Option<i32>,
    /// Stored reasoning lines; empty when missing or unreadable.
    #[graphql(name = "aiReasoning")]
    pub ai_reasoning: Vec<String>,
    #[graphql(name = "aiAnalysis")]
    pub ai_analysis: Option<Json<Value>>,
    #[graphql(name = "manualScore")]
    pub manual_score: Option<i32>,
    #[graphql(name = "filePath")]
    pub file_path: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: NaiveDateTime,
    #[graphql(name = "updatedAt")]
    pub updated_at: NaiveDateTime,
}

impl From<deal::Model> for DealNode {
    fn from(model: deal::Model) -> Self {
        let ai_reasoning = model
            .ai_reasoning
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();
        let ai_analysis = model
            .ai_analysis
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .map(Json);
        Self {
            id: model.id,
            commodity_type: model.commodity_type,
            source_name: model.source_name,
            source_reliability: model.source_reliability,
            deal_text: model.deal_text,
            price: model.price,
            price_currency: model.price_currency,
            price_type: model.price_type.into(),
            gross_discount: model.gross_discount,
            commission: model.commission,
            net_discount: model.net_discount,
            quantity: model.quantity,
            quantity_unit: model.quantity_unit,
            origin_country: model.origin_country,
            payment_method: model.payment_method,
            shipping_terms: model.shipping_terms,
            additional_notes: model.additional_notes,
            date_received: model.date_received,
            status: model.status.into(),
            ai_score: model.ai_score,
            ai_reasoning,
            ai_analysis,
            manual_score: model.manual_score,
            file_path: model.file_path,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "StatusChange")]
pub struct StatusChangeNode {
    pub id: i32,
    #[graphql(name = "dealId")]
    pub deal_id: i32,
    #[graphql(name = "oldStatus")]
    pub old_status: Option<DealStatusGql>,
    #[graphql(name = "newStatus")]
    pub new_status: DealStatusGql,
    #[graphql(name = "changedAt")]
    pub changed_at: NaiveDateTime,
    pub notes: Option<String>,
}

impl From<status_history::Model> for StatusChangeNode {
    fn from(model: status_history::Model) -> Self {
        Self {
            id: model.id,
            deal_id: model.deal_id,
            old_status: model.old_status.map(Into::into),
            new_status: model.new_status.into(),
            changed_at: model.changed_at,
            notes: model.notes,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StatusCount {
    pub status: DealStatusGql,
    pub count: u64,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CommodityCountNode {
    #[graphql(name = "commodityType")]
    pub commodity_type: String,
    pub deals: i64,
}

impl From<CommodityCount> for CommodityCountNode {
    fn from(value: CommodityCount) -> Self {
        Self {
            commodity_type: value.commodity_type,
            deals: value.deals,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Statistics")]
pub struct StatisticsNode {
    #[graphql(name = "totalDeals")]
    pub total_deals: u64,
    /// One entry per status, zero counts included.
    #[graphql(name = "byStatus")]
    pub by_status: Vec<StatusCount>,
    #[graphql(name = "averageAiScore")]
    pub average_ai_score: f64,
    #[graphql(name = "topCommodities")]
    pub top_commodities: Vec<CommodityCountNode>,
}

impl From<DealStatistics> for StatisticsNode {
    fn from(stats: DealStatistics) -> Self {
        let by_status = DealStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status: status.into(),
                count: stats.count(status),
            })
            .collect();
        Self {
            total_deals: stats.total_deals,
            by_status,
            average_ai_score: stats.average_ai_score,
            top_commodities: stats.top_commodities.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(InputObject, Clone)]
pub struct NewSourceInput {
    pub name: String,
    #[graphql(name = "reliabilityRating")]
    pub reliability_rating: Option<i32>,
    pub notes: Option<String>,
}

impl From<NewSourceInput> for NewSource {
    fn from(input: NewSourceInput) -> Self {
        Self {
            name: input.name,
            reliability_rating: input.reliability_rating,
            notes: input.notes,
        }
    }
}

#[derive(InputObject, Clone, Default)]
pub struct SourcePatchInput {
    #[graphql(name = "reliabilityRating")]
    pub reliability_rating: Option<i32>,
    pub notes: Option<String>,
}

impl From<SourcePatchInput> for SourcePatch {
    fn from(input: SourcePatchInput) -> Self {
        Self {
            reliability_rating: input.reliability_rating,
            notes: input.notes,
        }
    }
}

#[derive(InputObject, Clone)]
pub struct NewDealInput {
    #[graphql(name = "commodityType")]
    pub commodity_type: String,
    #[graphql(name = "sourceName")]
    pub source_name: String,
    #[graphql(name = "sourceReliability")]
    pub source_reliability: Option<i32>,
    #[graphql(name = "dealText")]
    pub deal_text: Option<String>,
    pub price: Option<f64>,
    #[graphql(name = "priceCurrency")]
    pub price_currency: Option<String>,
    #[graphql(name = "priceType")]
    pub price_type: Option<PriceTypeGql>,
    #[graphql(name = "grossDiscount")]
    pub gross_discount: Option<f64>,
    pub commission: Option<f64>,
    #[graphql(name = "netDiscount")]
    pub net_discount: Option<f64>,
    pub quantity: Option<f64>,
    #[graphql(name = "quantityUnit")]
    pub quantity_unit: Option<String>,
    #[graphql(name = "originCountry")]
    pub origin_country: Option<String>,
    #[graphql(name = "paymentMethod")]
    pub payment_method: Option<String>,
    #[graphql(name = "shippingTerms")]
    pub shipping_terms: Option<String>,
    #[graphql(name = "additionalNotes")]
    pub additional_notes: Option<String>,
    #[graphql(name = "dateReceived")]
    pub date_received: NaiveDate,
    pub status: Option<DealStatusGql>,
}

impl From<NewDealInput> for NewDeal {
    fn from(input: NewDealInput) -> Self {
        Self {
            commodity_type: input.commodity_type,
            source_name: input.source_name,
            source_reliability: input.source_reliability,
            deal_text: input.deal_text,
            price: input.price,
            price_currency: input.price_currency,
            price_type: input.price_type.map(Into::into).unwrap_or_default(),
            gross_discount: input.gross_discount,
            commission: input.commission,
            net_discount: input.net_discount,
            quantity: input.quantity,
            quantity_unit: input.quantity_unit,
            origin_country: input.origin_country,
            payment_method: input.payment_method,
            shipping_terms: input.shipping_terms,
            additional_notes: input.additional_notes,
            date_received: input.date_received,
            status: input.status.map(Into::into),
        }
    }
}

#[derive(InputObject, Clone, Default)]
pub struct DealPatchInput {
    #[graphql(name = "commodityType")]
    pub commodity_type: Option<String>,
    #[graphql(name = "sourceReliability")]
    pub source_reliability: Option<i32>,
    #[graphql(name = "dealText")]
    pub deal_text: Option<String>,
    pub price: Option<f64>,
    #[graphql(name = "priceCurrency")]
    pub price_currency: Option<String>,
    #[graphql(name = "priceType")]
    pub price_type: Option<PriceTypeGql>,
    #[graphql(name = "grossDiscount")]
    pub gross_discount: Option<f64>,
    pub commission: Option<f64>,
    #[graphql(name = "netDiscount")]
    pub net_discount: Option<f64>,
    pub quantity: Option<f64>,
    #[graphql(name = "quantityUnit")]
    pub quantity_unit: Option<String>,
    #[graphql(name = "originCountry")]
    pub origin_country: Option<String>,
    #[graphql(name = "paymentMethod")]
    pub payment_method: Option<String>,
    #[graphql(name = "shippingTerms")]
    pub shipping_terms: Option<String>,
    #[graphql(name = "additionalNotes")]
    pub additional_notes: Option<String>,
    #[graphql(name = "dateReceived")]
    pub date_received: Option<NaiveDate>,
}

impl From<DealPatchInput> for DealPatch {
    fn from(input: DealPatchInput) -> Self {
        Self {
            commodity_type: input.commodity_type,
            source_reliability: input.source_reliability,
            deal_text: input.deal_text,
            price: input.price,
            price_currency: input.price_currency,
            price_type: input.price_type.map(Into::into),
            gross_discount: input.gross_discount,
            commission: input.commission,
            net_discount: input.net_discount,
            quantity: input.quantity,
            quantity_unit: input.quantity_unit,
            origin_country: input.origin_country,
            payment_method: input.payment_method,
            shipping_terms: input.shipping_terms,
            additional_notes: input.additional_notes,
            date_received: input.date_received,
        }
    }
}

#[derive(InputObject, Clone, Default)]
pub struct DealFilterInput {
    pub status: Option<DealStatusGql>,
    #[graphql(name = "commodityType")]
    pub commodity_type: Option<String>,
    #[graphql(name = "sourceName")]
    pub source_name: Option<String>,
    pub limit: Option<i32>,
}

impl From<DealFilterInput> for DealFilter {
    fn from(input: DealFilterInput) -> Self {
        Self {
            status: input.status.map(Into::into),
            commodity_type: input.commodity_type,
            source_name: input.source_name,
            limit: input.limit.map(|limit| limit.max(0) as u64),
        }
    }
}

use std::{fmt, str::FromStr};

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub commodity_type: String,
    #[sea_orm(indexed)]
    pub source_name: String,
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
    #[sea_orm(indexed)]
    pub date_received: Date,
    #[sea_orm(indexed)]
    pub status: Status,
    pub ai_score: Option<i32>,
    pub ai_reasoning: Option<String>,
    pub ai_analysis: Option<String>,
    pub manual_score: Option<i32>,
    pub file_path: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::source::Entity",
        from = "Column::SourceName",
        to = "super::source::Column::Name",
        on_update = "Cascade"
    )]
    Source,
    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,
}

impl Related<super::source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Source.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

/// Pipeline stage of a deal. The same seven values are enforced by a CHECK
/// constraint on `deals.status`.
#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Status {
    #[sea_orm(string_value = "unassigned")]
    Unassigned,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "closed_lost")]
    ClosedLost,
    #[sea_orm(string_value = "on_hold")]
    OnHold,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Unassigned,
        Status::UnderReview,
        Status::InProgress,
        Status::Done,
        Status::ClosedLost,
        Status::OnHold,
        Status::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unassigned => "unassigned",
            Status::UnderReview => "under_review",
            Status::InProgress => "in_progress",
            Status::Done => "done",
            Status::ClosedLost => "closed_lost",
            Status::OnHold => "on_hold",
            Status::Rejected => "rejected",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unassigned
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown deal status `{}`", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum PriceType {
    #[sea_orm(string_value = "fixed_price")]
    FixedPrice,
    #[sea_orm(string_value = "lme_discount")]
    LmeDiscount,
}

impl Default for PriceType {
    fn default() -> Self {
        PriceType::FixedPrice
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Commodity deal pipeline on top of the `sources` / `deals` / `status_history`
//! schema. Counters, timestamps and value ranges are enforced by the database;
//! this crate only offers typed access to them.

pub mod attachments;
mod error;
pub mod scoring;
mod store;

pub use attachments::AttachmentPolicy;
pub use entity::{DealStatus, PriceType};
pub use error::{StoreError, StoreResult};
pub use scoring::{AnthropicScorer, DealAnalysis, RiskLevel, ScorerConfig, ScoringError};
pub use store::{
    CommodityCount, DEFAULT_LIST_LIMIT, DealFilter, DealPatch, DealStatistics, DealStore,
    MAX_LIST_LIMIT, NewDeal, NewSource, RepairReport, SourcePatch,
};

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{StoreError, StoreResult};

mod deals;
mod reports;
mod sources;

pub use deals::{DEFAULT_LIST_LIMIT, DealFilter, DealPatch, MAX_LIST_LIMIT, NewDeal};
pub use reports::{CommodityCount, DealStatistics, RepairReport};
pub use sources::{NewSource, SourcePatch};

/// Typed access to the deal pipeline tables. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DealStore {
    db: Arc<DatabaseConnection>,
}

impl DealStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}

fn required_text(field: &str, value: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::invalid(format!("{field} cannot be blank")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

//! sea-orm models for the deal pipeline tables.

pub mod deal;
pub mod source;
pub mod status_history;

pub use deal::{PriceType, Status as DealStatus};

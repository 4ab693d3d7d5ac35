use sea_orm::entity::prelude::*;

/// A contact supplying deal leads. Counters are maintained by triggers on `deals`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub reliability_rating: i32,
    pub notes: Option<String>,
    pub total_deals: i32,
    pub successful_deals: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::deal::Entity")]
    Deal,
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl Model {
    /// Share of this source's deals that reached `done`, if it has any.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_deals <= 0 {
            return None;
        }
        Some(f64::from(self.successful_deals) / f64::from(self.total_deals))
    }
}

impl ActiveModelBehavior for ActiveModel {}

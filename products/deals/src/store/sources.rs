use entity::source;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};
use tracing::{info, instrument};

use super::{DealStore, optional_text, required_text};
use crate::{StoreError, StoreResult};

#[derive(Clone, Debug, Default)]
pub struct NewSource {
    pub name: String,
    /// Falls back to the column default (3) when unset.
    pub reliability_rating: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SourcePatch {
    pub reliability_rating: Option<i32>,
    pub notes: Option<String>,
}

impl SourcePatch {
    pub fn is_empty(&self) -> bool {
        self.reliability_rating.is_none() && self.notes.is_none()
    }
}

impl DealStore {
    pub async fn list_sources(&self) -> StoreResult<Vec<source::Model>> {
        Ok(source::Entity::find()
            .order_by_asc(source::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn find_source(&self, name: &str) -> StoreResult<Option<source::Model>> {
        Ok(source::Entity::find()
            .filter(source::Column::Name.eq(name.trim()))
            .one(self.connection())
            .await?)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_source(&self, input: NewSource) -> StoreResult<source::Model> {
        let mut model = source::ActiveModel {
            name: Set(required_text("name", &input.name)?),
            notes: Set(optional_text(input.notes)),
            ..Default::default()
        };
        if let Some(rating) = input.reliability_rating {
            model.reliability_rating = Set(rating);
        }
        let created = model.insert(self.connection()).await?;
        info!(source_id = created.id, "source created");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_source(&self, name: &str, patch: SourcePatch) -> StoreResult<source::Model> {
        if patch.is_empty() {
            return Err(StoreError::invalid("nothing to update"));
        }
        let existing = self
            .find_source(name)
            .await?
            .ok_or_else(|| StoreError::not_found("source", name))?;
        let mut active: source::ActiveModel = existing.into();
        if let Some(rating) = patch.reliability_rating {
            active.reliability_rating = Set(rating);
        }
        if let Some(notes) = patch.notes {
            active.notes = Set(optional_text(Some(notes)));
        }
        Ok(active.update(self.connection()).await?)
    }

    /// Rename a source. Deals follow through `ON UPDATE CASCADE` on `deals.source_name`.
    #[instrument(skip(self))]
    pub async fn rename_source(&self, name: &str, new_name: &str) -> StoreResult<source::Model> {
        let new_name = required_text("new name", new_name)?;
        let result = source::Entity::update_many()
            .col_expr(source::Column::Name, Expr::value(new_name.clone()))
            .filter(source::Column::Name.eq(name.trim()))
            .exec(self.connection())
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::not_found("source", name));
        }
        info!(%new_name, "source renamed");
        self.find_source(&new_name)
            .await?
            .ok_or_else(|| StoreError::not_found("source", new_name))
    }
}

mod types;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use platform_api::ApiError;
use products_deals::{AnthropicScorer, DealStatus, DealStore, ScoringError, StoreError};
use serde::Serialize;
use tracing::{info, instrument};

pub use types::*;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;
type GqlResult<T> = async_graphql::Result<T>;

/// Shared resolver context.
#[derive(Clone)]
pub struct GraphqlData {
    pub store: DealStore,
    pub scorer: Option<Arc<AnthropicScorer>>,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

fn data<'a>(ctx: &Context<'a>) -> GqlResult<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
}

pub(crate) fn store_error(err: StoreError) -> async_graphql::Error {
    let api = match err {
        StoreError::NotFound { entity, key } => ApiError::NotFound(format!("{entity} `{key}`")),
        StoreError::Constraint { kind, message } => ApiError::Constraint {
            kind: kind.as_str(),
            detail: message,
        },
        StoreError::InvalidInput(message) | StoreError::Attachment(message) => {
            ApiError::InvalidInput(message)
        }
        other => ApiError::internal(other.into()),
    };
    api.extend()
}

fn scoring_error(err: ScoringError) -> async_graphql::Error {
    ApiError::Unavailable(err.to_string()).extend()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self, ctx: &Context<'_>) -> GqlResult<HealthPayload> {
        let db_ok = data(ctx)?.store.connection().ping().await.is_ok();
        Ok(HealthPayload { ok: db_ok, db_ok })
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Every status a deal can be in, in pipeline order.
    async fn statuses(&self) -> Vec<DealStatusGql> {
        DealStatus::ALL.into_iter().map(Into::into).collect()
    }

    #[instrument(name = "graphql.sources", skip_all)]
    async fn sources(&self, ctx: &Context<'_>) -> GqlResult<Vec<SourceNode>> {
        let sources = data(ctx)?.store.list_sources().await.map_err(store_error)?;
        Ok(sources.into_iter().map(Into::into).collect())
    }

    async fn source(&self, ctx: &Context<'_>, name: String) -> GqlResult<Option<SourceNode>> {
        let source = data(ctx)?
            .store
            .find_source(&name)
            .await
            .map_err(store_error)?;
        Ok(source.map(Into::into))
    }

    #[instrument(name = "graphql.deals", skip_all)]
    async fn deals(
        &self,
        ctx: &Context<'_>,
        filter: Option<DealFilterInput>,
    ) -> GqlResult<Vec<DealNode>> {
        let deals = data(ctx)?
            .store
            .list_deals(filter.unwrap_or_default().into())
            .await
            .map_err(store_error)?;
        Ok(deals.into_iter().map(Into::into).collect())
    }

    async fn deal(&self, ctx: &Context<'_>, id: i32) -> GqlResult<Option<DealNode>> {
        let deal = data(ctx)?.store.get_deal(id).await.map_err(store_error)?;
        Ok(deal.map(Into::into))
    }

    #[graphql(name = "statusHistory")]
    async fn status_history(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealId")] deal_id: i32,
    ) -> GqlResult<Vec<StatusChangeNode>> {
        let rows = data(ctx)?
            .store
            .status_history(deal_id)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.statistics", skip_all)]
    async fn statistics(&self, ctx: &Context<'_>) -> GqlResult<StatisticsNode> {
        let stats = data(ctx)?.store.statistics().await.map_err(store_error)?;
        Ok(stats.into())
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    #[graphql(name = "createSource")]
    async fn create_source(
        &self,
        ctx: &Context<'_>,
        input: NewSourceInput,
    ) -> GqlResult<SourceNode> {
        let source = data(ctx)?
            .store
            .create_source(input.into())
            .await
            .map_err(store_error)?;
        Ok(source.into())
    }

    #[graphql(name = "updateSource")]
    async fn update_source(
        &self,
        ctx: &Context<'_>,
        name: String,
        input: SourcePatchInput,
    ) -> GqlResult<SourceNode> {
        let source = data(ctx)?
            .store
            .update_source(&name, input.into())
            .await
            .map_err(store_error)?;
        Ok(source.into())
    }

    #[graphql(name = "renameSource")]
    async fn rename_source(
        &self,
        ctx: &Context<'_>,
        name: String,
        #[graphql(name = "newName")] new_name: String,
    ) -> GqlResult<SourceNode> {
        let source = data(ctx)?
            .store
            .rename_source(&name, &new_name)
            .await
            .map_err(store_error)?;
        Ok(source.into())
    }

    #[graphql(name = "createDeal")]
    #[instrument(name = "graphql.create_deal", skip_all)]
    async fn create_deal(&self, ctx: &Context<'_>, input: NewDealInput) -> GqlResult<DealNode> {
        let deal = data(ctx)?
            .store
            .create_deal(input.into())
            .await
            .map_err(store_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "updateDeal")]
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: DealPatchInput,
    ) -> GqlResult<DealNode> {
        let deal = data(ctx)?
            .store
            .update_deal(id, input.into())
            .await
            .map_err(store_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "setDealStatus")]
    #[instrument(name = "graphql.set_deal_status", skip_all, fields(deal_id = id))]
    async fn set_deal_status(
        &self,
        ctx: &Context<'_>,
        id: i32,
        status: DealStatusGql,
        notes: Option<String>,
    ) -> GqlResult<DealNode> {
        let deal = data(ctx)?
            .store
            .transition_status(id, status.into(), notes)
            .await
            .map_err(store_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "setManualScore")]
    async fn set_manual_score(&self, ctx: &Context<'_>, id: i32, score: i32) -> GqlResult<DealNode> {
        let deal = data(ctx)?
            .store
            .set_manual_score(id, score)
            .await
            .map_err(store_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "deleteDeal")]
    async fn delete_deal(&self, ctx: &Context<'_>, id: i32) -> GqlResult<bool> {
        data(ctx)?.store.delete_deal(id).await.map_err(store_error)
    }

    /// Run the AI scorer on a deal and store the result.
    #[graphql(name = "scoreDeal")]
    #[instrument(name = "graphql.score_deal", skip_all, fields(deal_id = id))]
    async fn score_deal(&self, ctx: &Context<'_>, id: i32) -> GqlResult<DealNode> {
        let data = data(ctx)?;
        let Some(scorer) = data.scorer.as_ref() else {
            return Err(scoring_error(ScoringError::MissingApiKey));
        };
        let deal = data
            .store
            .get_deal(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| store_error(StoreError::not_found("deal", id)))?;
        let analysis = scorer.score_deal(&deal).await.map_err(scoring_error)?;
        let scored = data
            .store
            .record_ai_score(id, &analysis)
            .await
            .map_err(store_error)?;
        info!(deal_id = id, score = analysis.score, "deal scored");
        Ok(scored.into())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
    #[graphql(name = "dbOk")]
    pub db_ok: bool,
}

//! Deals and pipeline stages

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use crm_common::db::deals::{self, DealPatch, NewDeal};
use crm_common::db::{Deal, PipelineStage};
use serde::Deserialize;
use uuid::Uuid;

use super::{deleted, found};
use crate::error::{ApiJson, ApiResult};
use crate::pagination::{Page, Pagination};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveStageRequest {
    pub stage_id: Uuid,
}

/// GET /api/pipeline/stages
pub async fn list_stages(State(state): State<AppState>) -> ApiResult<Json<Vec<PipelineStage>>> {
    Ok(Json(deals::list_stages(&state.db).await?))
}

/// GET /api/deals?page=N&perPage=M&stageId=...
pub async fn list_deals(
    State(state): State<AppState>,
    Query(query): Query<DealQuery>,
) -> ApiResult<Json<Page<Deal>>> {
    let total = deals::count(&state.db, query.stage_id).await?;
    let pagination = Pagination::new(total, query.page, query.per_page);
    let items = deals::list(&state.db, query.stage_id, pagination.per_page, pagination.offset).await?;
    Ok(Json(Page::new(items, pagination, total)))
}

pub async fn create_deal(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewDeal>,
) -> ApiResult<(StatusCode, Json<Deal>)> {
    let deal = deals::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
) -> ApiResult<Json<Deal>> {
    let deal = deals::get(&state.db, deal_id).await?;
    Ok(Json(found(deal, "deal", deal_id)?))
}

pub async fn update_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    ApiJson(body): ApiJson<DealPatch>,
) -> ApiResult<Json<Deal>> {
    let deal = deals::update(&state.db, deal_id, &body).await?;
    Ok(Json(found(deal, "deal", deal_id)?))
}

/// PATCH /api/deals/:id/stage
pub async fn move_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    ApiJson(body): ApiJson<MoveStageRequest>,
) -> ApiResult<Json<Deal>> {
    let deal = deals::move_stage(&state.db, deal_id, body.stage_id).await?;
    Ok(Json(found(deal, "deal", deal_id)?))
}

pub async fn delete_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    deleted(deals::delete(&state.db, deal_id).await?, "deal", deal_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/pipeline/stages", get(list_stages))
        .route("/api/deals", get(list_deals).post(create_deal))
        .route(
            "/api/deals/:deal_id",
            get(get_deal).patch(update_deal).delete(delete_deal),
        )
        .route("/api/deals/:deal_id/stage", patch(move_deal))
}

//! Areas of activity: a contact's roles at companies

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use crm_common::db::areas_of_activity::{self, AreaOfActivityPatch, NewAreaOfActivity};
use crm_common::db::{contacts, AreaOfActivity};
use uuid::Uuid;

use super::{deleted, flagged, found};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub async fn list_areas(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AreaOfActivity>>> {
    found(contacts::get(&state.db, contact_id).await?, "contact", contact_id)?;
    Ok(Json(areas_of_activity::list(&state.db, contact_id).await?))
}

pub async fn create_area(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewAreaOfActivity>,
) -> ApiResult<(StatusCode, Json<AreaOfActivity>)> {
    let area = areas_of_activity::create(&state.db, contact_id, &body).await?;
    Ok((StatusCode::CREATED, Json(area)))
}

pub async fn update_area(
    State(state): State<AppState>,
    Path((contact_id, area_id)): Path<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<AreaOfActivityPatch>,
) -> ApiResult<Json<AreaOfActivity>> {
    let area = areas_of_activity::update(&state.db, contact_id, area_id, &body).await?;
    Ok(Json(found(area, "area of activity", area_id)?))
}

pub async fn set_primary_area(
    State(state): State<AppState>,
    Path((contact_id, area_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<AreaOfActivity>>> {
    let changed = areas_of_activity::set_primary(&state.db, contact_id, area_id).await?;
    flagged(changed, "area of activity", area_id)?;
    Ok(Json(areas_of_activity::list(&state.db, contact_id).await?))
}

pub async fn delete_area(
    State(state): State<AppState>,
    Path((contact_id, area_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let removed = areas_of_activity::delete(&state.db, contact_id, area_id).await?;
    deleted(removed, "area of activity", area_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/contacts/:contact_id/areas-of-activity",
            get(list_areas).post(create_area),
        )
        .route(
            "/api/contacts/:contact_id/areas-of-activity/:area_id",
            patch(update_area).delete(delete_area),
        )
        .route(
            "/api/contacts/:contact_id/areas-of-activity/:area_id/default",
            patch(set_primary_area),
        )
}

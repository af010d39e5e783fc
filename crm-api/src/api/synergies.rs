//! Synergies of a contact
//!
//! Deleting a synergy only hides it; the row is kept for history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use crm_common::db::synergies::{self, NewSynergy, SynergyPatch};
use crm_common::db::{contacts, Synergy};
use uuid::Uuid;

use super::{deleted, flagged, found};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub async fn list_synergies(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Synergy>>> {
    found(contacts::get(&state.db, contact_id).await?, "contact", contact_id)?;
    Ok(Json(synergies::list(&state.db, contact_id).await?))
}

pub async fn create_synergy(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewSynergy>,
) -> ApiResult<(StatusCode, Json<Synergy>)> {
    let synergy = synergies::create(&state.db, contact_id, &body).await?;
    Ok((StatusCode::CREATED, Json(synergy)))
}

pub async fn update_synergy(
    State(state): State<AppState>,
    Path((contact_id, synergy_id)): Path<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<SynergyPatch>,
) -> ApiResult<Json<Synergy>> {
    let synergy = synergies::update(&state.db, contact_id, synergy_id, &body).await?;
    Ok(Json(found(synergy, "synergy", synergy_id)?))
}

pub async fn set_primary_synergy(
    State(state): State<AppState>,
    Path((contact_id, synergy_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Synergy>>> {
    let changed = synergies::set_primary(&state.db, contact_id, synergy_id).await?;
    flagged(changed, "synergy", synergy_id)?;
    Ok(Json(synergies::list(&state.db, contact_id).await?))
}

pub async fn delete_synergy(
    State(state): State<AppState>,
    Path((contact_id, synergy_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let removed = synergies::delete(&state.db, contact_id, synergy_id).await?;
    deleted(removed, "synergy", synergy_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/contacts/:contact_id/synergies",
            get(list_synergies).post(create_synergy),
        )
        .route(
            "/api/contacts/:contact_id/synergies/:synergy_id",
            patch(update_synergy).delete(delete_synergy),
        )
        .route(
            "/api/contacts/:contact_id/synergies/:synergy_id/default",
            patch(set_primary_synergy),
        )
}

//! Contact email addresses
//!
//! The contact in the URL is the group; exactly one of its emails is
//! primary once it has any.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use crm_common::db::contact_emails::{self, ContactEmailPatch, NewContactEmail};
use crm_common::db::{contacts, ContactEmail};
use uuid::Uuid;

use super::{deleted, flagged, found};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

/// GET /api/contacts/:contact_id/emails (primary first)
pub async fn list_emails(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ContactEmail>>> {
    found(contacts::get(&state.db, contact_id).await?, "contact", contact_id)?;
    Ok(Json(contact_emails::list(&state.db, contact_id).await?))
}

pub async fn create_email(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewContactEmail>,
) -> ApiResult<(StatusCode, Json<ContactEmail>)> {
    let email = contact_emails::create(&state.db, contact_id, &body).await?;
    Ok((StatusCode::CREATED, Json(email)))
}

pub async fn update_email(
    State(state): State<AppState>,
    Path((contact_id, email_id)): Path<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<ContactEmailPatch>,
) -> ApiResult<Json<ContactEmail>> {
    let email = contact_emails::update(&state.db, contact_id, email_id, &body).await?;
    Ok(Json(found(email, "contact email", email_id)?))
}

/// PATCH /api/contacts/:contact_id/emails/:id/default
pub async fn set_primary_email(
    State(state): State<AppState>,
    Path((contact_id, email_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<ContactEmail>>> {
    let changed = contact_emails::set_primary(&state.db, contact_id, email_id).await?;
    flagged(changed, "contact email", email_id)?;
    Ok(Json(contact_emails::list(&state.db, contact_id).await?))
}

pub async fn delete_email(
    State(state): State<AppState>,
    Path((contact_id, email_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let removed = contact_emails::delete(&state.db, contact_id, email_id).await?;
    deleted(removed, "contact email", email_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/contacts/:contact_id/emails",
            get(list_emails).post(create_email),
        )
        .route(
            "/api/contacts/:contact_id/emails/:email_id",
            patch(update_email).delete(delete_email),
        )
        .route(
            "/api/contacts/:contact_id/emails/:email_id/default",
            patch(set_primary_email),
        )
}

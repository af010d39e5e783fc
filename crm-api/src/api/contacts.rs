//! Contact CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use crm_common::db::contacts::{self, ContactPatch, NewContact};
use crm_common::db::Contact;
use uuid::Uuid;

use super::{deleted, found};
use crate::error::{ApiJson, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

/// GET /api/contacts?page=N&perPage=M
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Contact>>> {
    let total = contacts::count(&state.db).await?;
    let pagination = query.window(total);
    let items = contacts::list(&state.db, pagination.per_page, pagination.offset).await?;
    Ok(Json(Page::new(items, pagination, total)))
}

/// POST /api/contacts
///
/// An optional `email` field becomes the contact's primary email.
pub async fn create_contact(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let contact = contacts::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Contact>> {
    let contact = contacts::get(&state.db, contact_id).await?;
    Ok(Json(found(contact, "contact", contact_id)?))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    ApiJson(body): ApiJson<ContactPatch>,
) -> ApiResult<Json<Contact>> {
    let contact = contacts::update(&state.db, contact_id, &body).await?;
    Ok(Json(found(contact, "contact", contact_id)?))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    deleted(contacts::delete(&state.db, contact_id).await?, "contact", contact_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/contacts/:contact_id",
            get(get_contact).patch(update_contact).delete(delete_contact),
        )
}

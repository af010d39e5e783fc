//! Email accounts of the logged-in user
//!
//! The group is always the authenticated user, never a URL parameter.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Extension, Json, Router,
};
use crm_common::db::email_accounts::{self, EmailAccountPatch, NewEmailAccount};
use crm_common::db::EmailAccount;
use uuid::Uuid;

use super::auth::CurrentUser;
use super::{deleted, flagged, found};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<EmailAccount>>> {
    Ok(Json(email_accounts::list(&state.db, current.user.id).await?))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(body): ApiJson<NewEmailAccount>,
) -> ApiResult<(StatusCode, Json<EmailAccount>)> {
    let account = email_accounts::create(&state.db, current.user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<EmailAccount>> {
    let account = email_accounts::get_owned(&state.db, current.user.id, account_id).await?;
    Ok(Json(found(account, "email account", account_id)?))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
    ApiJson(body): ApiJson<EmailAccountPatch>,
) -> ApiResult<Json<EmailAccount>> {
    let account = email_accounts::update(&state.db, current.user.id, account_id, &body).await?;
    Ok(Json(found(account, "email account", account_id)?))
}

/// PATCH /api/me/email-accounts/:account_id/default
pub async fn set_default_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<EmailAccount>>> {
    let changed = email_accounts::set_default(&state.db, current.user.id, account_id).await?;
    flagged(changed, "email account", account_id)?;
    Ok(Json(email_accounts::list(&state.db, current.user.id).await?))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = email_accounts::delete(&state.db, current.user.id, account_id).await?;
    deleted(removed, "email account", account_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/me/email-accounts", get(list_accounts).post(create_account))
        .route(
            "/api/me/email-accounts/:account_id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route(
            "/api/me/email-accounts/:account_id/default",
            patch(set_default_account),
        )
}

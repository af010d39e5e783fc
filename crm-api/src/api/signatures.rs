//! Signatures of the logged-in user's email accounts

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Extension, Json, Router,
};
use crm_common::db::signatures::{self, NewSignature, SignaturePatch};
use crm_common::db::{email_accounts, Signature};
use uuid::Uuid;

use super::auth::CurrentUser;
use super::{deleted, flagged, found};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

/// 404 unless the account exists and belongs to the caller
async fn owned_account(state: &AppState, current: &CurrentUser, account_id: Uuid) -> ApiResult<()> {
    let account = email_accounts::get_owned(&state.db, current.user.id, account_id).await?;
    found(account, "email account", account_id).map(|_| ())
}

pub async fn list_signatures(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Signature>>> {
    owned_account(&state, &current, account_id).await?;
    Ok(Json(signatures::list(&state.db, account_id).await?))
}

pub async fn create_signature(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(account_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewSignature>,
) -> ApiResult<(StatusCode, Json<Signature>)> {
    owned_account(&state, &current, account_id).await?;
    let signature = signatures::create(&state.db, account_id, &body).await?;
    Ok((StatusCode::CREATED, Json(signature)))
}

pub async fn update_signature(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((account_id, signature_id)): Path<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<SignaturePatch>,
) -> ApiResult<Json<Signature>> {
    owned_account(&state, &current, account_id).await?;
    let signature = signatures::update(&state.db, account_id, signature_id, &body).await?;
    Ok(Json(found(signature, "signature", signature_id)?))
}

pub async fn set_default_signature(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((account_id, signature_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Signature>>> {
    owned_account(&state, &current, account_id).await?;
    let changed = signatures::set_default(&state.db, account_id, signature_id).await?;
    flagged(changed, "signature", signature_id)?;
    Ok(Json(signatures::list(&state.db, account_id).await?))
}

pub async fn delete_signature(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((account_id, signature_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    owned_account(&state, &current, account_id).await?;
    let removed = signatures::delete(&state.db, account_id, signature_id).await?;
    deleted(removed, "signature", signature_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/me/email-accounts/:account_id/signatures",
            get(list_signatures).post(create_signature),
        )
        .route(
            "/api/me/email-accounts/:account_id/signatures/:signature_id",
            patch(update_signature).delete(delete_signature),
        )
        .route(
            "/api/me/email-accounts/:account_id/signatures/:signature_id/default",
            patch(set_default_signature),
        )
}

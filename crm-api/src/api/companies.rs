//! Company CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use crm_common::db::companies::{self, CompanyPatch, NewCompany};
use crm_common::db::Company;
use uuid::Uuid;

use super::{deleted, found};
use crate::error::{ApiJson, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Company>>> {
    let total = companies::count(&state.db).await?;
    let pagination = query.window(total);
    let items = companies::list(&state.db, pagination.per_page, pagination.offset).await?;
    Ok(Json(Page::new(items, pagination, total)))
}

pub async fn create_company(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCompany>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    let company = companies::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Company>> {
    let company = companies::get(&state.db, company_id).await?;
    Ok(Json(found(company, "company", company_id)?))
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    ApiJson(body): ApiJson<CompanyPatch>,
) -> ApiResult<Json<Company>> {
    let company = companies::update(&state.db, company_id, &body).await?;
    Ok(Json(found(company, "company", company_id)?))
}

/// DELETE /api/companies/:id
///
/// Areas of activity and synergies pointing at the company go with it.
pub async fn delete_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    deleted(companies::delete(&state.db, company_id).await?, "company", company_id)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/companies", get(list_companies).post(create_company))
        .route(
            "/api/companies/:company_id",
            get(get_company).patch(update_company).delete(delete_company),
        )
}

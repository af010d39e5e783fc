//! HTTP API handlers for crm-api

pub mod areas_of_activity;
pub mod auth;
pub mod companies;
pub mod contact_emails;
pub mod contacts;
pub mod deals;
pub mod email_accounts;
pub mod health;
pub mod signatures;
pub mod synergies;

use axum::http::StatusCode;

use crate::error::{ApiError, ApiResult};

/// Turn a repository `Option` into a 404
pub(crate) fn found<T>(value: Option<T>, what: &str, id: uuid::Uuid) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::NotFound(format!("{} {}", what, id)))
}

/// 204 for a delete that hit a row, 404 otherwise
pub(crate) fn deleted(removed: bool, what: &str, id: uuid::Uuid) -> ApiResult<StatusCode> {
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("{} {}", what, id)))
    }
}

/// Ok when a set-primary call hit a row, 404 otherwise
pub(crate) fn flagged(changed: bool, what: &str, id: uuid::Uuid) -> ApiResult<()> {
    if changed {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("{} {}", what, id)))
    }
}

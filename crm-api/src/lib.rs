//! crm-api library - HTTP service for the CRM
//!
//! Contacts, companies, deals and the per-user mail setup are exposed as a
//! JSON API. Everything except `/health` and login needs a bearer session.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Lifetime of newly issued session tokens
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(db: SqlitePool, session_ttl: chrono::Duration) -> Self {
        Self { db, session_ttl }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    // Protected routes (require a session)
    let protected = Router::new()
        .merge(api::auth::session_routes())
        .merge(api::contacts::routes())
        .merge(api::companies::routes())
        .merge(api::deals::routes())
        .merge(api::contact_emails::routes())
        .merge(api::areas_of_activity::routes())
        .merge(api::synergies::routes())
        .merge(api::email_accounts::routes())
        .merge(api::signatures::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    // Public routes
    let public = Router::new()
        .merge(api::health::health_routes())
        .merge(api::auth::login_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

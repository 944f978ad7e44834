//! Loomline API Library
//!
//! Backend for a textile B2B marketplace: order negotiation, production
//! plan approval, staged manufacturing tracking and revision requests.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{extract::State, middleware, response::Json, routing::get, routing::post, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub redis: Option<Arc<redis::Client>>,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Authenticated API routes mounted under `/api/v1`.
pub fn api_v1_routes(auth_service: Arc<auth::AuthService>) -> Router<AppState> {
    Router::new()
        // Orders
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route("/orders/:id/ship", post(handlers::orders::ship_order))
        .route("/orders/:id/deliver", post(handlers::orders::deliver_order))
        // Negotiations
        .route(
            "/orders/:id/negotiations",
            get(handlers::negotiations::list_negotiations)
                .post(handlers::negotiations::send_offer),
        )
        .route(
            "/negotiations/:id/accept",
            post(handlers::negotiations::accept_offer),
        )
        .route(
            "/negotiations/:id/reject",
            post(handlers::negotiations::reject_offer),
        )
        // Production
        .route("/production", post(handlers::production::create_tracking))
        .route("/production/:id", get(handlers::production::get_tracking))
        .route("/production/:id/plan", post(handlers::production::send_plan))
        .route(
            "/production/:id/plan/decision",
            post(handlers::production::decide_plan),
        )
        .route(
            "/production/:id/stages",
            get(handlers::production::list_stage_updates)
                .post(handlers::production::update_stage),
        )
        // Revisions
        .route("/revisions", post(handlers::revisions::create_revision))
        .route("/revisions/:id", get(handlers::revisions::get_revision))
        .route(
            "/revisions/:id/submit",
            post(handlers::revisions::submit_revision),
        )
        .route(
            "/revisions/:id/decision",
            post(handlers::revisions::decide_revision),
        )
        .route(
            "/revisions/:id/implement",
            post(handlers::revisions::implement_revision),
        )
        .route(
            "/revisions/:id/timeline",
            get(handlers::revisions::list_timeline),
        )
        .layer(middleware::from_fn_with_state(
            auth_service,
            auth::auth_middleware,
        ))
}

/// Unauthenticated status and health endpoints plus the versioned API.
pub fn app_router(state: AppState, auth_service: Arc<auth::AuthService>) -> Router {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes(auth_service))
        .merge(openapi::swagger_router())
        .with_state(state)
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "service": "loomline-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state.db.ping().await.is_ok();
    Json(json!({
        "status": if db_ok { "healthy" } else { "degraded" },
        "database": db_ok,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_wraps_data() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}

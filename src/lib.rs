/*!
 * # Storefront API
 *
 * E-commerce backend: accounts, catalog, cart, orders, ratings and
 * discount codes behind a token-authenticated HTTP API.
 */

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::AppServices;
use crate::storage::ImageStore;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(db.clone()));
        let images = ImageStore::new(config.uploads_dir.clone());
        let services = AppServices::new(db.clone(), images);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

/// The full API surface. The caller mounts this under its prefix and
/// adds middleware layers.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth::routes())
        .nest("/users", handlers::users::routes())
        .nest("/categories", handlers::categories::routes())
        .nest("/products", handlers::products::routes())
        .nest("/cart", handlers::cart::routes())
        .nest("/orders", handlers::orders::routes())
        .nest("/order-items", handlers::order_items::routes())
        .nest("/discounts", handlers::discounts::routes())
        .nest("/ratings", handlers::ratings::routes())
        .nest("/admin/ratings", handlers::ratings::admin_routes())
        .route("/health", get(health_check))
}

/// Liveness plus a database ping.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}

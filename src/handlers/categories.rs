use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

/// Every category with its product count.
async fn list_categories(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let category = state
        .services
        .catalog
        .create_category(payload.category_name)
        .await?;
    Ok(created_response(category))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(success_response(category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let category = state
        .services
        .catalog
        .update_category(id, payload.category_name)
        .await?;
    Ok(success_response(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(message_response("Category deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 255, message = "The category name field is required."))]
    pub category_name: String,
}

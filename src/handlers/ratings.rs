use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::AppState;

/// Customer-facing rating routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_rating))
        .route("/check", get(check_rating))
}

/// Admin moderation routes, mounted under /admin/ratings.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ratings))
        .route("/{id}", axum::routing::delete(delete_rating))
}

/// Commit a rating. The eligibility chain (owner, delivered, purchased,
/// not yet rated) is enforced in the service.
async fn create_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRatingRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let rating = state
        .services
        .ratings
        .rate(user.id(), payload.order_id, payload.product_id, payload.rating)
        .await?;
    Ok(created_response(rating))
}

/// Read-only probe for the same predicate; always 200 with the outcome
/// in the body.
async fn check_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<CheckRatingParams>,
) -> Result<Response, ServiceError> {
    let check = state
        .services
        .ratings
        .check(user.id(), params.order_id, params.product_id)
        .await?;
    Ok(success_response(check))
}

async fn list_ratings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Response, ServiceError> {
    let ratings = state.services.ratings.list_all().await?;
    Ok(success_response(ratings))
}

async fn delete_rating(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.ratings.delete(id).await?;
    Ok(message_response("Rating deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRatingRequest {
    pub product_id: Uuid,
    pub order_id: i64,
    #[validate(range(min = 1, max = 5, message = "The rating must be between 1 and 5."))]
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct CheckRatingParams {
    pub order_id: i64,
    pub product_id: Uuid,
}

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cart).post(add_to_cart))
        .route(
            "/{id}",
            get(get_cart_item)
                .put(update_cart_item)
                .delete(remove_cart_item),
        )
}

/// The caller's cart, products hydrated.
async fn list_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let items = state.services.cart.list(user.id()).await?;
    Ok(success_response(items))
}

/// Add-or-increment: 201 when a new line is created, 200 when an
/// existing line absorbs the quantity.
async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let outcome = state
        .services
        .cart
        .add(user.id(), payload.product_id, payload.quantity)
        .await?;
    if outcome.created {
        Ok(created_response(outcome.item))
    } else {
        Ok(success_response(outcome.item))
    }
}

async fn get_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let item = state.services.cart.get(user.id(), id).await?;
    Ok(success_response(item))
}

async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let item = state
        .services
        .cart
        .update_quantity(user.id(), id, payload.quantity)
        .await?;
    Ok(success_response(item))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.cart.remove(user.id(), id).await?;
    Ok(message_response("Cart item deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    pub quantity: i32,
}

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::services::orders::UpdateOrderItemInput;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_order_items).post(create_order_item))
        .route(
            "/{id}",
            get(get_order_item)
                .put(update_order_item)
                .delete(delete_order_item),
        )
}

async fn list_order_items(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let items = state.services.orders.list_items().await?;
    Ok(success_response(items))
}

async fn create_order_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let item = state
        .services
        .orders
        .create_item(
            payload.order_id,
            payload.product_id,
            payload.quantity,
            payload.price,
        )
        .await?;
    Ok(created_response(item))
}

async fn get_order_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let item = state.services.orders.get_item(id).await?;
    Ok(success_response(item))
}

async fn update_order_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let item = state
        .services
        .orders
        .update_item(
            id,
            UpdateOrderItemInput {
                order_id: payload.order_id,
                product_id: payload.product_id,
                quantity: payload.quantity,
                price: payload.price,
            },
        )
        .await?;
    Ok(success_response(item))
}

async fn delete_order_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.orders.delete_item(id).await?;
    Ok(message_response("Order item deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderItemRequest {
    pub order_id: i64,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrderItemRequest {
    pub order_id: Option<i64>,
    pub product_id: Option<Uuid>,
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    pub quantity: Option<i32>,
    pub price: Option<Decimal>,
}

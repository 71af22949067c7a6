use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::services::orders::{
    CreateOrderInput, OrderItemDetails, OrderLineInput, UpdateOrderInput,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
}

async fn list_orders(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list().await?;
    Ok(success_response(orders))
}

/// Creates an order with its items in one transaction and returns the
/// hydrated view.
async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .create(CreateOrderInput {
            user_id: payload.user_id,
            items: payload
                .items
                .into_iter()
                .map(|line| OrderLineInput {
                    quantity: line.quantity,
                    details: OrderItemDetails {
                        id: line.details.id,
                        price: line.details.price,
                    },
                })
                .collect(),
            total_amount: payload.total_amount,
            status: payload.status,
            payment_method: payload.payment_method,
            delivery_method: payload.delivery_method,
            delivery_address: payload.delivery_address,
            ordered_at: payload.ordered_at,
        })
        .await?;
    Ok(created_response(order))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get(id).await?;
    Ok(success_response(order))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .update(
            id,
            UpdateOrderInput {
                user_id: payload.user_id,
                total_amount: payload.total_amount,
                status: payload.status,
                payment_method: payload.payment_method,
                delivery_method: payload.delivery_method,
                delivery_address: payload.delivery_address,
                ordered_at: payload.ordered_at,
            },
        )
        .await?;
    Ok(success_response(order))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.orders.delete(id).await?;
    Ok(message_response("Order deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "The items field is required."))]
    pub items: Vec<OrderLineRequest>,
    pub total_amount: Decimal,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
}

// Per-line checks happen in the service, where failures carry the
// positional field keys (`items.0.quantity`) a client addresses.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub quantity: i32,
    pub details: OrderLineDetailsRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLineDetailsRequest {
    pub id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    pub user_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
}

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::services::discounts::{CreateDiscountInput, UpdateDiscountInput};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_discounts).post(create_discount))
        .route(
            "/{id}",
            get(get_discount).put(update_discount).delete(delete_discount),
        )
}

async fn list_discounts(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let discounts = state.services.discounts.list().await?;
    Ok(success_response(discounts))
}

async fn create_discount(
    State(state): State<AppState>,
    Json(payload): Json<CreateDiscountRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let discount = state
        .services
        .discounts
        .create(CreateDiscountInput {
            discount_code: payload.discount_code,
            value: payload.value,
            expiration_date: payload.expiration_date,
            is_active: payload.is_active,
        })
        .await?;
    Ok(created_response(discount))
}

async fn get_discount(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let discount = state.services.discounts.get(id).await?;
    Ok(success_response(discount))
}

async fn update_discount(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDiscountRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let discount = state
        .services
        .discounts
        .update(
            id,
            UpdateDiscountInput {
                discount_code: payload.discount_code,
                value: payload.value,
                expiration_date: payload.expiration_date,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(success_response(discount))
}

async fn delete_discount(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.discounts.delete(id).await?;
    Ok(message_response("Discount deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 1, max = 255, message = "The discount code field is required."))]
    pub discount_code: String,
    pub value: Decimal,
    pub expiration_date: NaiveDate,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDiscountRequest {
    #[validate(length(min = 1, max = 255, message = "The discount code field is required."))]
    pub discount_code: Option<String>,
    pub value: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

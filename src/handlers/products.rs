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
use crate::services::catalog::{CreateProductInput, UpdateProductInput};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/ratings", get(get_product_ratings))
}

/// Flattened product listing with the per-request rating aggregate.
async fn list_products(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let products = state.services.catalog.list_products().await?;
    Ok(success_response(products))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .create_product(CreateProductInput {
            category_id: payload.category_id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            currency: payload.currency,
            stock_quantity: payload.stock_quantity,
            image_filename: payload.image_filename,
            is_available: payload.is_available,
        })
        .await?;
    Ok(created_response(product))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .update_product(
            id,
            UpdateProductInput {
                category_id: payload.category_id,
                name: payload.name,
                description: payload.description,
                price: payload.price,
                currency: payload.currency,
                stock_quantity: payload.stock_quantity,
                image_filename: payload.image_filename,
                is_available: payload.is_available,
            },
        )
        .await?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(message_response("Product deleted successfully"))
}

/// Average (two decimals, zero when unrated) plus per-star breakdown.
async fn get_product_ratings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let ratings = state.services.ratings.product_ratings(id).await?;
    Ok(success_response(ratings))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub category_id: i64,
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub stock_quantity: i32,
    pub image_filename: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    pub category_id: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock_quantity: Option<i32>,
    pub image_filename: Option<String>,
    pub is_available: Option<bool>,
}

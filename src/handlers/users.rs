use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::entities::UserRole;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, message_response, success_response, validate_input};
use crate::services::users::{CreateUserInput, UpdateUserInput};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let users = state.services.users.list().await?;
    Ok(success_response(users))
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let user = state
        .services
        .users
        .create(CreateUserInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
            address: payload.address,
        })
        .await?;
    Ok(created_response(user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.get(id).await?;
    Ok(success_response(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let user = state.services.users.update(id, payload.into_input()).await?;
    Ok(success_response(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.users.delete(id).await?;
    Ok(message_response("User deleted successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: Option<String>,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image_filename: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_input(self) -> UpdateUserInput {
        UpdateUserInput {
            name: self.name,
            email: self.email,
            password: self.password,
            role: self.role,
            phone: self.phone,
            address: self.address,
            image_filename: self.image_filename,
        }
    }
}

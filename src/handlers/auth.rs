use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::UserModel;
use crate::errors::ServiceError;
use crate::handlers::common::{message_response, success_response, validate_input};
use crate::handlers::users::UpdateUserRequest;
use crate::AppState;

/// Login/logout and current-account routes, mounted at the API root.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(admin_login))
        .route("/user/login", post(user_login))
        .route("/logout", post(logout))
        .route("/user", get(current_user).put(update_current_user).post(update_current_user))
}

/// Admin login: same credential predicate as the user login, then a
/// role gate. A valid customer credential here is a 403, not a 401.
async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let account = state
        .auth
        .authenticate(&payload.email, &payload.password)
        .await?;

    if !account.role.is_admin() {
        return Err(ServiceError::forbidden_field(
            "Unauthorized. Admin access required.",
            "email",
            "This account does not have admin privileges.",
        ));
    }

    let token = state.auth.issue_token(account.id, "admin-auth-token").await?;
    Ok(success_response(LoginResponse {
        token,
        token_type: "Bearer",
        user: account,
    }))
}

/// Customer login; admin accounts are redirected to their own endpoint.
async fn user_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let account = state
        .auth
        .authenticate(&payload.email, &payload.password)
        .await?;

    if account.role.is_admin() {
        return Err(ServiceError::forbidden_field(
            "Unauthorized. Please use admin login endpoint.",
            "email",
            "Admin accounts must use the admin login endpoint.",
        ));
    }

    let token = state.auth.issue_token(account.id, "user-auth-token").await?;
    Ok(success_response(LoginResponse {
        token,
        token_type: "Bearer",
        user: account,
    }))
}

/// Revokes exactly the token that authenticated this request.
async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<Response, ServiceError> {
    state.auth.revoke_token(user.token_id).await?;
    Ok(message_response("Logged out successfully"))
}

async fn current_user(user: AuthUser) -> Result<Response, ServiceError> {
    Ok(success_response(CurrentUserResponse { user: user.user }))
}

/// Self-service profile update, scoped to the caller's own account.
async fn update_current_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let updated = state
        .services
        .users
        .update(user.id(), payload.into_input())
        .await?;
    Ok(success_response(updated))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "tokenType")]
    token_type: &'static str,
    user: UserModel,
}

#[derive(Debug, Serialize)]
struct CurrentUserResponse {
    user: UserModel,
}

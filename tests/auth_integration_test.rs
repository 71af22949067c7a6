mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use storefront_api::entities::UserRole;

use common::{json_body, TestApp};

/// Registration never grants admin, whatever the payload claims.
#[tokio::test]
async fn registration_forces_customer_role() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(json!({
                "name": "Sneaky",
                "email": "sneaky@example.com",
                "password": "password123",
                "role": "admin",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    assert_eq!(body["role"], "customer");
    assert_eq!(body["email"], "sneaky@example.com");
    assert!(body.get("password_hash").is_none());
}

/// A second registration with the same email is a field-addressed 422.
#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new().await;
    app.seed_user("taken@example.com", UserRole::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(json!({
                "name": "Late",
                "email": "taken@example.com",
                "password": "password123",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["message"], "The given data was invalid.");
    assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
}

/// Login returns a bearer token that resolves on subsequent requests.
#[tokio::test]
async fn user_login_issues_a_working_token() {
    let app = TestApp::new().await;
    app.seed_user("login@example.com", UserRole::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "login@example.com", "password": "password123" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["user"]["email"], "login@example.com");
    let token = body["token"].as_str().expect("token string").to_string();
    assert_eq!(token.len(), 48);

    let response = app.request(Method::GET, "/api/user", None, Some(&token)).await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["user"]["email"], "login@example.com");
}

/// Unknown email and wrong password fail identically.
#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    app.seed_user("present@example.com", UserRole::Customer).await;

    let wrong_password = app
        .request(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "present@example.com", "password": "wrong-password" })),
            None,
        )
        .await;
    let wrong_password = json_body(wrong_password, StatusCode::UNAUTHORIZED).await;

    let unknown_email = app
        .request(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "absent@example.com", "password": "password123" })),
            None,
        )
        .await;
    let unknown_email = json_body(unknown_email, StatusCode::UNAUTHORIZED).await;

    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password["message"], "Invalid email or password");
    assert_eq!(
        wrong_password["errors"]["email"][0],
        "These credentials do not match our records."
    );
}

/// The two logins are role-partitioned: valid credentials on the wrong
/// endpoint are a 403, not a 401.
#[tokio::test]
async fn logins_are_role_partitioned() {
    let app = TestApp::new().await;
    app.seed_user("customer@example.com", UserRole::Customer).await;
    app.seed_user("admin@example.com", UserRole::Admin).await;

    let response = app
        .request(
            Method::POST,
            "/api/admin/login",
            Some(json!({ "email": "customer@example.com", "password": "password123" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["message"], "Unauthorized. Admin access required.");
    assert_eq!(
        body["errors"]["email"][0],
        "This account does not have admin privileges."
    );

    let response = app
        .request(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "admin@example.com", "password": "password123" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["message"], "Unauthorized. Please use admin login endpoint.");

    let response = app
        .request(
            Method::POST,
            "/api/admin/login",
            Some(json!({ "email": "admin@example.com", "password": "password123" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["user"]["role"], "admin");
}

/// Logout revokes exactly the presented token.
#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let user = app.seed_user("leaver@example.com", UserRole::Customer).await;
    let token = app.token_for(user.id).await;
    let other_token = app.token_for(user.id).await;

    let response = app
        .request(Method::POST, "/api/logout", None, Some(&token))
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Logged out successfully");

    let response = app.request(Method::GET, "/api/user", None, Some(&token)).await;
    let body = json_body(response, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["message"], "Unauthenticated.");

    // Other sessions stay live
    let response = app
        .request(Method::GET, "/api/user", None, Some(&other_token))
        .await;
    json_body(response, StatusCode::OK).await;
}

/// PUT /user updates the caller's own profile.
#[tokio::test]
async fn self_service_profile_update() {
    let app = TestApp::new().await;
    let user = app.seed_user("profile@example.com", UserRole::Customer).await;
    let token = app.token_for(user.id).await;

    let response = app
        .request(
            Method::PUT,
            "/api/user",
            Some(json!({ "name": "Renamed", "phone": "0917 000 0000" })),
            Some(&token),
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["phone"], "0917 000 0000");
    assert_eq!(body["email"], "profile@example.com");

    let response = app.request(Method::PUT, "/api/user", Some(json!({})), None).await;
    json_body(response, StatusCode::UNAUTHORIZED).await;
}

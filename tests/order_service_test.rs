mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use storefront_api::entities::{Order, OrderItem, OrderStatus, UserRole};

use common::{json_body, TestApp};

/// Creating an order writes the header and all items, and the response
/// is the hydrated view.
#[tokio::test]
async fn order_create_is_hydrated() {
    let app = TestApp::new().await;
    let user = app.seed_user("orderer@example.com", UserRole::Customer).await;
    let keyboard = app.seed_product("Keyboard", dec!(9.99)).await;
    let mouse = app.seed_product("Mouse", dec!(4.50)).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "user_id": user.id,
                "items": [
                    { "quantity": 2, "details": { "id": keyboard.id, "price": "9.99" } },
                    { "quantity": 1, "details": { "id": mouse.id, "price": "4.50" } },
                ],
                "total_amount": "24.48",
                "payment_method": "cod",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::CREATED).await;

    assert_eq!(body["status"], "pending");
    assert_eq!(body["total_amount"], "24.48");
    assert!(!body["ordered_at"].is_null());
    assert_eq!(body["user"]["email"], "orderer@example.com");
    let items = body["order_items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["product"]["name"], "Keyboard");
    assert_eq!(items[1]["product"]["name"], "Mouse");
}

/// One bad line fails the whole order; nothing is persisted.
#[tokio::test]
async fn order_create_is_atomic() {
    let app = TestApp::new().await;
    let user = app.seed_user("atomic@example.com", UserRole::Customer).await;
    let product = app.seed_product("Real Product", dec!(3.00)).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "user_id": user.id,
                "items": [
                    { "quantity": 1, "details": { "id": product.id, "price": "3.00" } },
                    { "quantity": 1, "details": { "id": uuid::Uuid::new_v4(), "price": "1.00" } },
                ],
                "total_amount": "4.00",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(
        body["errors"]["items.1.details.id"][0],
        "The selected items.1.details.id is invalid."
    );

    assert_eq!(Order::find().count(&app.state.db).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(&app.state.db).await.unwrap(), 0);

    // Unknown account: same outcome
    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "user_id": uuid::Uuid::new_v4(),
                "items": [
                    { "quantity": 1, "details": { "id": product.id, "price": "3.00" } },
                ],
                "total_amount": "3.00",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["errors"]["user_id"][0], "The selected user id is invalid.");
    assert_eq!(Order::find().count(&app.state.db).await.unwrap(), 0);

    // Empty items array never reaches the database
    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "user_id": user.id,
                "items": [],
                "total_amount": "0.00",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["message"], "The given data was invalid.");
    assert!(body["errors"]["items"].is_array());
}

/// Partial updates only touch supplied fields, and unknown status
/// values are rejected.
#[tokio::test]
async fn order_partial_update() {
    let app = TestApp::new().await;
    let user = app.seed_user("update@example.com", UserRole::Customer).await;
    let order = app
        .seed_order(user.id, OrderStatus::Pending, dec!(10.00))
        .await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/orders/{}", order.id),
            Some(json!({ "status": "shipped" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["total_amount"], "10");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/orders/{}", order.id),
            Some(json!({ "status": "teleported" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["errors"]["status"][0], "The selected status is invalid.");

    let response = app
        .request(Method::PUT, "/api/orders/99999", Some(json!({})), None)
        .await;
    json_body(response, StatusCode::NOT_FOUND).await;
}

/// Deleting an order removes its items, but an order referenced by a
/// rating stays.
#[tokio::test]
async fn order_delete_blocked_by_ratings() {
    let app = TestApp::new().await;
    let user = app.seed_user("deleter@example.com", UserRole::Customer).await;
    let token = app.token_for(user.id).await;
    let product = app.seed_product("Rated Product", dec!(8.00)).await;

    let order = app
        .seed_order(user.id, OrderStatus::Delivered, dec!(8.00))
        .await;
    app.seed_order_item(order.id, product.id, 1, dec!(8.00)).await;
    let response = app
        .request(
            Method::POST,
            "/api/ratings",
            Some(json!({
                "product_id": product.id,
                "order_id": order.id,
                "rating": 5,
            })),
            Some(&token),
        )
        .await;
    json_body(response, StatusCode::CREATED).await;

    let response = app
        .request(Method::DELETE, &format!("/api/orders/{}", order.id), None, None)
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["message"], "Cannot delete an order that has ratings.");
    assert_eq!(Order::find().count(&app.state.db).await.unwrap(), 1);

    // An unrated order deletes cleanly, items included
    let clean = app
        .seed_order(user.id, OrderStatus::Pending, dec!(8.00))
        .await;
    app.seed_order_item(clean.id, product.id, 1, dec!(8.00)).await;
    let response = app
        .request(Method::DELETE, &format!("/api/orders/{}", clean.id), None, None)
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Order deleted successfully");
    assert_eq!(Order::find().count(&app.state.db).await.unwrap(), 1);
    assert_eq!(OrderItem::find().count(&app.state.db).await.unwrap(), 1);
}

/// The standalone order-item surface validates its references and
/// hydrates both sides.
#[tokio::test]
async fn order_items_crud() {
    let app = TestApp::new().await;
    let user = app.seed_user("items@example.com", UserRole::Customer).await;
    let product = app.seed_product("Line Product", dec!(2.50)).await;
    let order = app
        .seed_order(user.id, OrderStatus::Pending, dec!(0.00))
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/order-items",
            Some(json!({
                "order_id": order.id,
                "product_id": product.id,
                "quantity": 3,
                "price": "2.50",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let item_id = body["id"].as_i64().expect("item id");
    assert_eq!(body["product"]["name"], "Line Product");
    assert_eq!(body["order"]["id"], order.id);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/order-items/{item_id}"),
            Some(json!({ "quantity": 5 })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["quantity"], 5);
    assert_eq!(body["price"], "2.5");

    // Bad reference
    let response = app
        .request(
            Method::POST,
            "/api/order-items",
            Some(json!({
                "order_id": 99_999,
                "product_id": product.id,
                "quantity": 1,
                "price": "1.00",
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["errors"]["order_id"][0], "The selected order id is invalid.");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/order-items/{item_id}"),
            None,
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Order item deleted successfully");
    assert_eq!(OrderItem::find().count(&app.state.db).await.unwrap(), 0);
}

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Days, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::entities::{OrderStatus, UserRole};

use common::{json_body, TestApp};

/// Category listing carries a product count; the show route embeds the
/// products themselves.
#[tokio::test]
async fn category_crud_with_counts() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/categories",
            Some(json!({ "category_name": "Beverages" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let category_id = body["id"].as_i64().expect("category id");
    assert_eq!(body["category_name"], "Beverages");

    let response = app
        .request(
            Method::POST,
            "/api/products",
            Some(json!({
                "category_id": category_id,
                "name": "Iced Tea",
                "price": "2.50",
                "stock_quantity": 10,
            })),
            None,
        )
        .await;
    json_body(response, StatusCode::CREATED).await;

    let response = app.request(Method::GET, "/api/categories", None, None).await;
    let body = json_body(response, StatusCode::OK).await;
    let listed = body
        .as_array()
        .expect("category array")
        .iter()
        .find(|c| c["id"] == category_id)
        .expect("created category listed");
    assert_eq!(listed["products_count"], 1);

    let response = app
        .request(
            Method::GET,
            &format!("/api/categories/{category_id}"),
            None,
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["products"][0]["name"], "Iced Tea");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/categories/{category_id}"),
            Some(json!({ "category_name": "Drinks" })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["category_name"], "Drinks");
}

/// Deleting a category leaves its products uncategorized rather than
/// deleting them.
#[tokio::test]
async fn category_delete_orphans_products() {
    let app = TestApp::new().await;
    let product = app.seed_product("Orphan", dec!(1.00)).await;
    let category_id = product.category_id.expect("seeded with category");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/categories/{category_id}"),
            None,
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Category deleted successfully");

    let response = app.request(Method::GET, "/api/products", None, None).await;
    let body = json_body(response, StatusCode::OK).await;
    let listed = &body.as_array().expect("product array")[0];
    assert_eq!(listed["category"], "Uncategorized");
}

/// The listing aggregates ratings per product at one decimal and
/// defaults the currency.
#[tokio::test]
async fn product_listing_aggregates_ratings() {
    let app = TestApp::new().await;
    let product = app.seed_product("Rated", dec!(15.00)).await;
    let rater_a = app.seed_user("a@example.com", UserRole::Customer).await;
    let rater_b = app.seed_user("b@example.com", UserRole::Customer).await;

    for (rater, score) in [(&rater_a, 5), (&rater_b, 4)] {
        let token = app.token_for(rater.id).await;
        let order = app
            .seed_order(rater.id, OrderStatus::Delivered, dec!(15.00))
            .await;
        app.seed_order_item(order.id, product.id, 1, dec!(15.00)).await;
        let response = app
            .request(
                Method::POST,
                "/api/ratings",
                Some(json!({
                    "product_id": product.id,
                    "order_id": order.id,
                    "rating": score,
                })),
                Some(&token),
            )
            .await;
        json_body(response, StatusCode::CREATED).await;
    }

    let response = app.request(Method::GET, "/api/products", None, None).await;
    let body = json_body(response, StatusCode::OK).await;
    let listed = &body.as_array().expect("product array")[0];
    assert_eq!(listed["rating"], "4.5");
    assert_eq!(listed["review_count"], 2);
    assert_eq!(listed["currency"], "₱");
    assert_eq!(listed["category"], "Rated category");
}

/// Product writes validate their category and reject negative numbers.
#[tokio::test]
async fn product_validation() {
    let app = TestApp::new().await;
    let category = app.seed_category("Gear").await;

    let response = app
        .request(
            Method::POST,
            "/api/products",
            Some(json!({
                "category_id": 99_999,
                "name": "Nowhere",
                "price": "1.00",
                "stock_quantity": 1,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(
        body["errors"]["category_id"][0],
        "The selected category id is invalid."
    );

    let response = app
        .request(
            Method::POST,
            "/api/products",
            Some(json!({
                "category_id": category.id,
                "name": "Backwards",
                "price": "-1.00",
                "stock_quantity": 1,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["errors"]["price"][0], "The price must be at least 0.");

    let response = app
        .request(
            Method::POST,
            "/api/products",
            Some(json!({
                "category_id": category.id,
                "name": "Hollow",
                "price": "1.00",
                "stock_quantity": -5,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(
        body["errors"]["stock_quantity"][0],
        "The stock quantity must be at least 0."
    );
}

/// Discount codes are unique, percentage-bounded, and never expire into
/// the past.
#[tokio::test]
async fn discount_crud_and_validation() {
    let app = TestApp::new().await;
    let next_week = (Utc::now().date_naive() + Days::new(7)).to_string();

    let response = app
        .request(
            Method::POST,
            "/api/discounts",
            Some(json!({
                "discount_code": "WELCOME10",
                "value": "10",
                "expiration_date": next_week,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let discount_id = body["id"].as_i64().expect("discount id");
    assert_eq!(body["is_active"], true);

    let response = app
        .request(
            Method::POST,
            "/api/discounts",
            Some(json!({
                "discount_code": "WELCOME10",
                "value": "20",
                "expiration_date": next_week,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(
        body["errors"]["discount_code"][0],
        "The discount code has already been taken."
    );

    let response = app
        .request(
            Method::POST,
            "/api/discounts",
            Some(json!({
                "discount_code": "TOOBIG",
                "value": "150",
                "expiration_date": next_week,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["errors"]["value"][0], "The value must be between 0 and 100.");

    let last_week = (Utc::now().date_naive() - Days::new(7)).to_string();
    let response = app
        .request(
            Method::POST,
            "/api/discounts",
            Some(json!({
                "discount_code": "STALE",
                "value": "5",
                "expiration_date": last_week,
            })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(
        body["errors"]["expiration_date"][0],
        "The expiration date must be a date after or equal to today."
    );

    let response = app
        .request(
            Method::PUT,
            &format!("/api/discounts/{discount_id}"),
            Some(json!({ "is_active": false })),
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["is_active"], false);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/discounts/{discount_id}"),
            None,
            None,
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Discount deleted successfully");
}

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::hash_password,
    config::AppConfig,
    db,
    entities::{
        category, order, order_item, product, user, CategoryModel, OrderItemModel, OrderModel,
        OrderStatus, ProductModel, UserModel, UserRole,
    },
    AppState,
};

/// Test harness: the full router over a throwaway sqlite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _tmp: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir for test db");
        let db_path = tmp.path().join("storefront_test.db");
        let uploads_dir = tmp.path().join("uploads");

        let cfg = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            auto_migrate: true,
            debug: false,
            uploads_dir: uploads_dir.display().to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
        };

        let pool = db::connect(&cfg).await.expect("connect to test database");
        db::run_migrations(&pool)
            .await
            .expect("run migrations for tests");

        let state = AppState::new(pool, cfg);
        let router = Router::new()
            .nest("/api", storefront_api::api_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _tmp: tmp,
        }
    }

    /// Send a request with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };
        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // --- seed helpers (direct entity writes) ---

    pub async fn seed_user(&self, email: &str, role: UserRole) -> UserModel {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test User".to_string()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password("password123").expect("hash test password")),
            role: Set(role),
            phone: Set(None),
            address: Set(None),
            image_filename: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.state.db)
        .await
        .expect("seed user")
    }

    /// A fresh bearer token for the account.
    pub async fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, "test-token")
            .await
            .expect("issue test token")
    }

    pub async fn seed_category(&self, name: &str) -> CategoryModel {
        let now = Utc::now();
        category::ActiveModel {
            category_name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> ProductModel {
        let category = self.seed_category(&format!("{name} category")).await;
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(Some(category.id)),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            currency: Set("₱".to_string()),
            stock_quantity: Set(100),
            image_filename: Set(None),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_order(
        &self,
        user_id: Uuid,
        status: OrderStatus,
        total: Decimal,
    ) -> OrderModel {
        let now = Utc::now();
        order::ActiveModel {
            user_id: Set(user_id),
            total_amount: Set(total),
            discount_code: Set(None),
            discount_value: Set(None),
            status: Set(status),
            payment_method: Set(None),
            delivery_method: Set(None),
            delivery_address: Set(None),
            ordered_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("seed order")
    }

    pub async fn seed_order_item(
        &self,
        order_id: i64,
        product_id: Uuid,
        quantity: i32,
        price: Decimal,
    ) -> OrderItemModel {
        let now = Utc::now();
        order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("seed order item")
    }
}

/// Read the response body as JSON, asserting the expected status first.
pub async fn json_body(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    assert_eq!(
        status,
        expected,
        "unexpected status; body: {}",
        String::from_utf8_lossy(&bytes)
    );
    serde_json::from_slice(&bytes).expect("response body is json")
}

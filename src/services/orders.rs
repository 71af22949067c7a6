use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    order, order_item, rating, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus, Product,
    ProductModel, Rating, User, UserModel,
};
use crate::errors::ServiceError;

/// Order service. Creation writes the order and all of its items in a
/// single transaction: either the whole order lands or nothing does.
#[derive(Clone)]
pub struct OrderService {
    db: DbPool,
}

#[derive(Clone, Debug)]
pub struct OrderItemDetails {
    pub id: Uuid,
    pub price: Decimal,
}

#[derive(Clone, Debug)]
pub struct OrderLineInput {
    pub quantity: i32,
    pub details: OrderItemDetails,
}

#[derive(Clone, Debug)]
pub struct CreateOrderInput {
    pub user_id: Uuid,
    pub items: Vec<OrderLineInput>,
    pub total_amount: Decimal,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOrderInput {
    pub user_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOrderItemInput {
    pub order_id: Option<i64>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub price: Option<Decimal>,
}

/// Hydrated order: the row plus its account and its lines with their
/// products resolved.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderModel,
    pub user: Option<UserModel>,
    pub order_items: Vec<OrderItemWithProduct>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemWithProduct {
    #[serde(flatten)]
    pub item: OrderItemModel,
    pub product: Option<ProductModel>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItemModel,
    pub order: Option<OrderModel>,
    pub product: Option<ProductModel>,
}

impl OrderService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .order_by_asc(order::Column::Id)
            .all(&self.db)
            .await?;
        self.hydrate_many(orders).await
    }

    /// Creates the order with its items atomically.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, lines = input.items.len()))]
    pub async fn create(&self, input: CreateOrderInput) -> Result<OrderView, ServiceError> {
        let status = parse_status(input.status.as_deref())?.unwrap_or(OrderStatus::Pending);
        ensure_non_negative_amount("total_amount", input.total_amount)?;
        for (index, line) in input.items.iter().enumerate() {
            if line.quantity < 1 {
                return Err(ServiceError::validation(
                    format!("items.{index}.quantity"),
                    format!("The items.{index}.quantity must be at least 1."),
                ));
            }
            ensure_non_negative_amount(
                &format!("items.{index}.details.price"),
                line.details.price,
            )?;
        }

        let txn = self.db.begin().await?;

        if User::find_by_id(input.user_id).one(&txn).await?.is_none() {
            return Err(ServiceError::validation(
                "user_id",
                "The selected user id is invalid.",
            ));
        }
        for (index, line) in input.items.iter().enumerate() {
            if Product::find_by_id(line.details.id).one(&txn).await?.is_none() {
                return Err(ServiceError::validation(
                    format!("items.{index}.details.id"),
                    format!("The selected items.{index}.details.id is invalid."),
                ));
            }
        }

        let now = Utc::now();
        let model = order::ActiveModel {
            user_id: Set(input.user_id),
            total_amount: Set(input.total_amount),
            discount_code: Set(None),
            discount_value: Set(None),
            status: Set(status),
            payment_method: Set(input.payment_method),
            delivery_method: Set(input.delivery_method),
            delivery_address: Set(input.delivery_address),
            ordered_at: Set(Some(input.ordered_at.unwrap_or(now))),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&txn).await?;

        for line in &input.items {
            let item = order_item::ActiveModel {
                order_id: Set(created.id),
                product_id: Set(line.details.id),
                quantity: Set(line.quantity),
                price: Set(line.details.price),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;
        info!(order_id = created.id, "created order");
        self.get(created.id).await
    }

    pub async fn get(&self, id: i64) -> Result<OrderView, ServiceError> {
        let found = self.find(id).await?;
        let mut views = self.hydrate_many(vec![found]).await?;
        Ok(views.remove(0))
    }

    /// Partial update of order fields. Items are managed through the
    /// order-item operations, not here.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: UpdateOrderInput) -> Result<OrderView, ServiceError> {
        let found = self.find(id).await?;

        let status = parse_status(input.status.as_deref())?;
        if let Some(user_id) = input.user_id {
            if User::find_by_id(user_id).one(&self.db).await?.is_none() {
                return Err(ServiceError::validation(
                    "user_id",
                    "The selected user id is invalid.",
                ));
            }
        }
        if let Some(total) = input.total_amount {
            ensure_non_negative_amount("total_amount", total)?;
        }

        let mut active: order::ActiveModel = found.into();
        if let Some(user_id) = input.user_id {
            active.user_id = Set(user_id);
        }
        if let Some(total) = input.total_amount {
            active.total_amount = Set(total);
        }
        if let Some(status) = status {
            active.status = Set(status);
        }
        if let Some(payment_method) = input.payment_method {
            active.payment_method = Set(Some(payment_method));
        }
        if let Some(delivery_method) = input.delivery_method {
            active.delivery_method = Set(Some(delivery_method));
        }
        if let Some(delivery_address) = input.delivery_address {
            active.delivery_address = Set(Some(delivery_address));
        }
        if let Some(ordered_at) = input.ordered_at {
            active.ordered_at = Set(Some(ordered_at));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        info!(order_id = updated.id, "updated order");
        self.get(updated.id).await
    }

    /// Deletes an order and its items. Blocked while ratings still
    /// reference the order, since each rating records which purchase it
    /// came from.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let found = Order::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let rating_count = Rating::find()
            .filter(rating::Column::OrderId.eq(id))
            .count(&txn)
            .await?;
        if rating_count > 0 {
            return Err(ServiceError::conflict(
                "Cannot delete an order that has ratings.",
                "order_id",
                "Delete the order's ratings first.",
            ));
        }

        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        Order::delete_by_id(found.id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = id, "deleted order");
        Ok(())
    }

    // --- standalone order-item operations ---

    pub async fn list_items(&self) -> Result<Vec<OrderItemView>, ServiceError> {
        let items = OrderItem::find()
            .order_by_asc(order_item::Column::Id)
            .all(&self.db)
            .await?;
        self.hydrate_items(items).await
    }

    #[instrument(skip(self))]
    pub async fn create_item(
        &self,
        order_id: i64,
        product_id: Uuid,
        quantity: i32,
        price: Decimal,
    ) -> Result<OrderItemView, ServiceError> {
        self.ensure_order_exists(order_id).await?;
        self.ensure_product_exists(product_id).await?;
        ensure_non_negative_amount("price", price)?;

        let now = Utc::now();
        let model = order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let item = model.insert(&self.db).await?;
        info!(order_item_id = item.id, order_id, "created order item");
        self.get_item(item.id).await
    }

    pub async fn get_item(&self, id: i64) -> Result<OrderItemView, ServiceError> {
        let item = OrderItem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order item not found".to_string()))?;
        let mut views = self.hydrate_items(vec![item]).await?;
        Ok(views.remove(0))
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: i64,
        input: UpdateOrderItemInput,
    ) -> Result<OrderItemView, ServiceError> {
        let item = OrderItem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order item not found".to_string()))?;

        if let Some(order_id) = input.order_id {
            self.ensure_order_exists(order_id).await?;
        }
        if let Some(product_id) = input.product_id {
            self.ensure_product_exists(product_id).await?;
        }
        if let Some(price) = input.price {
            ensure_non_negative_amount("price", price)?;
        }

        let mut active: order_item::ActiveModel = item.into();
        if let Some(order_id) = input.order_id {
            active.order_id = Set(order_id);
        }
        if let Some(product_id) = input.product_id {
            active.product_id = Set(product_id);
        }
        if let Some(quantity) = input.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Utc::now());
        let item = active.update(&self.db).await?;

        info!(order_item_id = item.id, "updated order item");
        self.get_item(item.id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: i64) -> Result<(), ServiceError> {
        let item = OrderItem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order item not found".to_string()))?;
        OrderItem::delete_by_id(item.id).exec(&self.db).await?;
        info!(order_item_id = id, "deleted order item");
        Ok(())
    }

    // --- helpers ---

    async fn find(&self, id: i64) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    async fn hydrate_many(&self, orders: Vec<OrderModel>) -> Result<Vec<OrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
        let users: HashMap<Uuid, UserModel> = User::find()
            .filter(crate::entities::user::Column::Id.is_in(user_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<i64, Vec<OrderItemWithProduct>> = HashMap::new();
        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .find_also_related(Product)
            .order_by_asc(order_item::Column::Id)
            .all(&self.db)
            .await?;
        for (item, product) in lines {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItemWithProduct { item, product });
        }

        Ok(orders
            .into_iter()
            .map(|o| OrderView {
                user: users.get(&o.user_id).cloned(),
                order_items: items_by_order.remove(&o.id).unwrap_or_default(),
                order: o,
            })
            .collect())
    }

    async fn hydrate_items(
        &self,
        items: Vec<OrderItemModel>,
    ) -> Result<Vec<OrderItemView>, ServiceError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = items.iter().map(|i| i.order_id).collect();
        let orders: HashMap<i64, OrderModel> = Order::find()
            .filter(order::Column::Id.is_in(order_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, ProductModel> = Product::find()
            .filter(crate::entities::product::Column::Id.is_in(product_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(items
            .into_iter()
            .map(|item| OrderItemView {
                order: orders.get(&item.order_id).cloned(),
                product: products.get(&item.product_id).cloned(),
                item,
            })
            .collect())
    }

    async fn ensure_order_exists(&self, order_id: i64) -> Result<(), ServiceError> {
        if Order::find_by_id(order_id).one(&self.db).await?.is_none() {
            return Err(ServiceError::validation(
                "order_id",
                "The selected order id is invalid.",
            ));
        }
        Ok(())
    }

    async fn ensure_product_exists(&self, product_id: Uuid) -> Result<(), ServiceError> {
        if Product::find_by_id(product_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::validation(
                "product_id",
                "The selected product id is invalid.",
            ));
        }
        Ok(())
    }
}

fn parse_status(value: Option<&str>) -> Result<Option<OrderStatus>, ServiceError> {
    match value {
        None => Ok(None),
        Some(raw) => OrderStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| ServiceError::validation("status", "The selected status is invalid.")),
    }
}

fn ensure_non_negative_amount(field: &str, amount: Decimal) -> Result<(), ServiceError> {
    if amount < Decimal::ZERO {
        return Err(ServiceError::validation(
            field,
            format!("The {} must be at least 0.", field.replace('_', " ")),
        ));
    }
    Ok(())
}

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    cart_item, CartItem, CartItemModel, Product, ProductModel,
};
use crate::errors::{is_unique_violation, ServiceError};

/// Shopping cart service. Carts are implicit: the cart is just the set
/// of cart items owned by an account.
#[derive(Clone)]
pub struct CartService {
    db: DbPool,
}

#[derive(Debug, Serialize)]
pub struct CartItemWithProduct {
    #[serde(flatten)]
    pub item: CartItemModel,
    pub product: Option<ProductModel>,
}

/// Result of an add-to-cart call; `created` drives the 200-vs-201
/// response split.
#[derive(Debug)]
pub struct AddToCartOutcome {
    pub item: CartItemWithProduct,
    pub created: bool,
}

impl CartService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<CartItemWithProduct>, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .order_by_asc(cart_item::Column::Id)
            .all(&self.db)
            .await?;
        Ok(items
            .into_iter()
            .map(|(item, product)| CartItemWithProduct { item, product })
            .collect())
    }

    /// Adds a product to the account's cart. A repeated add for the
    /// same product increments the existing line instead of creating a
    /// second one.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<AddToCartOutcome, ServiceError> {
        self.ensure_product_exists(product_id).await?;

        if let Some(item) = self.increment_existing(user_id, product_id, quantity).await? {
            return Ok(AddToCartOutcome {
                item: self.hydrate(item).await?,
                created: false,
            });
        }

        let now = Utc::now();
        let model = cart_item::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(item) => {
                info!(cart_item_id = item.id, %user_id, "added cart item");
                Ok(AddToCartOutcome {
                    item: self.hydrate(item).await?,
                    created: true,
                })
            }
            // Lost the insert race to a concurrent add for the same
            // product; fall back to the increment path.
            Err(err) if is_unique_violation(&err) => {
                let item = self
                    .increment_existing(user_id, product_id, quantity)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Internal("cart item vanished during add".to_string())
                    })?;
                Ok(AddToCartOutcome {
                    item: self.hydrate(item).await?,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        id: i64,
    ) -> Result<CartItemWithProduct, ServiceError> {
        let item = self.find_owned(user_id, id).await?;
        self.hydrate(item).await
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        id: i64,
        quantity: i32,
    ) -> Result<CartItemWithProduct, ServiceError> {
        let item = self.find_owned(user_id, id).await?;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let item = active.update(&self.db).await?;
        self.hydrate(item).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, id: i64) -> Result<(), ServiceError> {
        let item = self.find_owned(user_id, id).await?;
        item.delete(&self.db).await?;
        info!(cart_item_id = id, %user_id, "removed cart item");
        Ok(())
    }

    /// Empties the account's cart, returning the number of lines
    /// removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn increment_existing(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let Some(existing) = existing else {
            txn.commit().await?;
            return Ok(None);
        };

        let new_quantity = existing.quantity + quantity;
        let mut active: cart_item::ActiveModel = existing.into();
        active.quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now());
        let item = active.update(&txn).await?;
        txn.commit().await?;
        info!(cart_item_id = item.id, %user_id, "incremented cart item");
        Ok(Some(item))
    }

    /// A cart line belongs to exactly one account; anyone else gets 403
    /// rather than 404, matching the ownership checks on updates.
    async fn find_owned(&self, user_id: Uuid, id: i64) -> Result<CartItemModel, ServiceError> {
        let item = CartItem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;
        if item.user_id != user_id {
            return Err(ServiceError::forbidden("Unauthorized"));
        }
        Ok(item)
    }

    async fn hydrate(&self, item: CartItemModel) -> Result<CartItemWithProduct, ServiceError> {
        let product = item.find_related(Product).one(&self.db).await?;
        Ok(CartItemWithProduct { item, product })
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
